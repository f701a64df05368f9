use image::{GenericImageView, Rgba};

/// Premultiplies one straight-alpha pixel, rounding to nearest.
#[inline]
pub fn premultiply(Rgba([r, g, b, a]): Rgba<u8>) -> Rgba<u8> {
    let mul = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
    Rgba([mul(r), mul(g), mul(b), a])
}

/// Read-only view that yields premultiplied RGBA. Resampling through it weights
/// colour by coverage, so fully transparent texels contribute nothing.
pub struct PremultipliedView<'a, I>(pub &'a I);

impl<I: GenericImageView<Pixel = Rgba<u8>>> GenericImageView for PremultipliedView<'_, I> {
    type Pixel = Rgba<u8>;

    fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    fn bounds(&self) -> (u32, u32, u32, u32) {
        self.0.bounds()
    }

    fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        premultiply(self.0.get_pixel(x, y))
    }
}

/// Appends already-premultiplied RGBA pixels to `out` in BGRA order.
///
/// `out` is expected to be reserved by the caller so allocation failures can be
/// reported instead of aborting.
#[inline]
pub fn extend_bgra(out: &mut Vec<u8>, pixels: impl Iterator<Item = Rgba<u8>>) {
    for Rgba([r, g, b, a]) in pixels {
        out.extend_from_slice(&[b, g, r, a]);
    }
}
