/// Target dimensions for a `cx` bounding square.
///
/// The longer axis becomes `min(cx, longer source axis)` (never upscaled), the shorter
/// one keeps the aspect ratio rounded to nearest and never drops below 1.
#[inline]
pub fn fit_size(sw: u32, sh: u32, cx: u32) -> (u32, u32) {
    if sw == 0 || sh == 0 {
        return (0, 0);
    }
    let long = sw.max(sh) as u64;
    let short = sw.min(sh) as u64;
    let target_long = (cx.max(1) as u64).min(long);
    let target_short = ((short * target_long + long / 2) / long).max(1);
    if sw >= sh { (target_long as u32, target_short as u32) } else { (target_short as u32, target_long as u32) }
}
