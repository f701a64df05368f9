use std::ptr::null_mut;
use windows::Win32::Foundation::{E_FAIL, E_INVALIDARG};
use windows::Win32::Graphics::Gdi::{BI_BITFIELDS, BITMAPINFO, BITMAPV5HEADER, CreateDIBSection, DIB_RGB_COLORS, DeleteObject, HBITMAP};

/// Creates a top-down 32bpp DIB section and copies `pixels_bgra` (premultiplied) into it.
///
/// # Safety
/// The returned handle is owned by the caller (the shell, once handed out).
pub unsafe fn create_hbitmap_bgra_premul(width: u32, height: u32, pixels_bgra: &[u8]) -> windows::core::Result<HBITMAP> {
    const LCS_SRGB: u32 = 0x7352_4742; // 'sRGB'

    use core::ffi::c_void;
    use core::mem::{size_of, zeroed};
    use core::ptr::copy_nonoverlapping;

    let (Ok(w), Ok(h)) = (i32::try_from(width), i32::try_from(height)) else {
        return Err(windows::core::Error::from(E_INVALIDARG));
    };
    let expected = (width as usize) * (height as usize) * 4;
    if w == 0 || h == 0 || pixels_bgra.len() != expected {
        return Err(windows::core::Error::from(E_INVALIDARG));
    }

    let mut v5: BITMAPV5HEADER = unsafe { zeroed() };
    v5.bV5Size = size_of::<BITMAPV5HEADER>() as u32;
    v5.bV5Width = w;
    v5.bV5Height = -h; // top-down
    v5.bV5Planes = 1;
    v5.bV5BitCount = 32;
    v5.bV5Compression = BI_BITFIELDS;
    v5.bV5RedMask = 0x00FF_0000;
    v5.bV5GreenMask = 0x0000_FF00;
    v5.bV5BlueMask = 0x0000_00FF;
    v5.bV5AlphaMask = 0xFF00_0000;
    v5.bV5CSType = LCS_SRGB;

    let mut bits: *mut c_void = null_mut();

    let hbmp: HBITMAP = unsafe { CreateDIBSection(None, &*(&v5 as *const BITMAPV5HEADER as *const BITMAPINFO), DIB_RGB_COLORS, &mut bits, None, 0)? };

    if bits.is_null() {
        unsafe {
            let _ = DeleteObject(hbmp.into());
        }
        return Err(windows::core::Error::from(E_FAIL));
    }

    unsafe { copy_nonoverlapping(pixels_bgra.as_ptr(), bits as *mut u8, expected) };

    Ok(hbmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Graphics::Gdi::{BITMAP, GetObjectW};

    #[test]
    fn creates_bitmap_with_requested_dimensions() {
        let pixels = vec![0x7Fu8; 3 * 2 * 4];
        let hbmp = unsafe { create_hbitmap_bgra_premul(3, 2, &pixels) }.expect("dib section");
        let mut bm = BITMAP::default();
        let n = unsafe { GetObjectW(hbmp.into(), core::mem::size_of::<BITMAP>() as i32, Some(&mut bm as *mut BITMAP as *mut _)) };
        assert!(n > 0);
        assert_eq!((bm.bmWidth, bm.bmHeight.abs(), bm.bmBitsPixel), (3, 2, 32));
        unsafe {
            let _ = DeleteObject(hbmp.into());
        }
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let err = unsafe { create_hbitmap_bgra_premul(4, 4, &[0u8; 8]) }.unwrap_err();
        assert_eq!(err.code(), E_INVALIDARG);
    }

    #[test]
    fn rejects_empty_dimensions() {
        let err = unsafe { create_hbitmap_bgra_premul(0, 4, &[]) }.unwrap_err();
        assert_eq!(err.code(), E_INVALIDARG);
    }
}
