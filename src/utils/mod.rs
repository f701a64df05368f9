#[cfg(windows)]
pub mod create_hbitmap_bgra_premul;
pub mod fit_size;
#[cfg(windows)]
pub mod guid;
pub mod rgba_to_bgra_premul;
