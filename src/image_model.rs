//! Decoding and thumbnail generation, independent of the COM surface.
//!
//! The provider opens one image per initialization and asks for thumbnails at
//! whatever size the thumbnail cache wants. Everything here is bounded by
//! [`Settings`] so a hostile file cannot make the host allocate without limit.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

use image::imageops::{self, FilterType};
use image::io::{Limits, Reader};
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat};
use thiserror::Error;

use crate::log::log;
use crate::settings::Settings;
use crate::utils::fit_size::fit_size;
use crate::utils::rgba_to_bgra_premul::{PremultipliedView, extend_bgra};

/// Bytes per pixel of the f32 RGBA buffer `imageops::resize` keeps between passes.
const RESAMPLE_SCRATCH_BPP: usize = 16;

#[derive(Debug, Error)]
pub enum ImageModelError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("source is empty")]
    Empty,
    #[error("source is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("unrecognized image format")]
    Unsupported,
    #[error("decode failed: {0}")]
    Decode(#[source] ImageError),
    #[error("decoder limits exceeded: {0}")]
    LimitsExceeded(#[source] ImageError),
    #[error("requested thumbnail size must be positive")]
    InvalidSize,
    #[error("no image loaded")]
    NotLoaded,
    #[error("cannot allocate {0} bytes for thumbnail")]
    OutOfMemory(usize),
}

impl From<ImageError> for ImageModelError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::IoError(e) => ImageModelError::Io(e),
            ImageError::Unsupported(_) => ImageModelError::Unsupported,
            ImageError::Limits(_) => ImageModelError::LimitsExceeded(err),
            other => ImageModelError::Decode(other),
        }
    }
}

/// How the shell should treat the alpha channel of a [`Thumbnail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaKind {
    /// Alpha bytes are 255 and carry no information.
    Opaque,
    /// Color channels are premultiplied by alpha.
    Premultiplied,
}

/// Top-down BGRA pixels ready for a 32bpp DIB section.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub alpha: AlphaKind,
}

#[derive(Debug)]
pub struct ImageModel {
    settings: Settings,
    image: Option<DynamicImage>,
}

impl ImageModel {
    pub fn new(settings: &Settings) -> Self {
        Self { settings: *settings, image: None }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn clear_images(&mut self) {
        self.image = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// Reads and decodes `path`. The extension is only used when the content
    /// itself does not identify the format (TGA has no magic bytes).
    pub fn open_path(&mut self, path: &Path) -> Result<(), ImageModelError> {
        self.clear_images();
        let limit = self.settings.max_source_bytes;
        let file = File::open(path)?;
        self.check_source_len(file.metadata()?.len())?;
        // The file may grow after the metadata check; never read past the limit.
        let mut bytes = Vec::new();
        file.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
        self.check_source_len(bytes.len() as u64)?;
        let hint = ImageFormat::from_path(path).ok();
        self.open_with_hint(&bytes, hint)
    }

    /// Decodes an in-memory image whose format is sniffed from its content.
    pub fn open_bytes(&mut self, bytes: &[u8]) -> Result<(), ImageModelError> {
        self.clear_images();
        self.open_with_hint(bytes, None)
    }

    fn open_with_hint(&mut self, bytes: &[u8], hint: Option<ImageFormat>) -> Result<(), ImageModelError> {
        if bytes.is_empty() {
            return Err(ImageModelError::Empty);
        }
        self.check_source_len(bytes.len() as u64)?;

        let mut reader = Reader::new(Cursor::new(bytes)).with_guessed_format()?;
        if reader.format().is_none() {
            match hint {
                Some(format) => reader.set_format(format),
                None => return Err(ImageModelError::Unsupported),
            }
        }
        let format = reader.format();
        reader.limits(self.decode_limits());

        let image = reader.decode()?;
        log(format!("ImageModel: decoded {:?} {}x{} color={:?}", format, image.width(), image.height(), image.color()));
        self.image = Some(image);
        Ok(())
    }

    fn check_source_len(&self, size: u64) -> Result<(), ImageModelError> {
        let limit = self.settings.max_source_bytes;
        if size > limit {
            return Err(ImageModelError::TooLarge { size, limit });
        }
        Ok(())
    }

    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.settings.max_decode_bytes);
        limits
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| (img.width(), img.height()))
    }

    pub fn has_alpha(&self) -> bool {
        self.image.as_ref().is_some_and(|img| img.color().has_alpha())
    }

    /// Produces a thumbnail whose longer axis is `min(cx, native longer axis)`.
    pub fn gen_thumbnail(&self, cx: u32) -> Result<Thumbnail, ImageModelError> {
        let image = self.image.as_ref().ok_or(ImageModelError::NotLoaded)?;
        if cx == 0 {
            return Err(ImageModelError::InvalidSize);
        }
        let cx = cx.min(self.settings.max_thumbnail_size);
        let (sw, sh) = (image.width(), image.height());
        let (tw, th) = fit_size(sw, sh, cx);
        if tw == 0 || th == 0 {
            return Err(ImageModelError::InvalidSize);
        }

        let len = (tw as usize).checked_mul(th as usize).and_then(|n| n.checked_mul(4)).ok_or(ImageModelError::OutOfMemory(usize::MAX))?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|_| ImageModelError::OutOfMemory(len))?;

        let view = PremultipliedView(image);
        if (tw, th) == (sw, sh) {
            extend_bgra(&mut pixels, view.pixels().map(|(_, _, px)| px));
        } else {
            let scratch = (sw as usize)
                .checked_mul(th as usize)
                .and_then(|n| n.checked_mul(RESAMPLE_SCRATCH_BPP))
                .ok_or(ImageModelError::OutOfMemory(usize::MAX))?;
            Vec::<u8>::new().try_reserve_exact(scratch).map_err(|_| ImageModelError::OutOfMemory(scratch))?;
            let fitted = imageops::resize(&view, tw, th, FilterType::Triangle);
            extend_bgra(&mut pixels, fitted.pixels().copied());
        }

        let alpha = if image.color().has_alpha() { AlphaKind::Premultiplied } else { AlphaKind::Opaque };
        Ok(Thumbnail { width: tw, height: th, pixels, alpha })
    }
}
