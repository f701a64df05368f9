use crate::image_model::{AlphaKind, ImageModel, ImageModelError};
use crate::settings::{self, Settings};
use crate::{DLL_LOCK_COUNT, WINCODEC_ERR_BADIMAGE, WINCODEC_ERR_COMPONENTNOTFOUND};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};

use windows_implement::implement;

use crate::log::log;
use crate::utils::create_hbitmap_bgra_premul::create_hbitmap_bgra_premul;
use windows::Win32::Foundation::{E_FAIL, E_INVALIDARG, E_OUTOFMEMORY, E_POINTER, E_UNEXPECTED, S_FALSE, STG_E_ACCESSDENIED, STG_E_FILENOTFOUND};
use windows::Win32::Graphics::Gdi::HBITMAP;
use windows::Win32::System::Com::{ISequentialStream, IStream, STREAM_SEEK_SET};
use windows::Win32::UI::Shell::PropertiesSystem::{IInitializeWithFile_Impl, IInitializeWithStream_Impl};
use windows::Win32::UI::Shell::{IInitializeWithItem_Impl, IShellItem, IThumbnailProvider_Impl, SIGDN_FILESYSPATH, WTS_ALPHATYPE, WTSAT_ARGB, WTSAT_RGB};
use windows::core::{Error, HRESULT, Interface, Result as WinResult};
use windows_core::PCWSTR;

const STREAM_CHUNK: usize = 8192;

struct ProviderState {
    /// Display form of the opened path, or `None` when initialized from a stream.
    source: Option<String>,
    model: ImageModel,
}

/// Maps image-model failures onto the HRESULTs the thumbnail cache understands.
fn hresult_for(err: &ImageModelError) -> HRESULT {
    match err {
        ImageModelError::Io(e) => match e.kind() {
            io::ErrorKind::NotFound => STG_E_FILENOTFOUND,
            io::ErrorKind::PermissionDenied => STG_E_ACCESSDENIED,
            io::ErrorKind::OutOfMemory => E_OUTOFMEMORY,
            _ => E_FAIL,
        },
        ImageModelError::Empty | ImageModelError::Decode(_) => WINCODEC_ERR_BADIMAGE,
        ImageModelError::Unsupported => WINCODEC_ERR_COMPONENTNOTFOUND,
        ImageModelError::TooLarge { .. } | ImageModelError::LimitsExceeded(_) | ImageModelError::OutOfMemory(_) => E_OUTOFMEMORY,
        ImageModelError::InvalidSize => E_INVALIDARG,
        ImageModelError::NotLoaded => E_UNEXPECTED,
    }
}

fn model_error(stage: &str, err: ImageModelError) -> Error {
    let hr = hresult_for(&err);
    log(format!("{}: failed ({}) -> hr=0x{:08X}", stage, err, hr.0 as u32));
    Error::from(hr)
}

#[implement(windows::Win32::UI::Shell::IThumbnailProvider, windows::Win32::UI::Shell::PropertiesSystem::IInitializeWithFile, windows::Win32::UI::Shell::IInitializeWithItem, windows::Win32::UI::Shell::PropertiesSystem::IInitializeWithStream)]
pub struct TexThumbProvider {
    state: Mutex<ProviderState>,
}

impl TexThumbProvider {
    pub fn new() -> Self {
        Self::with_settings(settings::current())
    }

    pub(crate) fn with_settings(settings: &Settings) -> Self {
        DLL_LOCK_COUNT.fetch_add(1, Ordering::SeqCst);
        log("TexThumbProvider::new");
        Self { state: Mutex::new(ProviderState { source: None, model: ImageModel::new(settings) }) }
    }

    fn state(&self) -> WinResult<MutexGuard<'_, ProviderState>> {
        self.state.lock().map_err(|_| {
            log("TexThumbProvider: state mutex poisoned");
            Error::from(E_UNEXPECTED)
        })
    }

    /// Forgets the previous source. Every `Initialize` starts here so a failure
    /// at any later step leaves the provider unloaded.
    fn reset(&self) -> WinResult<MutexGuard<'_, ProviderState>> {
        let mut st = self.state()?;
        st.source = None;
        st.model.clear_images();
        Ok(st)
    }

    fn open_path(&self, stage: &str, path: PathBuf) -> WinResult<()> {
        let mut st = self.state()?;
        st.model.open_path(&path).map_err(|err| model_error(stage, err))?;
        let (w, h) = st.model.size().unwrap_or_default();
        let shown = path.display().to_string();
        log(format!("{}: path={} size={}x{}", stage, shown, w, h));
        st.source = Some(shown);
        Ok(())
    }
}

impl Drop for TexThumbProvider {
    fn drop(&mut self) {
        DLL_LOCK_COUNT.fetch_sub(1, Ordering::SeqCst);
        log("TexThumbProvider::drop");
    }
}

/// Copies a NUL-terminated wide string into a path without losing unpaired surrogates.
unsafe fn wide_path(p: PCWSTR) -> PathBuf {
    PathBuf::from(unsafe { widestring::U16CStr::from_ptr_str(p.0) }.to_os_string())
}

impl IInitializeWithFile_Impl for TexThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, psz_file_path: &PCWSTR, _grf_mode: u32) -> WinResult<()> {
        drop(self.reset()?);
        if psz_file_path.is_null() {
            log("IInitializeWithFile: null path -> E_POINTER");
            return Err(Error::from(E_POINTER));
        }
        let path = unsafe { wide_path(*psz_file_path) };
        self.open_path("IInitializeWithFile", path)
    }
}

impl IInitializeWithItem_Impl for TexThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, psi: windows::core::Ref<'_, IShellItem>, _grf_mode: u32) -> WinResult<()> {
        drop(self.reset()?);
        let item: &IShellItem = psi.ok()?;
        let path = unsafe {
            let pw = item.GetDisplayName(SIGDN_FILESYSPATH).map_err(|e| {
                log(format!("IInitializeWithItem: GetDisplayName failed hr=0x{:08X}", e.code().0 as u32));
                e
            })?;
            if pw.is_null() {
                log("IInitializeWithItem: item has no file system path");
                return Err(Error::from(E_FAIL));
            }
            let path = wide_path(PCWSTR(pw.0));
            windows::Win32::System::Com::CoTaskMemFree(Some(pw.0 as _));
            path
        };
        self.open_path("IInitializeWithItem", path)
    }
}

impl IInitializeWithStream_Impl for TexThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, pstream: windows::core::Ref<'_, IStream>, _grf_mode: u32) -> WinResult<()> {
        log("IInitializeWithStream: begin");
        let limit = self.reset()?.model.settings().max_source_bytes;

        let stream: &IStream = pstream.ok()?;
        unsafe {
            stream.Seek(0, STREAM_SEEK_SET, None)?;
        }

        let seq: ISequentialStream = stream.cast()?;
        let mut data = Vec::<u8>::new();
        let mut buf = [0u8; STREAM_CHUNK];

        loop {
            let mut read = 0u32;
            let hr = unsafe { seq.Read(buf.as_mut_ptr() as *mut _, buf.len() as u32, Some(&mut read as *mut u32)) };

            if hr.is_err() {
                log(format!("IInitializeWithStream: Read failed hr=0x{:08X}", hr.0 as u32));
                return Err(Error::from(hr));
            }

            if read > 0 {
                data.extend_from_slice(&buf[..read as usize]);
                if data.len() as u64 > limit {
                    return Err(model_error("IInitializeWithStream", ImageModelError::TooLarge { size: data.len() as u64, limit }));
                }
            }

            if hr == S_FALSE || read == 0 {
                break;
            }
        }

        let mut st = self.state()?;
        st.model
            .open_bytes(&data)
            .map_err(|err| model_error("IInitializeWithStream", err))?;
        let (w, h) = st.model.size().unwrap_or_default();
        drop(st);
        log(format!("IInitializeWithStream: decoded {} bytes -> {}x{}", data.len(), w, h));
        Ok(())
    }
}

impl IThumbnailProvider_Impl for TexThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn GetThumbnail(&self, cx: u32, phbmp: *mut HBITMAP, pdwalpha: *mut WTS_ALPHATYPE) -> WinResult<()> {
        if phbmp.is_null() || pdwalpha.is_null() {
            return Err(Error::from(E_POINTER));
        }

        log(format!("GetThumbnail: start (cx={})", cx));

        let (thumb, source) = {
            let st = self.state()?;
            let thumb = st.model.gen_thumbnail(cx).map_err(|err| model_error("GetThumbnail", err))?;
            (thumb, st.source.clone())
        };

        let hbmp = unsafe { create_hbitmap_bgra_premul(thumb.width, thumb.height, &thumb.pixels)? };
        let alpha = match thumb.alpha {
            AlphaKind::Opaque => WTSAT_RGB,
            AlphaKind::Premultiplied => WTSAT_ARGB,
        };

        unsafe {
            *phbmp = hbmp;
            *pdwalpha = alpha;
        }
        log(format!("GetThumbnail: success ({}x{}, alpha={:?}, source={})", thumb.width, thumb.height, thumb.alpha, source.as_deref().unwrap_or("stream")));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::{Cursor, Write};
    use std::ptr::null_mut;
    use widestring::U16CString;
    use windows::Win32::Foundation::{E_NOINTERFACE, S_OK};
    use windows::Win32::Graphics::Gdi::{BITMAP, DeleteObject, GetObjectW};
    use windows::Win32::System::Com::{COINIT_APARTMENTTHREADED, CoInitializeEx, CoUninitialize, IBindCtx, IPersistFile};
    use windows::Win32::UI::Shell::PropertiesSystem::{IInitializeWithFile, IInitializeWithStream};
    use windows::Win32::UI::Shell::{IInitializeWithItem, IThumbnailProvider, SHCreateItemFromParsingName, SHCreateMemStream};
    use windows::core::IUnknown;

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png).unwrap();
        buf
    }

    fn write_temp(bytes: &[u8], suffix: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    fn init_with_file(tp: &IThumbnailProvider, path: &std::path::Path) -> WinResult<()> {
        let init: IInitializeWithFile = tp.cast()?;
        let wide = U16CString::from_os_str(path.as_os_str()).unwrap();
        unsafe { init.Initialize(PCWSTR(wide.as_ptr()), 0) }
    }

    fn thumbnail(tp: &IThumbnailProvider, cx: u32) -> WinResult<(i32, i32, WTS_ALPHATYPE)> {
        let mut hbmp = HBITMAP::default();
        let mut alpha = WTS_ALPHATYPE::default();
        unsafe { tp.GetThumbnail(cx, &mut hbmp, &mut alpha)? };
        let mut bm = BITMAP::default();
        let n = unsafe { GetObjectW(hbmp.into(), core::mem::size_of::<BITMAP>() as i32, Some(&mut bm as *mut BITMAP as *mut _)) };
        unsafe {
            let _ = DeleteObject(hbmp.into());
        }
        assert!(n > 0);
        Ok((bm.bmWidth, bm.bmHeight.abs(), alpha))
    }

    #[test]
    fn reference_count_starts_at_one_and_tracks_dll_locks() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let before = DLL_LOCK_COUNT.load(Ordering::SeqCst);

        let unk: IUnknown = TexThumbProvider::new().into();
        assert_eq!(DLL_LOCK_COUNT.load(Ordering::SeqCst), before + 1);

        let raw = unk.as_raw();
        let vtable = unk.vtable();
        unsafe {
            assert_eq!((vtable.AddRef)(raw), 2);
            assert_eq!((vtable.Release)(raw), 1);
        }

        drop(unk);
        assert_eq!(DLL_LOCK_COUNT.load(Ordering::SeqCst), before);
    }

    #[test]
    fn query_interface_follows_capability_table() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let unk: IUnknown = TexThumbProvider::new().into();

        for iid in [IUnknown::IID, IThumbnailProvider::IID, IInitializeWithFile::IID, IInitializeWithItem::IID, IInitializeWithStream::IID] {
            let mut ptr = null_mut();
            let hr = unsafe { unk.query(&iid, &mut ptr) };
            assert_eq!(hr, S_OK);
            assert!(!ptr.is_null());
            drop(unsafe { IUnknown::from_raw(ptr) });
        }

        let live = DLL_LOCK_COUNT.load(Ordering::SeqCst);
        let mut ptr = null_mut();
        let hr = unsafe { unk.query(&IPersistFile::IID, &mut ptr) };
        assert_eq!(hr, E_NOINTERFACE);
        assert!(ptr.is_null());
        assert_eq!(DLL_LOCK_COUNT.load(Ordering::SeqCst), live);
        unsafe {
            assert_eq!((unk.vtable().AddRef)(unk.as_raw()), 2);
            assert_eq!((unk.vtable().Release)(unk.as_raw()), 1);
        }
    }

    #[test]
    fn thumbnail_before_initialize_is_rejected() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tp: IThumbnailProvider = TexThumbProvider::new().into();
        assert_eq!(thumbnail(&tp, 96).unwrap_err().code(), E_UNEXPECTED);
    }

    #[test]
    fn file_thumbnail_is_fit_to_requested_size() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let file = write_temp(&png(DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 200, Rgb([9, 9, 9])))), ".png");
        let tp: IThumbnailProvider = TexThumbProvider::new().into();
        init_with_file(&tp, file.path()).unwrap();

        assert_eq!(thumbnail(&tp, 100).unwrap(), (100, 50, WTSAT_RGB));
        assert_eq!(thumbnail(&tp, 1024).unwrap(), (400, 200, WTSAT_RGB));
        assert_eq!(thumbnail(&tp, 0).unwrap_err().code(), E_INVALIDARG);
    }

    #[test]
    fn stream_thumbnail_reports_alpha() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = png(DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 60, Rgba([0, 255, 0, 10]))));
        let stream = unsafe { SHCreateMemStream(Some(bytes.as_slice())) }.unwrap();
        let tp: IThumbnailProvider = TexThumbProvider::new().into();
        let init: IInitializeWithStream = tp.cast().unwrap();
        unsafe { init.Initialize(&stream, 0) }.unwrap();

        assert_eq!(thumbnail(&tp, 20).unwrap(), (10, 20, WTSAT_ARGB));
    }

    #[test]
    fn initialize_failures_map_to_hresults() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tp: IThumbnailProvider = TexThumbProvider::new().into();

        let dir = tempfile::tempdir().unwrap();
        let err = init_with_file(&tp, &dir.path().join("missing.dds")).unwrap_err();
        assert_eq!(err.code(), STG_E_FILENOTFOUND);

        let junk = write_temp(b"not an image at all", ".bin");
        let err = init_with_file(&tp, junk.path()).unwrap_err();
        assert_eq!(err.code(), WINCODEC_ERR_COMPONENTNOTFOUND);

        let init: IInitializeWithFile = tp.cast().unwrap();
        let err = unsafe { init.Initialize(PCWSTR::null(), 0) }.unwrap_err();
        assert_eq!(err.code(), E_POINTER);

        assert_eq!(thumbnail(&tp, 32).unwrap_err().code(), E_UNEXPECTED);
    }

    #[test]
    fn failed_reinitialize_drops_previous_image() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let good = write_temp(&png(DynamicImage::ImageRgb8(RgbImage::new(8, 8))), ".png");
        let bad = write_temp(b"garbage", ".png");
        let tp: IThumbnailProvider = TexThumbProvider::new().into();

        init_with_file(&tp, good.path()).unwrap();
        assert!(thumbnail(&tp, 8).is_ok());
        assert!(init_with_file(&tp, bad.path()).is_err());
        assert_eq!(thumbnail(&tp, 8).unwrap_err().code(), E_UNEXPECTED);
    }

    #[test]
    fn null_out_pointers_are_rejected() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let file = write_temp(&png(DynamicImage::ImageRgb8(RgbImage::new(4, 4))), ".png");
        let tp: IThumbnailProvider = TexThumbProvider::new().into();
        init_with_file(&tp, file.path()).unwrap();

        let mut hbmp = HBITMAP::default();
        let mut alpha = WTS_ALPHATYPE::default();
        let err = unsafe { tp.GetThumbnail(4, null_mut(), &mut alpha) }.unwrap_err();
        assert_eq!(err.code(), E_POINTER);
        let err = unsafe { tp.GetThumbnail(4, &mut hbmp, null_mut()) }.unwrap_err();
        assert_eq!(err.code(), E_POINTER);
        assert!(hbmp.is_invalid());
    }

    #[test]
    fn item_is_resolved_to_its_file_system_path() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _ = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        {
            let file = write_temp(&png(DynamicImage::ImageRgb8(RgbImage::new(60, 30))), ".png");
            let wide = U16CString::from_os_str(file.path().as_os_str()).unwrap();
            let item: IShellItem = unsafe { SHCreateItemFromParsingName(PCWSTR(wide.as_ptr()), None::<&IBindCtx>) }.unwrap();

            let tp: IThumbnailProvider = TexThumbProvider::new().into();
            let init: IInitializeWithItem = tp.cast().unwrap();
            unsafe { init.Initialize(&item, 0) }.unwrap();
            assert_eq!(thumbnail(&tp, 30).unwrap(), (30, 15, WTSAT_RGB));
        }
        unsafe { CoUninitialize() };
    }

    #[test]
    fn oversized_stream_drops_previous_image() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let good = png(DynamicImage::ImageRgb8(RgbImage::new(8, 8)));
        let file = write_temp(&good, ".png");
        let settings = Settings { max_source_bytes: good.len() as u64, ..Settings::default() };
        let tp: IThumbnailProvider = TexThumbProvider::with_settings(&settings).into();

        init_with_file(&tp, file.path()).unwrap();
        assert!(thumbnail(&tp, 8).is_ok());

        let big = vec![0u8; good.len() + STREAM_CHUNK];
        let stream = unsafe { SHCreateMemStream(Some(big.as_slice())) }.unwrap();
        let init: IInitializeWithStream = tp.cast().unwrap();
        let err = unsafe { init.Initialize(&stream, 0) }.unwrap_err();
        assert_eq!(err.code(), E_OUTOFMEMORY);
        assert_eq!(thumbnail(&tp, 8).unwrap_err().code(), E_UNEXPECTED);
    }

    #[test]
    fn unpaired_surrogate_in_file_name_is_preserved() {
        use std::os::windows::ffi::OsStringExt;

        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let name = std::ffi::OsString::from_wide(&[0x0074, 0xD800, 0x002E, 0x0070, 0x006E, 0x0067]);
        let path = dir.path().join(name);
        std::fs::write(&path, png(DynamicImage::ImageRgb8(RgbImage::new(12, 6)))).unwrap();

        let tp: IThumbnailProvider = TexThumbProvider::new().into();
        init_with_file(&tp, &path).unwrap();
        assert_eq!(thumbnail(&tp, 12).unwrap(), (12, 6, WTSAT_RGB));
    }

    #[test]
    fn null_path_drops_previous_image() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let file = write_temp(&png(DynamicImage::ImageRgb8(RgbImage::new(8, 8))), ".png");
        let tp: IThumbnailProvider = TexThumbProvider::new().into();
        init_with_file(&tp, file.path()).unwrap();

        let init: IInitializeWithFile = tp.cast().unwrap();
        assert_eq!(unsafe { init.Initialize(PCWSTR::null(), 0) }.unwrap_err().code(), E_POINTER);
        assert_eq!(thumbnail(&tp, 8).unwrap_err().code(), E_UNEXPECTED);
    }

    #[test]
    fn error_mapping_covers_each_failure_class() {
        assert_eq!(hresult_for(&ImageModelError::Io(io::Error::from(io::ErrorKind::PermissionDenied))), STG_E_ACCESSDENIED);
        assert_eq!(hresult_for(&ImageModelError::Empty), WINCODEC_ERR_BADIMAGE);
        assert_eq!(hresult_for(&ImageModelError::TooLarge { size: 2, limit: 1 }), E_OUTOFMEMORY);
        assert_eq!(hresult_for(&ImageModelError::OutOfMemory(16)), E_OUTOFMEMORY);
        assert_eq!(hresult_for(&ImageModelError::NotLoaded), E_UNEXPECTED);
    }
}
