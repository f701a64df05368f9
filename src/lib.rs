pub mod image_model;
pub mod log;
pub mod settings;
pub mod utils;

#[cfg(windows)]
mod class_factory;
#[cfg(windows)]
mod dll_export;
#[cfg(windows)]
mod thumbnail_provider;

#[cfg(all(windows, not(target_pointer_width = "64")))]
compile_error!("texview-thumb-win must be built for 64-bit targets");

#[cfg(windows)]
use std::sync::atomic::AtomicU32;

#[cfg(windows)]
use windows::core::{GUID, HRESULT};

#[cfg(windows)]
const CLASS_E_CLASSNOTAVAILABLE: HRESULT = HRESULT(0x80040111u32 as i32);
#[cfg(windows)]
const WINCODEC_ERR_BADIMAGE: HRESULT = HRESULT(0x88982F60u32 as i32);
#[cfg(windows)]
const WINCODEC_ERR_COMPONENTNOTFOUND: HRESULT = HRESULT(0x88982F50u32 as i32);

/// Live provider objects plus outstanding `LockServer(TRUE)` calls.
#[cfg(windows)]
static DLL_LOCK_COUNT: AtomicU32 = AtomicU32::new(0);

/// Serializes tests that observe `DLL_LOCK_COUNT`.
#[cfg(all(test, windows))]
static COM_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Shell Thumbnail Provider category (Implemented Categories + ShellEx binding).
/// - HKCR\CLSID\{CLSID}\Implemented Categories\{SHELL_THUMB_HANDLER_CATID}
/// - HKCR\<.ext | ProgID>\ShellEx\{SHELL_THUMB_HANDLER_CATID} = {CLSID}
#[cfg(windows)]
pub const SHELL_THUMB_HANDLER_CATID: GUID = GUID::from_u128(0xE357FCCD_A995_4576_B01F_234630154E96);

/// CLSID of the thumbnail provider. Must match DLL exports and registry bindings.
#[cfg(windows)]
pub const CLSID_TEXVIEW_THUMB: GUID = GUID::from_u128(0x7B3C91E4_2D5A_4F08_9C61_5E2A8D4F03B7);

/// ProgID bound to the supported extensions (HKCU\Software\Classes\TexView.Image).
pub const DEFAULT_PROGID: &str = "TexView.Image";

/// File extensions the provider is registered for. All of them decode through
/// [`image_model::ImageModel`]; formats Explorer already previews are left alone.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".dds", ".tga", ".hdr", ".exr", ".pnm", ".pbm", ".pgm", ".ppm", ".qoi", ".ff"];

/// Human-friendly provider name (HKCR\CLSID\{CLSID}\(Default)).
pub const FRIENDLY_NAME: &str = "TexView Thumbnail Provider";
