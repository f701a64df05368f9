//! Per-user configuration, read once per process.
//!
//! Values live under `HKCU\Software\texview-thumb-win` as DWORDs. Missing or zero
//! values fall back to the defaults below; non-Windows builds always use defaults.

use once_cell::sync::Lazy;

/// Registry location (per-user).
pub const REG_SUBKEY: &str = r"Software\texview-thumb-win";

#[cfg(windows)]
const VALUE_LOG_ENABLED: &str = "LogEnabled";
#[cfg(windows)]
const VALUE_MAX_SOURCE_MIB: &str = "MaxSourceMiB";
#[cfg(windows)]
const VALUE_MAX_DECODE_MIB: &str = "MaxDecodeMiB";
#[cfg(windows)]
const VALUE_MAX_THUMBNAIL_SIZE: &str = "MaxThumbnailSize";

const MIB: u64 = 1024 * 1024;

pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 256 * MIB;
pub const DEFAULT_MAX_DECODE_BYTES: u64 = 512 * MIB;
/// Largest size the thumbnail cache asks for (thumbcache_2560.db).
pub const DEFAULT_MAX_THUMBNAIL_SIZE: u32 = 2560;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Files or streams larger than this are rejected before decoding.
    pub max_source_bytes: u64,
    /// Upper bound on allocations the decoder may make.
    pub max_decode_bytes: u64,
    /// Requested `cx` values above this are clamped.
    pub max_thumbnail_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self { max_source_bytes: DEFAULT_MAX_SOURCE_BYTES, max_decode_bytes: DEFAULT_MAX_DECODE_BYTES, max_thumbnail_size: DEFAULT_MAX_THUMBNAIL_SIZE }
    }
}

impl Settings {
    /// Builds settings from raw DWORD values, treating `None`/`0` as "use default".
    pub fn from_raw(max_source_mib: Option<u32>, max_decode_mib: Option<u32>, max_thumbnail_size: Option<u32>) -> Self {
        let d = Self::default();
        let nonzero = |v: Option<u32>| v.filter(|&v| v != 0);
        Self {
            max_source_bytes: nonzero(max_source_mib).map_or(d.max_source_bytes, |v| v as u64 * MIB),
            max_decode_bytes: nonzero(max_decode_mib).map_or(d.max_decode_bytes, |v| v as u64 * MIB),
            max_thumbnail_size: nonzero(max_thumbnail_size).unwrap_or(d.max_thumbnail_size),
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(load);

/// Process-wide settings, loaded on first access.
pub fn current() -> &'static Settings {
    &SETTINGS
}

#[cfg(windows)]
fn load() -> Settings {
    use winreg::RegKey;
    use winreg::enums::HKEY_CURRENT_USER;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let Ok(key) = hkcu.open_subkey(REG_SUBKEY) else {
        return Settings::default();
    };
    let dword = |name: &str| key.get_value::<u32, _>(name).ok();
    Settings::from_raw(dword(VALUE_MAX_SOURCE_MIB), dword(VALUE_MAX_DECODE_MIB), dword(VALUE_MAX_THUMBNAIL_SIZE))
}

#[cfg(not(windows))]
fn load() -> Settings {
    Settings::default()
}

/// Reads the persisted logging flag (missing = OFF).
#[cfg(windows)]
pub(crate) fn read_log_enabled() -> bool {
    use winreg::RegKey;
    use winreg::enums::HKEY_CURRENT_USER;

    RegKey::predef(HKEY_CURRENT_USER)
        .open_subkey(REG_SUBKEY)
        .and_then(|key| key.get_value::<u32, _>(VALUE_LOG_ENABLED))
        .map(|v| v != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
pub(crate) fn read_log_enabled() -> bool {
    std::env::var_os("TEXVIEW_THUMB_LOG").is_some_and(|v| v != "0" && !v.is_empty())
}

/// Writes the logging flag, creating the subkey if missing.
#[cfg(windows)]
pub(crate) fn persist_log_enabled(on: bool) -> std::io::Result<()> {
    use winreg::RegKey;
    use winreg::enums::HKEY_CURRENT_USER;

    let (key, _disp) = RegKey::predef(HKEY_CURRENT_USER).create_subkey(REG_SUBKEY)?;
    key.set_value(VALUE_LOG_ENABLED, &(if on { 1u32 } else { 0u32 }))
}

#[cfg(not(windows))]
pub(crate) fn persist_log_enabled(_on: bool) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_zero_values_use_defaults() {
        assert_eq!(Settings::from_raw(None, None, None), Settings::default());
        assert_eq!(Settings::from_raw(Some(0), Some(0), Some(0)), Settings::default());
    }

    #[test]
    fn raw_values_are_scaled_to_bytes() {
        let s = Settings::from_raw(Some(8), Some(16), Some(512));
        assert_eq!(s.max_source_bytes, 8 * MIB);
        assert_eq!(s.max_decode_bytes, 16 * MIB);
        assert_eq!(s.max_thumbnail_size, 512);
    }

    #[test]
    fn current_is_stable_across_calls() {
        assert!(std::ptr::eq(current(), current()));
        assert!(current().max_thumbnail_size > 0);
    }
}
