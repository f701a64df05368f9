//! Registry locations shared by install and uninstall, so both touch exactly the same keys.

use texview_thumb_win::utils::guid::GuidExt;
use texview_thumb_win::{CLSID_TEXVIEW_THUMB, DEFAULT_PROGID, SHELL_THUMB_HANDLER_CATID, SUPPORTED_EXTENSIONS};

pub const APPROVED: &str = r"Software\Microsoft\Windows\CurrentVersion\Shell Extensions\Approved";
pub const THUMBNAIL_HANDLERS: &str = r"Software\Microsoft\Windows\CurrentVersion\Explorer\ThumbnailHandlers";
pub const PERCEIVED_TYPE: &str = "PerceivedType";
pub const PERCEIVED_IMAGE: &str = "image";

pub fn handler_clsid() -> String {
    CLSID_TEXVIEW_THUMB.to_braced_upper()
}

pub fn clsid_key() -> String {
    format!(r"Software\Classes\CLSID\{}", handler_clsid())
}

pub fn progid_key() -> String {
    format!(r"Software\Classes\{}", DEFAULT_PROGID)
}

pub fn extension_key(ext: &str) -> String {
    format!(r"Software\Classes\{}", ext)
}

/// Every `...\ShellEx\{thumbnail category}` key that points at our CLSID.
pub fn thumbnail_shellex_keys() -> Vec<String> {
    let catid = SHELL_THUMB_HANDLER_CATID.to_braced_upper();
    let mut keys = vec![format!(r"{}\ShellEx\{}", progid_key(), catid)];
    for ext in SUPPORTED_EXTENSIONS {
        keys.push(format!(r"{}\ShellEx\{}", extension_key(ext), catid));
        keys.push(format!(r"Software\Classes\SystemFileAssociations\{}\ShellEx\{}", ext, catid));
    }
    keys
}
