use crate::actions::bindings::{APPROVED, PERCEIVED_IMAGE, PERCEIVED_TYPE, THUMBNAIL_HANDLERS, clsid_key, extension_key, handler_clsid, progid_key, thumbnail_shellex_keys};
use crate::utils::notify_shell_assoc::notify_shell_assoc;
use crate::utils::regedit::{delete_tree, delete_value};
use std::io;
use texview_thumb_win::{DEFAULT_PROGID, SUPPORTED_EXTENSIONS};
use texview_thumb_win::log::log;
use winreg::RegKey;
use winreg::enums::HKEY_CURRENT_USER;

pub fn uninstall() -> io::Result<()> {
    uninstall_inner().inspect_err(|err| log(format!("Uninstall failed: {}", err)))
}

/// Removes every key and value `install` writes, except the extension -> ProgID
/// defaults (other handlers may rely on them) and the materialized DLL.
/// `PerceivedType` is only removed from extensions still bound to our ProgID.
pub fn remove_bindings(root: &RegKey) -> io::Result<()> {
    let handler_clsid = handler_clsid();

    delete_value(root, APPROVED, &handler_clsid)?;
    for key in thumbnail_shellex_keys() {
        delete_tree(root, &key)?;
    }
    for ext in SUPPORTED_EXTENSIONS {
        delete_value(root, THUMBNAIL_HANDLERS, ext)?;
        if owns_perceived_type(root, ext) {
            delete_value(root, &extension_key(ext), PERCEIVED_TYPE)?;
        }
    }
    delete_tree(root, &format!(r"{}\DefaultIcon", progid_key()))?;
    delete_tree(root, &clsid_key())
}

fn owns_perceived_type(root: &RegKey, ext: &str) -> bool {
    let Ok(key) = root.open_subkey(extension_key(ext)) else {
        return false;
    };
    let progid = key.get_value::<String, _>("").unwrap_or_default();
    let perceived = key.get_value::<String, _>(PERCEIVED_TYPE).unwrap_or_default();
    progid.trim_end_matches('\0') == DEFAULT_PROGID && perceived.trim_end_matches('\0') == PERCEIVED_IMAGE
}

fn uninstall_inner() -> io::Result<()> {
    log("Uninstall (current user): start");
    let root = RegKey::predef(HKEY_CURRENT_USER);
    remove_bindings(&root)?;
    notify_shell_assoc("uninstall");
    log("Uninstall completed (HKCU). Thumbnail bindings removed.");
    Ok(())
}
