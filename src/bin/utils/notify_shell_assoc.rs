use texview_thumb_win::log::log;
use windows::Win32::UI::Shell::{SHCNE_ASSOCCHANGED, SHCNF_IDLIST, SHChangeNotify};

/// Tells Explorer that file associations changed so it re-reads the ShellEx bindings.
pub fn notify_shell_assoc(reason: &str) {
    log(format!("Shell notify ({reason}): SHChangeNotify(SHCNE_ASSOCCHANGED, SHCNF_IDLIST)"));
    unsafe {
        SHChangeNotify(SHCNE_ASSOCCHANGED, SHCNF_IDLIST, None, None);
    }
}
