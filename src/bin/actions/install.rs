use crate::DLL_BYTES;
use crate::actions::bindings::{APPROVED, PERCEIVED_IMAGE, PERCEIVED_TYPE, THUMBNAIL_HANDLERS, clsid_key, extension_key, handler_clsid, progid_key, thumbnail_shellex_keys};
use crate::actions::uninstall::remove_bindings;
use crate::utils::notify_shell_assoc::notify_shell_assoc;
use crate::utils::regedit::Rk;
use std::path::PathBuf;
use std::{env, fs, io};
use texview_thumb_win::log::log;
use texview_thumb_win::utils::guid::GuidExt;
use texview_thumb_win::{DEFAULT_PROGID, FRIENDLY_NAME, SHELL_THUMB_HANDLER_CATID, SUPPORTED_EXTENSIONS};
use winreg::RegKey;
use winreg::enums::HKEY_CURRENT_USER;

pub fn install() -> io::Result<()> {
    install_inner().inspect_err(|err| log(format!("Install failed: {err}")))
}

fn materialize_dll() -> io::Result<PathBuf> {
    let base = env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Users\Default\AppData\Local"));
    let dir = base.join("texview-thumb-win");
    fs::create_dir_all(&dir).map_err(|e| {
        log(format!("Failed to create dir {}: {e}", dir.display()));
        e
    })?;
    let path = dir.join("texview_thumb_win.dll");
    log(format!("Writing DLL {} ({} bytes)", path.display(), DLL_BYTES.len()));
    fs::write(&path, DLL_BYTES).map_err(|e| {
        log(format!("Failed to write DLL {}: {e}", path.display()));
        e
    })?;
    Ok(path)
}

fn install_inner() -> io::Result<()> {
    log("Install (current user, thumbnail provider): start");

    let dll_path = materialize_dll()?;
    let root = RegKey::predef(HKEY_CURRENT_USER);
    let handler_clsid = handler_clsid();
    let thumb_catid = SHELL_THUMB_HANDLER_CATID.to_braced_upper();
    log(format!("Using CLSID={} THUMB category={}", handler_clsid, thumb_catid));

    log("Pre-clean: start");
    remove_bindings(&root)?;
    log("Pre-clean: done");

    Rk::open(&root, APPROVED)?.set(&handler_clsid, FRIENDLY_NAME)?;

    {
        let cls = Rk::open(&root, clsid_key())?;
        cls.set_default(FRIENDLY_NAME)?;
        let inproc = cls.sub("InprocServer32")?;
        inproc.set_default(dll_path.as_path())?;
        inproc.set("ThreadingModel", "Apartment")?;
        cls.sub(&format!(r"Implemented Categories\{}", thumb_catid))?;
    }

    {
        let pid = Rk::open(&root, progid_key())?;
        let has_name = pid
            .get::<String>("")
            .map(|s| !s.trim_matches(char::from(0)).is_empty())
            .unwrap_or(false);
        if !has_name {
            pid.set_default(FRIENDLY_NAME)?;
        }
        pid.sub("DefaultIcon")?.set_default(&format!("{},0", dll_path.display()))?;
    }

    for ext in SUPPORTED_EXTENSIONS {
        log(format!("Registering extension binding for {}", ext));
        let ext_key = Rk::open(&root, extension_key(ext))?;
        let current_progid = ext_key.get::<String>("").unwrap_or_default();
        if current_progid.trim_matches(char::from(0)).is_empty() {
            ext_key.set_default(DEFAULT_PROGID)?;
        }
        if ext_key.get::<String>(PERCEIVED_TYPE).is_err() {
            ext_key.set(PERCEIVED_TYPE, PERCEIVED_IMAGE)?;
        }
        Rk::open(&root, THUMBNAIL_HANDLERS)?.set(ext, &handler_clsid)?;
    }

    for key in thumbnail_shellex_keys() {
        Rk::open(&root, key)?.set_default(&handler_clsid)?;
    }

    notify_shell_assoc("install");
    log("Installed in HKCU. Restart Explorer or clear the thumbnail cache to refresh.");
    Ok(())
}
