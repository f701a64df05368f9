use std::path::{Path, PathBuf};
use std::{env, fs, io};

use crate::actions::bindings::handler_clsid;
use texview_thumb_win::log::log;
use winreg::RegKey;
use winreg::enums::{HKEY_CURRENT_USER, KEY_READ, KEY_SET_VALUE};

const SHELL_EXT_CACHE: &str = r"Software\Microsoft\Windows\CurrentVersion\Shell Extensions\Cached";

pub fn clear_cache() -> io::Result<()> {
    clear_cache_inner().inspect_err(|err| log(format!("Clear cache failed: {}", err)))
}

/// Forgets Explorer's cached activation entries for our CLSID and deletes the
/// per-user `thumbcache_*.db` files so stale thumbnails are regenerated.
fn clear_cache_inner() -> io::Result<()> {
    log("Clear cache: start");
    clear_activation_cache()?;

    match env::var_os("LOCALAPPDATA") {
        Some(local) => clear_thumbcache_files(&PathBuf::from(local).join(r"Microsoft\Windows\Explorer"))?,
        None => log("Clear cache: LOCALAPPDATA is not set"),
    }

    log("Clear cache: done");
    Ok(())
}

fn clear_activation_cache() -> io::Result<()> {
    let root = RegKey::predef(HKEY_CURRENT_USER);
    let key = match root.open_subkey_with_flags(SHELL_EXT_CACHE, KEY_READ | KEY_SET_VALUE) {
        Ok(key) => key,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log("Clear cache: shell extension cache key missing");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let braced = handler_clsid();
    let bare = braced.trim_matches(|c| c == '{' || c == '}').to_string();
    let stale: Vec<String> = key
        .enum_values()
        .filter_map(Result::ok)
        .map(|(name, _)| name)
        .filter(|name| {
            let upper = name.to_ascii_uppercase();
            upper.contains(&bare)
        })
        .collect();

    let removed = stale.iter().filter(|name| key.delete_value(name).is_ok()).count();
    log(format!("Clear cache: removed {} cached activation entries for {}", removed, braced));
    Ok(())
}

fn clear_thumbcache_files(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        log(format!("Clear cache: directory {} not found", dir.display()));
        return Ok(());
    }

    let mut removed = 0usize;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_cache = path.is_file() && path.file_name().and_then(|s| s.to_str()).is_some_and(|n| n.starts_with("thumbcache_"));
        if !is_cache {
            continue;
        }
        // Explorer keeps the live database open; those fail until it restarts.
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => log(format!("Clear cache: failed to remove {}: {}", path.display(), e)),
        }
    }
    log(format!("Clear cache: removed {} files from {}", removed, dir.display()));
    Ok(())
}
