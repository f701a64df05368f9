use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use texview_thumb_win::log::log;
use winreg::RegKey;
use winreg::enums::{KEY_READ, KEY_SET_VALUE};
use winreg::types::FromRegValue;

/// A created-or-opened registry key that logs every write with its full path.
pub struct Rk {
    path: String,
    key: RegKey,
}

/// Owned registry value, converted from whatever the call site has at hand.
pub enum RegVal {
    Sz(OsString),
    Dword(u32),
}

pub trait IntoRegVal {
    fn into_reg_val(self) -> RegVal;
}

impl IntoRegVal for &str {
    fn into_reg_val(self) -> RegVal {
        RegVal::Sz(self.into())
    }
}
impl IntoRegVal for &String {
    fn into_reg_val(self) -> RegVal {
        RegVal::Sz(self.into())
    }
}
impl IntoRegVal for &OsStr {
    fn into_reg_val(self) -> RegVal {
        RegVal::Sz(self.to_os_string())
    }
}
impl IntoRegVal for &Path {
    fn into_reg_val(self) -> RegVal {
        RegVal::Sz(self.as_os_str().to_os_string())
    }
}
impl IntoRegVal for u32 {
    fn into_reg_val(self) -> RegVal {
        RegVal::Dword(self)
    }
}

impl Rk {
    pub fn open(root: &RegKey, path: impl Into<String>) -> io::Result<Self> {
        let path = path.into();
        let (key, _) = root.create_subkey(&path)?;
        log(format!("Opened registry key: {}", path));
        Ok(Self { path, key })
    }

    pub fn sub(&self, suffix: &str) -> io::Result<Rk> {
        let (key, _) = self.key.create_subkey(suffix)?;
        let path = format!(r"{}\{}", self.path, suffix);
        log(format!("Opened registry key: {}", path));
        Ok(Rk { path, key })
    }

    pub fn set<V: IntoRegVal>(&self, name: &str, value: V) -> io::Result<()> {
        let shown = if name.is_empty() { "(Default)" } else { name };
        match value.into_reg_val() {
            RegVal::Sz(s) => {
                log(format!("Setting {}\\{} = REG_SZ {:?}", self.path, shown, s));
                self.key.set_value(name, &s)?;
            }
            RegVal::Dword(d) => {
                log(format!("Setting {}\\{} = REG_DWORD {}", self.path, shown, d));
                self.key.set_value(name, &d)?;
            }
        }
        Ok(())
    }

    pub fn set_default<V: IntoRegVal>(&self, value: V) -> io::Result<()> {
        self.set("", value)
    }

    pub fn get<T: FromRegValue>(&self, name: &str) -> io::Result<T> {
        self.key.get_value(name)
    }
}

/// Removes a key and everything below it. A missing key is not an error.
pub fn delete_tree(root: &RegKey, path: &str) -> io::Result<()> {
    match root.delete_subkey_all(path) {
        Ok(()) => log(format!("Removed key tree: {}", path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => log(format!("Key missing (skip): {}", path)),
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Removes one value. A missing key or value is not an error.
pub fn delete_value(root: &RegKey, key_path: &str, value_name: &str) -> io::Result<()> {
    let key = match root.open_subkey_with_flags(key_path, KEY_READ | KEY_SET_VALUE) {
        Ok(key) => key,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log(format!("Key missing (skip): {}", key_path));
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    match key.delete_value(value_name) {
        Ok(()) => log(format!("Removed value: {}\\{}", key_path, value_name)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => log(format!("Value missing (skip): {}\\{}", key_path, value_name)),
        Err(e) => return Err(e),
    }
    Ok(())
}
