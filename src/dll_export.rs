use crate::class_factory::TexThumbClassFactory;
use crate::utils::guid::GuidExt;
use crate::{CLASS_E_CLASSNOTAVAILABLE, CLSID_TEXVIEW_THUMB, DLL_LOCK_COUNT};

use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::Ordering;

use crate::log::{log, log_enabled};
use windows::Win32::Foundation::{E_NOINTERFACE, E_POINTER, S_FALSE, S_OK};
use windows::Win32::System::Com::{APTTYPE, APTTYPEQUALIFIER, CoGetApartmentType, IClassFactory};
use windows::Win32::System::LibraryLoader::GetModuleFileNameW;
use windows::Win32::System::Threading::{GetCurrentProcess, GetCurrentProcessId, GetCurrentThreadId, IsWow64Process};
use windows_core::{BOOL, GUID, HRESULT, IUnknown, Interface};

fn log_host_environment() {
    let pid = unsafe { GetCurrentProcessId() };
    let tid = unsafe { GetCurrentThreadId() };

    let mut buf = [0u16; 260];
    let n = unsafe { GetModuleFileNameW(None, &mut buf) } as usize;
    let exe = if n > 0 { String::from_utf16_lossy(&buf[..n]) } else { "<unknown>".to_string() };

    let mut wow = BOOL(0);
    let arch = unsafe {
        match IsWow64Process(GetCurrentProcess(), &mut wow) {
            Ok(()) if wow.as_bool() => "WOW64",
            Ok(()) => "native",
            Err(e) => {
                log(format!("IsWow64Process failed: {:?}", e));
                "unknown"
            }
        }
    };

    let (mut apt, mut qual) = (APTTYPE(0), APTTYPEQUALIFIER(0));
    let (apt_s, qual_s) = unsafe {
        match CoGetApartmentType(&mut apt, &mut qual) {
            Ok(_) => (format!("{:?}", apt), format!("{:?}", qual)),
            Err(_) => ("unknown".into(), "unknown".into()),
        }
    };

    log(format!("Host: exe='{}' pid={} tid={} arch={} apartment={} qual={}", exe, pid, tid, arch, apt_s, qual_s));
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllGetClassObject(rclsid: *const GUID, riid: *const GUID, ppv: *mut *mut c_void) -> HRESULT {
    if log_enabled() {
        log_host_environment();
    }

    if ppv.is_null() {
        log("DllGetClassObject: ppv=NULL -> E_POINTER");
        return E_POINTER;
    }
    unsafe {
        *ppv = null_mut();
    }

    let (Some(clsid), Some(iid)) = (unsafe { rclsid.as_ref() }, unsafe { riid.as_ref() }) else {
        log("DllGetClassObject: rclsid/riid=NULL -> E_POINTER");
        return E_POINTER;
    };
    log(format!("DllGetClassObject rclsid={} {} riid={} {}", clsid.known_name(), clsid.to_braced_upper(), iid.known_name(), iid.to_braced_upper()));

    if *clsid != CLSID_TEXVIEW_THUMB {
        log("DllGetClassObject: CLASS_E_CLASSNOTAVAILABLE");
        return CLASS_E_CLASSNOTAVAILABLE;
    }

    if *iid != IClassFactory::IID && *iid != IUnknown::IID {
        log("DllGetClassObject: unsupported riid -> E_NOINTERFACE");
        return E_NOINTERFACE;
    }

    let cf: IClassFactory = TexThumbClassFactory::new().into();
    unsafe {
        *ppv = cf.into_raw();
    }
    log("DllGetClassObject: returning IClassFactory -> S_OK");
    S_OK
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "system" fn DllCanUnloadNow() -> HRESULT {
    let locks = DLL_LOCK_COUNT.load(Ordering::SeqCst);
    let hr = if locks == 0 { S_OK } else { S_FALSE };
    log(format!("DllCanUnloadNow: DLL_LOCK_COUNT={} -> {}", locks, if locks == 0 { "S_OK" } else { "S_FALSE" }));
    hr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnail_provider::TexThumbProvider;
    use windows::Win32::UI::Shell::IThumbnailProvider;

    #[test]
    fn hands_out_class_factory_for_our_clsid() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut ppv = null_mut();
        let hr = DllGetClassObject(&CLSID_TEXVIEW_THUMB, &IClassFactory::IID, &mut ppv);
        assert_eq!(hr, S_OK);
        assert!(!ppv.is_null());
        let cf = unsafe { IClassFactory::from_raw(ppv) };
        let _tp: IThumbnailProvider = unsafe { cf.CreateInstance(None::<&IUnknown>) }.unwrap();
    }

    #[test]
    fn rejects_foreign_clsid_and_interfaces() {
        let mut ppv = null_mut();
        assert_eq!(DllGetClassObject(&GUID::zeroed(), &IClassFactory::IID, &mut ppv), CLASS_E_CLASSNOTAVAILABLE);
        assert!(ppv.is_null());
        assert_eq!(DllGetClassObject(&CLSID_TEXVIEW_THUMB, &IThumbnailProvider::IID, &mut ppv), E_NOINTERFACE);
        assert!(ppv.is_null());
        assert_eq!(DllGetClassObject(&CLSID_TEXVIEW_THUMB, &IClassFactory::IID, null_mut()), E_POINTER);
        assert_eq!(DllGetClassObject(std::ptr::null(), &IClassFactory::IID, &mut ppv), E_POINTER);
    }

    #[test]
    fn unload_blocked_while_providers_live() {
        let _guard = crate::COM_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let base = DLL_LOCK_COUNT.load(Ordering::SeqCst);
        let unk: IUnknown = TexThumbProvider::new().into();
        assert_eq!(DllCanUnloadNow(), S_FALSE);
        drop(unk);
        if base == 0 {
            assert_eq!(DllCanUnloadNow(), S_OK);
        }
    }
}
