use crate::DLL_LOCK_COUNT;
use crate::log::log;
use crate::thumbnail_provider::TexThumbProvider;
use crate::utils::guid::GuidExt;
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::Ordering;
use windows::Win32::Foundation::{CLASS_E_NOAGGREGATION, E_POINTER};
use windows::Win32::System::Com::IClassFactory_Impl;
use windows::core::{Error, IUnknown, Interface};
use windows_core::{BOOL, GUID};
use windows_implement::implement;

#[implement(windows::Win32::System::Com::IClassFactory)]
pub struct TexThumbClassFactory;

impl TexThumbClassFactory {
    pub fn new() -> Self {
        Self
    }
}

impl IClassFactory_Impl for TexThumbClassFactory_Impl {
    #[allow(non_snake_case)]
    fn CreateInstance(&self, outer: windows::core::Ref<'_, IUnknown>, riid: *const GUID, ppv: *mut *mut c_void) -> windows::core::Result<()> {
        if ppv.is_null() || riid.is_null() {
            log("IClassFactory::CreateInstance result=E_POINTER");
            return Err(Error::from(E_POINTER));
        }
        unsafe {
            *ppv = null_mut();
        }

        let iid: &GUID = unsafe { &*riid };
        log(format!("IClassFactory::CreateInstance riid={} {}", iid.known_name(), iid.to_braced_upper()));

        if outer.ok().is_ok() {
            log("IClassFactory::CreateInstance result=CLASS_E_NOAGGREGATION");
            return Err(Error::from(CLASS_E_NOAGGREGATION));
        }

        // QueryInterface on the fresh object is the capability table. On failure
        // *ppv stays null and the object dies with `unk`.
        let unk: IUnknown = TexThumbProvider::new().into();
        let hr = unsafe { unk.query(iid, ppv) };
        log(format!("IClassFactory::CreateInstance result=0x{:08X}", hr.0 as u32));
        hr.ok()
    }

    #[allow(non_snake_case)]
    fn LockServer(&self, f_lock: BOOL) -> windows::core::Result<()> {
        if f_lock.as_bool() {
            let new = DLL_LOCK_COUNT.fetch_add(1, Ordering::SeqCst) + 1;
            log(format!("IClassFactory::LockServer lock=true new_lock_count={}", new));
        } else {
            match DLL_LOCK_COUNT.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
                Ok(prev) => log(format!("IClassFactory::LockServer lock=false new_lock_count={}", prev - 1)),
                Err(_) => log("IClassFactory::LockServer lock=false ignored, count already 0"),
            }
        }
        Ok(())
    }
}
