use windows::Win32::System::Com::IClassFactory;
use windows::Win32::UI::Shell::PropertiesSystem::{IInitializeWithFile, IInitializeWithStream};
use windows::Win32::UI::Shell::{IInitializeWithItem, IThumbnailProvider};
use windows_core::{GUID, IUnknown, Interface};

use crate::CLSID_TEXVIEW_THUMB;

/// GUID formatting and log-friendly names for the identifiers the host passes us.
pub trait GuidExt {
    /// `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` upper-case with braces.
    fn to_braced_upper(&self) -> String;

    /// Short name of a known IID/CLSID, `"unknown"` otherwise.
    fn known_name(&self) -> &'static str;
}

impl GuidExt for GUID {
    fn to_braced_upper(&self) -> String {
        format!("{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}", self.data1, self.data2, self.data3, self.data4[0], self.data4[1], self.data4[2], self.data4[3], self.data4[4], self.data4[5], self.data4[6], self.data4[7])
    }

    fn known_name(&self) -> &'static str {
        if *self == IUnknown::IID {
            "IUnknown"
        } else if *self == IThumbnailProvider::IID {
            "IThumbnailProvider"
        } else if *self == IInitializeWithFile::IID {
            "IInitializeWithFile"
        } else if *self == IInitializeWithItem::IID {
            "IInitializeWithItem"
        } else if *self == IInitializeWithStream::IID {
            "IInitializeWithStream"
        } else if *self == IClassFactory::IID {
            "IClassFactory"
        } else if *self == CLSID_TEXVIEW_THUMB {
            "CLSID_TEXVIEW_THUMB"
        } else {
            "unknown"
        }
    }
}
