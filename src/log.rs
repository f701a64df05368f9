//! Minimal logging for the thumbnail provider.
//! - Windows: OutputDebugStringW (DebugView), OFF by default, one-time init from
//!   HKCU\Software\texview-thumb-win\LogEnabled (DWORD 0/1).
//! - Elsewhere: stderr, enabled by the `TEXVIEW_THUMB_LOG` environment variable.
//! - State then lives in-process. toggle_logging() flips it AND persists it.
//! - Public API: log_enabled(), toggle_logging(), log(...).
//! - Debug-sink lines are prefixed with `[pid:tid]`.

use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, Ordering};
use std::io::{self, Write};
use std::sync::Once;

use crate::settings;

// Process-local on/off flag
static LOG_ON: AtomicBool = AtomicBool::new(false);

// One-time init guard
static INIT_ONCE: Once = Once::new();

/// Returns current logging state (initializes once on first call).
#[inline]
pub fn log_enabled() -> bool {
    ensure_init();
    LOG_ON.load(Ordering::Relaxed)
}

/// Flips logging state AND persists it (registry on Windows).
pub fn toggle_logging() {
    ensure_init();
    let new = !LOG_ON.load(Ordering::Relaxed);
    LOG_ON.store(new, Ordering::Relaxed);
    if let Err(err) = settings::persist_log_enabled(new) {
        sink::emit(&format!("[texview-thumb] failed to persist logging flag: {}", err));
    }
    sink::emit(if new { "[texview-thumb] logging: ON" } else { "[texview-thumb] logging: OFF" });

    if new {
        println!(
            "[texview-thumb] Logging enabled.\n\
             To view debug output, use Sysinternals DebugView:\n\
             https://learn.microsoft.com/en-us/sysinternals/downloads/debugview"
        );
    }
}

/// Logs a message to STDOUT (if a console is attached) and to the debug sink (if enabled).
#[inline]
pub fn log(message: impl AsRef<str>) {
    let msg = message.as_ref();

    if sink::console_attached() {
        let mut out = io::stdout();
        let _ = out.write_all(msg.as_bytes());
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }

    if !log_enabled() {
        return;
    }

    let mut line = String::with_capacity(32 + msg.len());
    let _ = write!(line, "[{}:{}] {}", std::process::id(), sink::thread_tag(), msg);
    sink::emit(&line);
}

#[inline]
fn ensure_init() {
    INIT_ONCE.call_once(|| {
        let enabled = settings::read_log_enabled();
        LOG_ON.store(enabled, Ordering::Relaxed);
        if enabled {
            sink::emit("[texview-thumb] logging init: enabled");
        }
    });
}

#[cfg(windows)]
mod sink {
    use windows::Win32::System::Console::GetConsoleWindow;
    use windows::Win32::System::Diagnostics::Debug::OutputDebugStringW;
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::core::PCWSTR;

    #[inline]
    pub(super) fn console_attached() -> bool {
        let hwnd = unsafe { GetConsoleWindow() };
        !hwnd.0.is_null()
    }

    #[inline]
    pub(super) fn thread_tag() -> u32 {
        unsafe { GetCurrentThreadId() }
    }

    /// Emit a NUL-terminated UTF-16 string to OutputDebugStringW.
    #[inline]
    pub(super) fn emit(s: &str) {
        let mut wide = Vec::with_capacity(s.len() + 1);
        wide.extend(s.encode_utf16());
        wide.push(0);
        unsafe {
            OutputDebugStringW(PCWSTR(wide.as_ptr()));
        }
    }
}

#[cfg(not(windows))]
mod sink {
    use std::io::Write;

    #[inline]
    pub(super) fn console_attached() -> bool {
        false
    }

    #[inline]
    pub(super) fn thread_tag() -> String {
        format!("{:?}", std::thread::current().id())
    }

    #[inline]
    pub(super) fn emit(s: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_never_panics_regardless_of_state() {
        log("plain message");
        log(format!("formatted {} {}", 1, "two"));
        assert_eq!(log_enabled(), log_enabled());
    }
}
