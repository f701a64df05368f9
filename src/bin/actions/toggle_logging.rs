use std::io;
use texview_thumb_win::log::{log, log_enabled};

pub fn toggle_logging() -> io::Result<()> {
    texview_thumb_win::log::toggle_logging();
    log(format!("Logging is now {}", if log_enabled() { "enabled" } else { "disabled" }));
    Ok(())
}
