//! Per-user installer for the thumbnail provider DLL.
//!
//! Build the DLL first and copy it to `./bin/texview_thumb_win.dll`; the installer
//! embeds it and re-materializes it under `%LOCALAPPDATA%\texview-thumb-win\`.

#[cfg(windows)]
#[path = "actions/mod.rs"]
mod actions;

#[cfg(windows)]
#[path = "utils/mod.rs"]
mod utils;

#[cfg(windows)]
static DLL_BYTES: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/bin/texview_thumb_win.dll"));

#[cfg(windows)]
fn main() -> std::io::Result<()> {
    use crate::actions::dialog::{Action, action_choose, action_execute};
    use texview_thumb_win::log::log;

    log("Installer started");
    loop {
        let (action, label) = action_choose()?;
        log(format!("Menu selection: {}", label));

        if action == Action::Exit {
            log("Installer exiting");
            break;
        }

        match action_execute(action) {
            Ok(()) => log(format!("Action '{}' completed successfully", label)),
            Err(err) => {
                log(format!("Action '{}' failed: {}", label, err));
                eprintln!("{} failed: {}", label, err);
            }
        }

        pause("\nPress Enter to return to the menu...");
    }
    Ok(())
}

#[cfg(windows)]
fn pause(msg: &str) {
    use std::io::{self, Write};

    print!("{msg}");
    let _ = io::stdout().flush();
    let mut _buf = String::new();
    let _ = io::stdin().read_line(&mut _buf);
}

#[cfg(not(windows))]
fn main() {
    eprintln!("texview-thumb-installer only runs on Windows");
    std::process::exit(1);
}
