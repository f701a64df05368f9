use std::io;
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::Duration;
use texview_thumb_win::log::log;

fn quiet(cmd: &mut Command) -> &mut Command {
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null())
}

fn explorer_count() -> usize {
    Command::new("tasklist")
        .args(["/FI", "IMAGENAME eq explorer.exe", "/FO", "CSV", "/NH"])
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter(|l| l.contains("explorer.exe"))
                .count()
        })
        .unwrap_or(0)
}

/// Restarts Explorer so it drops the loaded provider DLL and re-reads the bindings.
pub fn restart_explorer() -> io::Result<()> {
    log(format!("Restart Explorer: {} explorer.exe process(es) running", explorer_count()));

    match quiet(Command::new("taskkill").args(["/F", "/IM", "explorer.exe"])).status() {
        Ok(status) => log(format!("Restart Explorer: taskkill exit code {:?}", status.code())),
        Err(err) => log(format!("Restart Explorer: taskkill failed ({err})")),
    }
    sleep(Duration::from_millis(400));

    if let Err(err) = quiet(&mut Command::new("explorer.exe")).spawn() {
        log(format!("Restart Explorer: direct spawn failed ({err}); retrying via cmd /C start"));
        quiet(Command::new("cmd").args(["/C", "start", "", "explorer.exe"])).status()?;
    }

    sleep(Duration::from_millis(250));
    log(format!("Restart Explorer: done, {} explorer.exe process(es) running", explorer_count()));
    Ok(())
}
