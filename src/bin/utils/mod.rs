pub mod notify_shell_assoc;
pub mod regedit;
