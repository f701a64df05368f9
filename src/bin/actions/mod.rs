pub mod bindings;
pub mod clear_cache;
pub mod dialog;
pub mod install;
pub mod restart_explorer;
pub mod toggle_logging;
pub mod uninstall;
