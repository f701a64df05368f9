use crate::actions::clear_cache::clear_cache;
use crate::actions::install::install;
use crate::actions::restart_explorer::restart_explorer;
use crate::actions::toggle_logging::toggle_logging;
use crate::actions::uninstall::uninstall;
use dialoguer::Select;
use dialoguer::console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use std::io;
use texview_thumb_win::log::log_enabled;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Install,
    Uninstall,
    RestartExplorer,
    ClearThumbCache,
    ToggleLogging,
    Exit,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Action::Install => "Install (current user)",
            Action::Uninstall => "Uninstall (current user)",
            Action::RestartExplorer => "Restart Explorer",
            Action::ClearThumbCache => "Clear thumbnail cache",
            Action::ToggleLogging if log_enabled() => "Disable log",
            Action::ToggleLogging => "Enable log",
            Action::Exit => "Exit",
        }
    }
}

const MENU: [Action; 6] = [Action::Install, Action::Uninstall, Action::RestartExplorer, Action::ClearThumbCache, Action::ToggleLogging, Action::Exit];

/// ASCII-only theme; the default arrows render as mojibake in legacy consoles.
fn theme() -> ColorfulTheme {
    ColorfulTheme {
        active_item_prefix: style(">".to_string()),
        inactive_item_prefix: style(" ".to_string()),
        picked_item_prefix: style(">".to_string()),
        unpicked_item_prefix: style(" ".to_string()),
        prompt_prefix: style("$".to_string()),
        success_prefix: style(">".to_string()),
        error_prefix: style("!".to_string()),
        ..ColorfulTheme::default()
    }
}

pub fn action_choose() -> io::Result<(Action, String)> {
    let labels: Vec<&str> = MENU.iter().map(|a| a.label()).collect();

    let idx = Select::with_theme(&theme())
        .with_prompt("TexView thumbnail provider installer")
        .items(&labels)
        .default(0)
        .interact_on(&Term::stdout())?;

    Ok((MENU[idx], labels[idx].to_string()))
}

pub fn action_execute(action: Action) -> io::Result<()> {
    match action {
        Action::Install => install(),
        Action::Uninstall => uninstall(),
        Action::RestartExplorer => restart_explorer(),
        Action::ClearThumbCache => clear_cache(),
        Action::ToggleLogging => toggle_logging(),
        Action::Exit => Ok(()),
    }
}
