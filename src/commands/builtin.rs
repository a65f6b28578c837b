use super::CommandResult;
use crate::error::Result;
use crate::repl::Repl;
use crate::ui::UI;

pub fn exit_command() -> Result<CommandResult> {
    UI::print_goodbye();
    Ok(CommandResult::Exit)
}

pub fn help_command() -> Result<CommandResult> {
    UI::print_help();
    Ok(CommandResult::Continue)
}

pub fn new_command(repl: &mut Repl) -> Result<CommandResult> {
    repl.new_session();
    Ok(CommandResult::Continue)
}

pub fn sessions_command(repl: &mut Repl) -> Result<CommandResult> {
    repl.list_sessions();
    Ok(CommandResult::Continue)
}

pub fn switch_command(repl: &mut Repl, id: &str) -> Result<CommandResult> {
    repl.switch_session(id);
    Ok(CommandResult::Continue)
}

pub fn rename_command(repl: &mut Repl, old: Option<&str>, new: &str) -> Result<CommandResult> {
    repl.rename_session(old, new);
    Ok(CommandResult::Continue)
}

pub fn delete_command(repl: &mut Repl, id: Option<&str>) -> Result<CommandResult> {
    repl.delete_session(id);
    Ok(CommandResult::Continue)
}

pub fn resync_command(repl: &mut Repl) -> Result<CommandResult> {
    repl.resync();
    Ok(CommandResult::Continue)
}

pub fn history_command(repl: &mut Repl) -> Result<CommandResult> {
    repl.show_history();
    Ok(CommandResult::Continue)
}

pub fn invalid_command(message: &str) -> Result<CommandResult> {
    UI::print_warning(message);
    Ok(CommandResult::Continue)
}
