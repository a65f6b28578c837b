use crate::error::Result;
use crate::repl::Repl;

pub mod builtin;

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Continue REPL loop
    Continue,
    /// Exit REPL loop
    Exit,
}

/// Enum representing all available REPL commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    New,
    Sessions,
    Switch(String),
    Rename { old: Option<String>, new: String },
    Delete(Option<String>),
    Resync,
    History,
    /// A slash command that is unknown or misses arguments
    Invalid(String),
}

impl Command {
    /// Parse a line of input. Returns `None` for anything that is not a
    /// slash command, which is then sent as a chat message.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let Some(args) = split_args(rest) else {
            return Some(Command::Invalid(format!("Unterminated quote in: {}", line)));
        };
        // A lone quoted argument is taken without its quotes, anything else verbatim
        let whole = match args.as_slice() {
            [one] => one.clone(),
            _ => rest.to_string(),
        };

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("/exit" | "/quit" | "/q", _) => Command::Exit,
            ("/help" | "/?", _) => Command::Help,
            ("/new", []) => Command::New,
            ("/sessions" | "/ls", []) => Command::Sessions,
            ("/switch", [_, ..]) => Command::Switch(whole),
            ("/rename", [new]) => Command::Rename {
                old: None,
                new: new.clone(),
            },
            ("/rename", [old, new]) => Command::Rename {
                old: Some(old.clone()),
                new: new.clone(),
            },
            ("/delete", []) => Command::Delete(None),
            ("/delete", [_, ..]) => Command::Delete(Some(whole)),
            ("/resync", []) => Command::Resync,
            ("/history", []) => Command::History,
            ("/switch", []) => Command::Invalid("Usage: /switch <id>".to_string()),
            ("/rename", _) => Command::Invalid("Usage: /rename [<old>] <new>".to_string()),
            _ => Command::Invalid(format!("Unknown command: {} (try /help)", line)),
        };
        Some(command)
    }

    pub fn execute(&self, repl: &mut Repl) -> Result<CommandResult> {
        match self {
            Command::Exit => builtin::exit_command(),
            Command::Help => builtin::help_command(),
            Command::New => builtin::new_command(repl),
            Command::Sessions => builtin::sessions_command(repl),
            Command::Switch(id) => builtin::switch_command(repl, id),
            Command::Rename { old, new } => builtin::rename_command(repl, old.as_deref(), new),
            Command::Delete(id) => builtin::delete_command(repl, id.as_deref()),
            Command::Resync => builtin::resync_command(repl),
            Command::History => builtin::history_command(repl),
            Command::Invalid(message) => builtin::invalid_command(message),
        }
    }
}

/// Split command arguments on whitespace, keeping double-quoted text
/// together. Returns `None` when a quote is left open.
fn split_args(rest: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;

    for c in rest.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_arg = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if quoted {
        return None;
    }
    if in_arg {
        args.push(current);
    }
    Some(args)
}
