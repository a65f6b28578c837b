use crate::conversation::{Message, Role};
use crate::session::SessionId;
use crate::streaming::{IngestState, ERROR_PREFIX};
use colored::Colorize;
use std::io::{self, Write};

/// Message severity levels for consistent UI feedback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageSeverity {
    /// Recoverable issues, non-critical problems
    Warning,
    /// Actual failures (network, IO, parsing errors)
    Error,
    Info,
    Success,
}

impl MessageSeverity {
    pub fn prefix(&self) -> colored::ColoredString {
        match self {
            Self::Warning => "Warning:".bright_yellow().bold(),
            Self::Error => "Error:".bright_red().bold(),
            Self::Info => "Info:".bright_cyan().bold(),
            Self::Success => "Success:".bright_green().bold(),
        }
    }
}

/// What changed in a streamed reply since it was last printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDelta {
    Nothing,
    /// New text at the end of what is already on screen
    Append(String),
    /// The reply failed; its content was replaced by the error text
    Replace(String),
}

/// Prints a streamed reply incrementally, one delta per update
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: String,
}

impl ReplyPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delta(&mut self, reply: &Message) -> ReplyDelta {
        if reply.content == self.printed {
            return ReplyDelta::Nothing;
        }
        // Completion only clears `pending`; a content change that arrives
        // with it is the failure text replacing the reply
        let tail = match reply.pending {
            true => reply.content.strip_prefix(self.printed.as_str()),
            false => None,
        };
        let delta = match tail {
            Some(tail) => ReplyDelta::Append(tail.to_string()),
            None => ReplyDelta::Replace(reply.content.clone()),
        };
        self.printed = reply.content.clone();
        delta
    }

    pub fn update(&mut self, reply: &Message) {
        match self.delta(reply) {
            ReplyDelta::Nothing => {}
            ReplyDelta::Append(text) => {
                print!("{}", text);
                let _ = io::stdout().flush();
            }
            ReplyDelta::Replace(content) => {
                println!();
                match content.strip_prefix(ERROR_PREFIX) {
                    Some(reason) => UI::print_error(reason),
                    None => println!("{}", content),
                }
            }
        }
    }

    pub fn finish(&self, state: IngestState) {
        if state == IngestState::Completed {
            if self.printed.is_empty() {
                println!("{}", "(empty reply)".dimmed());
            } else {
                println!();
            }
        }
        println!();
    }
}

/// UI utilities for displaying messages, sessions and help
pub struct UI;

impl UI {
    pub fn print_message(severity: MessageSeverity, message: &str) {
        eprintln!("{} {}", severity.prefix(), message);
    }

    pub fn print_warning(message: &str) {
        Self::print_message(MessageSeverity::Warning, message);
    }

    pub fn print_error(message: &str) {
        Self::print_message(MessageSeverity::Error, message);
    }

    pub fn print_info(message: &str) {
        Self::print_message(MessageSeverity::Info, message);
    }

    pub fn print_success(message: &str) {
        Self::print_message(MessageSeverity::Success, message);
    }

    pub fn print_welcome(base_url: &str) {
        println!("{}", "ragchat - RAG Chat Client".bright_cyan().bold());
        println!("{} {}", "Server:".bright_cyan(), base_url.dimmed());
        println!("{}", "Type your message, or /help for commands.".dimmed());
        println!("{}", "Press Ctrl-C while a reply streams to cancel it.".dimmed());
        println!();
    }

    pub fn print_goodbye() {
        println!("{}", "Goodbye!".bright_cyan());
    }

    pub fn print_help() {
        let commands = [
            ("/new", "Create a session and switch to it"),
            ("/sessions", "List sessions"),
            ("/switch <id>", "Switch to another session"),
            ("/rename [<old>] <new>", "Rename a session (default: current)"),
            ("", "Quote ids that contain spaces: \"my notes\""),
            ("/delete [<id>]", "Delete a session (default: current)"),
            ("/resync", "Reload sessions from the server"),
            ("/history", "Reload and show the current session"),
            ("/exit", "Quit"),
        ];
        println!("{}", "Commands:".bright_cyan().bold());
        for (command, description) in commands {
            println!("  {:<24} {}", command.bright_white(), description.dimmed());
        }
        println!();
    }

    pub fn print_sessions(sessions: &[SessionId], current: Option<&SessionId>) {
        if sessions.is_empty() {
            println!("{}", "No sessions.".dimmed());
            return;
        }
        for session in sessions {
            if Some(session) == current {
                println!("{} {}", "*".bright_green().bold(), session.as_str().bright_green());
            } else {
                println!("  {}", session);
            }
        }
        println!();
    }

    pub fn print_current_session(session: Option<&SessionId>) {
        match session {
            Some(session) => println!("{} {}", "Session:".bright_cyan(), session),
            None => println!("{}", "No session selected.".dimmed()),
        }
    }

    pub fn print_history(messages: &[Message]) {
        if messages.is_empty() {
            println!("{}", "No messages in this session yet.".dimmed());
            println!();
            return;
        }

        println!("{}", "═".repeat(80).bright_cyan());
        for message in messages {
            match message.role {
                Role::User => println!("{} {}", "λ>".bright_green().bold(), message.content),
                Role::Assistant => {
                    println!("{}", "Assistant:".bright_blue().bold());
                    println!("{}", message.content);
                }
            }
            println!();
        }
        println!("{}", "═".repeat(80).bright_cyan());
        println!();
    }

    pub fn print_assistant_header() {
        println!("{}", "Assistant:".bright_blue().bold());
    }

    pub fn print_prompt(session: Option<&SessionId>) {
        match session {
            Some(session) => {
                print!("{} {} ", session.as_str().dimmed(), "λ>".bright_green().bold())
            }
            None => print!("{} ", "λ>".bright_green().bold()),
        }
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::MessageId;

    fn reply(content: &str) -> Message {
        Message {
            pending: true,
            ..Message::assistant(MessageId(1), content)
        }
    }

    fn finished(content: &str) -> Message {
        Message::assistant(MessageId(1), content)
    }

    #[test]
    fn test_reply_printer_appends_new_text_only() {
        let mut printer = ReplyPrinter::new();

        assert_eq!(printer.delta(&reply("Hel")), ReplyDelta::Append("Hel".to_string()));
        assert_eq!(printer.delta(&reply("Hello")), ReplyDelta::Append("lo".to_string()));
        assert_eq!(printer.delta(&reply("Hello")), ReplyDelta::Nothing);
    }

    #[test]
    fn test_reply_printer_replaces_on_failure() {
        let mut printer = ReplyPrinter::new();
        printer.delta(&reply("partial"));

        let delta = printer.delta(&finished("Error: connection reset"));

        assert_eq!(
            delta,
            ReplyDelta::Replace("Error: connection reset".to_string())
        );
    }

    #[test]
    fn test_reply_printer_replaces_when_failing_before_any_chunk() {
        let mut printer = ReplyPrinter::new();

        let delta = printer.delta(&finished("Error: Network error: connection refused"));

        assert_eq!(
            delta,
            ReplyDelta::Replace("Error: Network error: connection refused".to_string())
        );
    }

    #[test]
    fn test_reply_printer_ignores_completion() {
        let mut printer = ReplyPrinter::new();
        printer.delta(&reply("done"));

        assert_eq!(printer.delta(&finished("done")), ReplyDelta::Nothing);
    }

    #[test]
    fn test_reply_printer_handles_multibyte_text() {
        let mut printer = ReplyPrinter::new();
        printer.delta(&reply("héllo"));

        assert_eq!(
            printer.delta(&reply("héllo wörld")),
            ReplyDelta::Append(" wörld".to_string())
        );
    }
}
