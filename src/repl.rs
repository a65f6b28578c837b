use crate::api::HttpChatService;
use crate::chat::ChatClient;
use crate::commands::{Command, CommandResult};
use crate::error::{ChatError, Result};
use crate::error_ext::ResultExt;
use crate::history::LoadOutcome;
use crate::session::SessionId;
use crate::ui::{ReplyPrinter, UI};
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Exit status after an interrupt outside of a streamed reply
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Routes Ctrl-C: while a reply streams it cancels that send, otherwise the
/// program quits.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptHandle {
    pub fn arm(&self, cancel: CancellationToken) {
        if let Ok(mut active) = self.active.lock() {
            *active = Some(cancel);
        }
    }

    pub fn disarm(&self) {
        if let Ok(mut active) = self.active.lock() {
            *active = None;
        }
    }

    /// Cancel the armed send. Returns false when nothing was streaming.
    pub fn interrupt(&self) -> bool {
        let armed = self.active.lock().ok().and_then(|mut active| active.take());
        match armed {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Line-oriented terminal front end. Owns the runtime and blocks on every
/// chat operation, so only one operation runs at a time.
pub struct Repl {
    runtime: tokio::runtime::Runtime,
    client: ChatClient<HttpChatService>,
    base_url: String,
    interrupts: InterruptHandle,
}

impl Repl {
    pub fn new(service: HttpChatService, base_url: String) -> Result<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ChatError::Config(format!("Failed to create async runtime: {}", e)))?;

        // One listener for the REPL's lifetime: installing it replaces the
        // default SIGINT handling for the whole process
        let interrupts = InterruptHandle::default();
        let handle = interrupts.clone();
        runtime.spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !handle.interrupt() {
                    println!();
                    UI::print_goodbye();
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        });

        Ok(Self {
            runtime,
            client: ChatClient::new(service),
            base_url,
            interrupts,
        })
    }

    /// Fetch sessions and open `session` if given, otherwise the server's
    /// first one
    pub fn start(&mut self, session: Option<&str>) -> Result<()> {
        self.runtime.block_on(self.client.start())?;

        if let Some(session) = session {
            let session = SessionId::from_input(session)?;
            self.runtime.block_on(self.client.select(&session))?;
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        UI::print_welcome(&self.base_url);
        UI::print_current_session(self.client.current());
        UI::print_history(self.client.messages());

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut line = String::new();

        loop {
            UI::print_prompt(self.client.current());

            line.clear();
            if input.read_line(&mut line)? == 0 {
                println!();
                UI::print_goodbye();
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(command) = Command::parse(line) {
                if command.execute(self)? == CommandResult::Exit {
                    break;
                }
                continue;
            }

            if let Err(e) = self.send_message(line) {
                UI::print_error(&e.to_string());
            }
        }

        Ok(())
    }

    pub fn process_single_prompt(&mut self, prompt: &str) -> Result<()> {
        self.send_message(prompt)
    }

    /// Send one message and print the reply as it streams in. Ctrl-C
    /// cancels the stream, not the program.
    pub fn send_message(&mut self, text: &str) -> Result<()> {
        let cancel = CancellationToken::new();
        self.interrupts.arm(cancel.clone());

        UI::print_assistant_header();
        let mut printer = ReplyPrinter::new();
        let result = self
            .runtime
            .block_on(self.client.send(text, cancel, |reply| printer.update(reply)));
        self.interrupts.disarm();

        let outcome = result?;
        printer.finish(outcome.state);
        tracing::debug!(
            session = %outcome.session,
            reply = %outcome.reply_id,
            state = ?outcome.state,
            "Send finished"
        );
        Ok(())
    }

    fn current_or(&self, id: Option<&str>) -> Result<SessionId> {
        match id {
            Some(id) => SessionId::from_input(id),
            None => self.client.current().cloned().context("No current session"),
        }
    }

    fn report<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                UI::print_error(&e.to_string());
                None
            }
        }
    }

    pub fn new_session(&mut self) {
        let result = self.runtime.block_on(self.client.new_session());
        if let Some(session) = self.report(result) {
            UI::print_success(&format!("Created session {}", session));
        }
    }

    pub fn list_sessions(&self) {
        UI::print_sessions(self.client.sessions(), self.client.current());
    }

    pub fn switch_session(&mut self, id: &str) {
        let result = SessionId::from_input(id)
            .and_then(|session| self.runtime.block_on(self.client.select(&session)));
        if self.report(result).is_some() {
            UI::print_current_session(self.client.current());
            UI::print_history(self.client.messages());
        }
    }

    pub fn rename_session(&mut self, old: Option<&str>, new: &str) {
        let result = self
            .current_or(old)
            .and_then(|old| self.runtime.block_on(self.client.rename(&old, new)));
        if self.report(result).is_some() {
            UI::print_success(&format!("Renamed to {}", new.trim()));
        }
        UI::print_current_session(self.client.current());
    }

    pub fn delete_session(&mut self, id: Option<&str>) {
        let result = self
            .current_or(id)
            .and_then(|session| {
                self.runtime
                    .block_on(self.client.delete(&session))
                    .map(|_| session)
            });
        if let Some(session) = self.report(result) {
            UI::print_success(&format!("Deleted session {}", session));
        }
        UI::print_current_session(self.client.current());
    }

    pub fn resync(&mut self) {
        let result = self.runtime.block_on(self.client.resync());
        if self.report(result).is_some() {
            self.list_sessions();
        }
    }

    pub fn show_history(&mut self) {
        let result = self.runtime.block_on(self.client.refresh_history());
        match self.report(result) {
            Some(LoadOutcome::Applied(count)) => {
                tracing::debug!(messages = count, "History refreshed");
                UI::print_current_session(self.client.current());
                UI::print_history(self.client.messages());
            }
            Some(LoadOutcome::Discarded) => UI::print_warning("History load was superseded"),
            None => {}
        }
    }
}
