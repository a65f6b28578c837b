mod api;
mod chat;
mod cli;
mod commands;
mod config;
mod conversation;
mod error;
mod error_ext;
mod history;
mod repl;
mod session;
mod streaming;
#[cfg(test)]
mod testing;
mod ui;

use api::HttpChatService;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use error::Result;
use error_ext::ResultExt;
use repl::Repl;
use std::env;
use ui::UI;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let workspace = env::current_dir().context("Failed to get current directory")?;
    let mut config = config::load_config(&workspace);
    cli.apply_overrides(&mut config);

    let service = match HttpChatService::new(&config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("{} {}", "Error:".bright_red().bold(), e);
            eprintln!();
            eprintln!("Set the server address with --base-url, RAGCHAT_BASE_URL");
            eprintln!("or base_url in ~/.ragchat/config.toml");
            std::process::exit(1);
        }
    };

    let mut repl = Repl::new(service, config.base_url.clone())?;

    let started = repl.start(cli.session.as_deref());

    if let Some(prompt) = cli.prompt {
        // A one-shot message must not land in a session other than the requested one
        started?;
        repl.process_single_prompt(&prompt)?;
    } else {
        if let Err(e) = started {
            UI::print_error(&e.to_string());
            UI::print_info("Use /resync to retry once the server is reachable");
        }
        repl.run()?;
    }

    Ok(())
}
