use crate::config::ChatConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ragchat",
    about = "Chat with a RAG assistant service from your terminal",
    long_about = "ragchat keeps conversations as server-side sessions and streams the assistant's reply as it is generated. Sessions can be created, renamed, switched and deleted from the prompt with slash commands.",
    version
)]
pub struct Cli {
    /// Base URL of the chat service (overrides config files)
    #[arg(long, env = "RAGCHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Session to open at startup
    #[arg(short, long)]
    pub session: Option<String>,

    /// Send a single message and exit (if not provided, starts interactive REPL)
    #[arg(short, long)]
    pub prompt: Option<String>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn apply_overrides(&self, config: &mut ChatConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
    }
}
