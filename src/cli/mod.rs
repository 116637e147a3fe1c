use clap::Parser;
use std::fmt;
use std::str::FromStr;
use tokio::time::Duration;

use crate::responder::TypingDelays;

/// Which presentation layer hosts the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    Terminal,
    WebSocket,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseInterfaceError {
    message: String,
}

impl fmt::Display for ParseInterfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseInterfaceError {}

impl FromStr for Interface {
    type Err = ParseInterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terminal" | "tty" => Ok(Interface::Terminal),
            "websocket" | "ws" => Ok(Interface::WebSocket),
            _ =>
                Err(ParseInterfaceError {
                    message: format!("Invalid interface: '{}'", s),
                }),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interface::Terminal => write!(f, "terminal"),
            Interface::WebSocket => write!(f, "websocket"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host for the chat widget (terminal, websocket)
    #[arg(long, env = "INTERFACE", default_value = "terminal")]
    pub interface: String,

    /// Host address and port for the websocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Path to a JSON script (greeting, knowledge entries, intents). Uses the built-in script if unset.
    #[arg(long, env = "SCRIPT_PATH")]
    pub script_path: Option<String>,

    /// Pause before answering a selected prompt, in milliseconds.
    #[arg(long, env = "PROMPT_REPLY_DELAY_MS", default_value = "500")]
    pub prompt_reply_delay_ms: u64,

    /// Pause between an answer and its follow-up choices, in milliseconds.
    #[arg(long, env = "FOLLOW_UP_DELAY_MS", default_value = "1000")]
    pub follow_up_delay_ms: u64,

    /// Pause before answering free text, in milliseconds.
    #[arg(long, env = "FREE_TEXT_DELAY_MS", default_value = "800")]
    pub free_text_delay_ms: u64,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn typing_delays(&self) -> TypingDelays {
        TypingDelays {
            prompt_reply: Duration::from_millis(self.prompt_reply_delay_ms),
            follow_up: Duration::from_millis(self.follow_up_delay_ms),
            free_text_reply: Duration::from_millis(self.free_text_delay_ms),
        }
    }
}
