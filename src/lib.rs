pub mod cli;
pub mod config;
pub mod models;
pub mod responder;
pub mod scheduler;
pub mod server;
pub mod terminal;
pub mod websocket;

use cli::{ Args, Interface };
use config::script::{ self, Script };
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let interface: Interface = args.interface.parse()?;
    let delays = args.typing_delays();

    let script = match &args.script_path {
        Some(path) => script::install(Script::load(path)?)?,
        None => script::current()?,
    };

    info!("--- Responder Configuration ---");
    info!("Interface: {}", interface);
    if interface == Interface::WebSocket {
        info!("Server Address: {}", args.server_addr);
    }
    info!("Script: {}", args.script_path.as_deref().unwrap_or("built-in"));
    info!("Knowledge Entries: {}", script.knowledge.len());
    info!("Intent Rules: {}", script.intents.rules.len());
    info!("Prompt Reply Delay: {:?}", delays.prompt_reply);
    info!("Follow-up Delay: {:?}", delays.follow_up);
    info!("Free Text Delay: {:?}", delays.free_text_reply);
    info!("-------------------------------");

    match interface {
        Interface::Terminal => terminal::run_terminal(script, delays).await,
        Interface::WebSocket => {
            let server = Server::new(args.server_addr.clone(), script, delays);
            server.run().await
        }
    }
}
