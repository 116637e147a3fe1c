use crate::config::script::Script;
use crate::responder::TypingDelays;
use crate::websocket::handle_connection;
use std::error::Error;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use log::{ info, warn, error };

const CONNECTIONS_PER_SECOND: u32 = 10;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> = RateLimiter::direct(
        Quota::per_second(NonZeroU32::new(CONNECTIONS_PER_SECOND).unwrap_or(NonZeroU32::MIN))
    );
}

/// Serves one chat widget session per websocket connection.
pub struct Server {
    addr: String,
    script: Arc<Script>,
    delays: TypingDelays,
}

impl Server {
    pub fn new(addr: String, script: Arc<Script>, delays: TypingDelays) -> Self {
        Self { addr, script, delays }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("WS server listening on: {}", self.addr);

        loop {
            let (stream, peer) = listener.accept().await?;

            if CONNECTION_LIMITER.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let script = Arc::clone(&self.script);
            let delays = self.delays;

            tokio::spawn(async move {
                match accept_async(stream).await {
                    Ok(ws) => handle_connection(peer, ws, script, delays).await,
                    Err(e) => error!("Handshake failed for {}: {}", peer, e),
                }
            });
        }
    }
}
