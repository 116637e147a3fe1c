use crate::{
    config::script::Script,
    models::chat::ConversationTurn,
    models::websocket::{ ClientMessage, ServerMessage },
    responder::{ drive, Command, Session, TurnSink, TypingDelays },
};
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{ mpsc, Mutex };
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const COMMAND_BUFFER: usize = 32;

type WsWriter<S> = Arc<Mutex<SplitSink<WebSocketStream<S>, Message>>>;

async fn send_message<S>(
    tx: &WsWriter<S>,
    msg: &ServerMessage
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.lock().await.send(Message::Text(json)).await?;
    Ok(())
}

struct SocketSink<S> {
    tx: WsWriter<S>,
}

#[async_trait]
impl<S> TurnSink for SocketSink<S> where S: AsyncRead + AsyncWrite + Unpin + Send {
    async fn deliver(&mut self, turn: &ConversationTurn) -> Result<(), Box<dyn Error + Send + Sync>> {
        send_message(&self.tx, &(ServerMessage::Turn { turn: turn.clone() })).await
    }

    async fn visibility_changed(&mut self, open: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        send_message(&self.tx, &(ServerMessage::Visibility { open })).await
    }
}

impl From<ClientMessage> for Command {
    fn from(msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::SelectPrompt { text } => Command::SelectPrompt(text),
            ClientMessage::SendText { text } => Command::SendText(text),
            ClientMessage::Open => Command::Open,
            ClientMessage::Close => Command::Close,
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    script: Arc<Script>,
    delays: TypingDelays
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    info!("New WebSocket connection: {}", peer);

    let (tx, mut rx) = websocket.split();
    let tx: WsWriter<S> = Arc::new(Mutex::new(tx));
    let session = Session::new(script, delays);
    let session_id = session.id();
    info!("Assigned session ID {} to {}", session_id, peer);

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let driver = tokio::spawn(drive(session, cmd_rx, SocketSink { tx: Arc::clone(&tx) }));

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    if send_message(&tx, &error_msg).await.is_err() {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if cmd_tx.send(client_msg.into()).await.is_err() {
                                    error!("Session {} stopped accepting commands", session_id);
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse message from {}: {}", peer, e);
                                let error_msg = ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                };
                                if let Err(e) = send_message(&tx, &error_msg).await {
                                    error!("Error sending parse error to {}: {}", peer, e);
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.lock().await.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    // replies already scheduled still run; the sink just stops once the socket is gone
    drop(cmd_tx);
    match driver.await {
        Ok(session) =>
            info!(
                "WebSocket connection closed for {} (session {}, {} turns)",
                peer,
                session_id,
                session.turns().len()
            ),
        Err(e) => error!("Session {} for {} panicked: {}", session_id, peer, e),
    }
}
