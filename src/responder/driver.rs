use async_trait::async_trait;
use log::{ debug, warn };
use std::error::Error;
use tokio::sync::mpsc;
use tokio::time::{ sleep_until, Instant };

use crate::models::chat::ConversationTurn;
use crate::responder::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectPrompt(String),
    SendText(String),
    Open,
    Close,
}

/// Where a running session pushes what the host has to show.
#[async_trait]
pub trait TurnSink: Send {
    async fn deliver(&mut self, turn: &ConversationTurn) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn visibility_changed(&mut self, _open: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[async_trait]
impl TurnSink for mpsc::UnboundedSender<ConversationTurn> {
    async fn deliver(&mut self, turn: &ConversationTurn) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.send(turn.clone()).map_err(|e| e.to_string())?;
        Ok(())
    }
}

struct Outbox<S> {
    sink: S,
    delivered: usize,
    alive: bool,
}

impl<S: TurnSink> Outbox<S> {
    async fn flush(&mut self, session: &Session) {
        let turns = session.turns();
        while self.delivered < turns.len() {
            let turn = &turns[self.delivered];
            self.delivered += 1;
            if !self.alive {
                continue;
            }
            if let Err(e) = self.sink.deliver(turn).await {
                warn!("[{}] host stopped accepting turns: {}", session.id(), e);
                self.alive = false;
            }
        }
    }

    async fn notify_visibility(&mut self, session: &Session) {
        if !self.alive {
            return;
        }
        if let Err(e) = self.sink.visibility_changed(session.is_open()).await {
            warn!("[{}] host stopped accepting visibility updates: {}", session.id(), e);
            self.alive = false;
        }
    }
}

/// Runs `session` until the command channel is closed and every pending
/// reply has been appended, forwarding each new turn to `sink` in order.
///
/// Pending replies are never cancelled: once the inbound side goes away the
/// loop keeps sleeping until the last scheduled turn lands, even if the sink
/// is already gone.
pub async fn drive<S: TurnSink>(
    mut session: Session,
    mut commands: mpsc::Receiver<Command>,
    sink: S
) -> Session {
    let mut outbox = Outbox { sink, delivered: 0, alive: true };
    let mut inbound_open = true;
    outbox.flush(&session).await;

    loop {
        let deadline = session.next_due();
        if !inbound_open && deadline.is_none() {
            break;
        }

        tokio::select! {
            cmd = commands.recv(), if inbound_open => {
                match cmd {
                    Some(Command::SelectPrompt(text)) => session.select_prompt(&text),
                    Some(Command::SendText(text)) => session.send_free_text(&text),
                    Some(Command::Open) => {
                        session.open();
                        outbox.notify_visibility(&session).await;
                    }
                    Some(Command::Close) => {
                        session.close();
                        outbox.notify_visibility(&session).await;
                    }
                    None => {
                        debug!(
                            "[{}] inbound closed with {} replies pending",
                            session.id(),
                            session.pending()
                        );
                        inbound_open = false;
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                session.run_due(Instant::now());
            }
        }

        outbox.flush(&session).await;
    }

    debug!("[{}] session finished with {} turns", session.id(), session.turns().len());
    session
}
