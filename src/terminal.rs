use async_trait::async_trait;
use log::{ debug, info };
use std::error::Error;
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout };
use tokio::sync::{ mpsc, Mutex };

use crate::config::script::Script;
use crate::models::chat::{ ConversationTurn, Speaker, TurnKind };
use crate::responder::{ drive, Command, Session, TurnSink, TypingDelays };

const RECOMMENDATION_BADGE: &str = "[Рекомендация]";

#[derive(Debug, PartialEq, Eq)]
pub enum LineAction {
    Send(Command),
    Quit,
    Ignore,
}

/// Maps one line of input to a widget action. A bare number picks that
/// entry (1-based) of `choices`.
pub fn parse_line(line: &str, choices: &[String]) -> LineAction {
    let line = line.trim();
    match line {
        "" => LineAction::Ignore,
        "/quit" | "/exit" => LineAction::Quit,
        "/open" => LineAction::Send(Command::Open),
        "/close" => LineAction::Send(Command::Close),
        _ => {
            if let Ok(n) = line.parse::<usize>() {
                if let Some(choice) = n.checked_sub(1).and_then(|i| choices.get(i)) {
                    return LineAction::Send(Command::SelectPrompt(choice.clone()));
                }
            }
            LineAction::Send(Command::SendText(line.to_string()))
        }
    }
}

pub fn render_turn(turn: &ConversationTurn) -> String {
    let who = match turn.speaker {
        Speaker::User => "Вы",
        Speaker::Bot => "Помощник",
    };
    let mut out = format!("{}: {}", who, turn.text);
    match turn.kind {
        TurnKind::Plain => {}
        TurnKind::Recommendation => {
            out.push(' ');
            out.push_str(RECOMMENDATION_BADGE);
        }
        TurnKind::ChoiceList => {
            for (i, choice) in turn.choices.iter().enumerate() {
                out.push_str(&format!("\n  {}. {}", i + 1, choice));
            }
        }
    }
    out
}

/// Prints turns while the widget is open and holds them back while collapsed.
struct TerminalSink {
    out: Stdout,
    open: bool,
    backlog: Vec<ConversationTurn>,
    choices: Arc<Mutex<Vec<String>>>,
}

impl TerminalSink {
    async fn print(&mut self, turn: &ConversationTurn) -> Result<(), Box<dyn Error + Send + Sync>> {
        let line = format!("{}\n", render_turn(turn));
        self.out.write_all(line.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl TurnSink for TerminalSink {
    async fn deliver(&mut self, turn: &ConversationTurn) -> Result<(), Box<dyn Error + Send + Sync>> {
        if turn.is_choice_list() {
            *self.choices.lock().await = turn.choices.clone();
        }
        if self.open {
            self.print(turn).await
        } else {
            self.backlog.push(turn.clone());
            Ok(())
        }
    }

    async fn visibility_changed(&mut self, open: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.open = open;
        if open {
            self.out.write_all("--- чат открыт ---\n".as_bytes()).await?;
            for turn in std::mem::take(&mut self.backlog) {
                self.print(&turn).await?;
            }
        } else {
            self.out.write_all("--- чат свёрнут (/open чтобы открыть) ---\n".as_bytes()).await?;
        }
        self.out.flush().await?;
        Ok(())
    }
}

/// Chats over stdin/stdout until `/quit` or end of input.
pub async fn run_terminal(
    script: Arc<Script>,
    delays: TypingDelays
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let session = Session::new(script, delays);
    info!("Terminal session {} started", session.id());

    let choices = Arc::new(Mutex::new(Vec::new()));
    let sink = TerminalSink {
        out: tokio::io::stdout(),
        open: false,
        backlog: Vec::new(),
        choices: Arc::clone(&choices),
    };
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let driver = tokio::spawn(drive(session, cmd_rx, sink));

    cmd_tx.send(Command::Open).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let action = {
            let current = choices.lock().await;
            parse_line(&line, &current)
        };
        match action {
            LineAction::Send(command) => {
                debug!("Terminal command: {:?}", command);
                cmd_tx.send(command).await?;
            }
            LineAction::Quit => break,
            LineAction::Ignore => {}
        }
    }

    drop(cmd_tx);
    let session = driver.await?;
    info!("Terminal session {} ended after {} turns", session.id(), session.turns().len());
    Ok(())
}
