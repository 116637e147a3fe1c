use scripted_responder::config::script::Script;
use scripted_responder::models::chat::{ ConversationTurn, Speaker, TurnKind };
use scripted_responder::responder::{ drive, Command, Session, TypingDelays };
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{ Duration, Instant };

const PRICING: &str = "Сколько стоит сессия?";

struct Harness {
    commands: mpsc::Sender<Command>,
    turns: mpsc::UnboundedReceiver<ConversationTurn>,
    driver: tokio::task::JoinHandle<Session>,
}

impl Harness {
    fn start() -> Self {
        let script = Arc::new(Script::builtin().unwrap());
        let session = Session::new(script, TypingDelays::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(session, cmd_rx, turn_tx));
        Self { commands: cmd_tx, turns: turn_rx, driver }
    }

    async fn next(&mut self) -> (ConversationTurn, Instant) {
        let turn = self.turns.recv().await.unwrap();
        (turn, Instant::now())
    }
}

#[tokio::test(start_paused = true)]
async fn prompt_reply_and_follow_up_respect_their_delays() {
    let mut h = Harness::start();
    let (greeting, _) = h.next().await;
    assert_eq!(greeting.kind, TurnKind::ChoiceList);

    let start = Instant::now();
    h.commands.send(Command::SelectPrompt(PRICING.into())).await.unwrap();

    let (user, at_user) = h.next().await;
    assert_eq!(user.speaker, Speaker::User);
    assert_eq!(user.text, PRICING);
    assert!(at_user - start < Duration::from_millis(500));

    let (reply, at_reply) = h.next().await;
    assert_eq!(reply.kind, TurnKind::Plain);
    assert!(at_reply - start >= Duration::from_millis(500));

    let (follow_up, at_follow_up) = h.next().await;
    assert_eq!(follow_up.kind, TurnKind::ChoiceList);
    assert_eq!(follow_up.text, "Что ещё вас интересует?");
    assert!(at_follow_up - at_reply >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn free_text_waits_before_classifying() {
    let mut h = Harness::start();
    h.next().await;

    let start = Instant::now();
    h.commands.send(Command::SendText("расскажи про йогу".into())).await.unwrap();
    h.next().await;

    let (reply, at_reply) = h.next().await;
    assert!(at_reply - start >= Duration::from_millis(800));
    assert_eq!(reply.kind, TurnKind::ChoiceList);
    assert_eq!(reply.choices.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn earlier_due_reply_lands_first() {
    let mut h = Harness::start();
    h.next().await;

    h.commands.send(Command::SendText("группа".into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.commands.send(Command::SelectPrompt("непонятный вопрос".into())).await.unwrap();

    let mut texts = Vec::new();
    for _ in 0..4 {
        let (turn, _) = h.next().await;
        texts.push((turn.speaker, turn.kind));
    }
    // prompt reply is due at 600ms, the group reply at 800ms
    assert_eq!(
        texts,
        vec![
            (Speaker::User, TurnKind::Plain),
            (Speaker::User, TurnKind::Plain),
            (Speaker::Bot, TurnKind::Recommendation),
            (Speaker::Bot, TurnKind::ChoiceList),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn closing_the_widget_does_not_cancel_pending_replies() {
    let mut h = Harness::start();
    h.next().await;

    h.commands.send(Command::Open).await.unwrap();
    h.commands.send(Command::SelectPrompt(PRICING.into())).await.unwrap();
    h.commands.send(Command::Close).await.unwrap();
    drop(h.commands);

    let session = h.driver.await.unwrap();
    assert!(!session.is_open());
    assert_eq!(session.pending(), 0);
    assert_eq!(session.turns().len(), 4);

    let ids: Vec<u64> = session
        .turns()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}
