use log::debug;
use std::sync::Arc;
use tokio::time::{ Duration, Instant };
use uuid::Uuid;

use crate::config::script::Script;
use crate::models::chat::{ Conversation, ConversationTurn, Speaker, TurnKind };
use crate::responder::intents::Outcome;
use crate::scheduler::Scheduler;

/// Artificial "typing" pauses before bot turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingDelays {
    pub prompt_reply: Duration,
    pub follow_up: Duration,
    pub free_text_reply: Duration,
}

impl Default for TypingDelays {
    fn default() -> Self {
        Self {
            prompt_reply: Duration::from_millis(500),
            follow_up: Duration::from_millis(1000),
            free_text_reply: Duration::from_millis(800),
        }
    }
}

impl TypingDelays {
    pub fn instant() -> Self {
        Self {
            prompt_reply: Duration::ZERO,
            follow_up: Duration::ZERO,
            free_text_reply: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Collapsed,
    Open,
}

#[derive(Debug)]
enum Deferred {
    Answer {
        prompt: String,
    },
    FollowUp {
        choices: Vec<String>,
    },
    Classify {
        text: String,
    },
}

/// One widget session: the conversation plus the replies still "being typed".
pub struct Session {
    id: Uuid,
    script: Arc<Script>,
    delays: TypingDelays,
    conversation: Conversation,
    pending: Scheduler<Deferred>,
    visibility: Visibility,
}

impl Session {
    pub fn new(script: Arc<Script>, delays: TypingDelays) -> Self {
        let mut conversation = Conversation::new();
        conversation.append(
            Speaker::Bot,
            TurnKind::ChoiceList,
            script.greeting.clone(),
            script.knowledge.prompts()
        );
        Self {
            id: Uuid::new_v4(),
            script,
            delays,
            conversation,
            pending: Scheduler::new(),
            visibility: Visibility::Collapsed,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        self.conversation.turns()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_open(&self) -> bool {
        self.visibility == Visibility::Open
    }

    pub fn open(&mut self) {
        self.visibility = Visibility::Open;
    }

    pub fn close(&mut self) {
        self.visibility = Visibility::Collapsed;
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.next_due()
    }

    pub fn select_prompt(&mut self, prompt: &str) {
        self.select_prompt_at(prompt, Instant::now());
    }

    pub fn send_free_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.conversation.append(Speaker::User, TurnKind::Plain, text, Vec::new());
        self.pending.schedule(Instant::now(), self.delays.free_text_reply, Deferred::Classify {
            text: text.to_string(),
        });
    }

    /// Runs every deferred step that is due at `now`. Returns how many turns
    /// were appended.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let before = self.conversation.len();
        while let Some((_, task)) = self.pending.pop_due(now) {
            self.execute(task, now);
        }
        self.conversation.len() - before
    }

    /// Runs everything still pending without waiting, as if the clock jumped
    /// to each due instant in turn.
    pub fn drain(&mut self) -> usize {
        let before = self.conversation.len();
        while let Some((due, task)) = self.pending.pop_next() {
            self.execute(task, due);
        }
        self.conversation.len() - before
    }

    fn select_prompt_at(&mut self, prompt: &str, now: Instant) {
        self.conversation.append(Speaker::User, TurnKind::Plain, prompt, Vec::new());
        self.pending.schedule(now, self.delays.prompt_reply, Deferred::Answer {
            prompt: prompt.to_string(),
        });
    }

    fn execute(&mut self, task: Deferred, now: Instant) {
        match task {
            Deferred::Answer { prompt } => self.answer(&prompt, now),
            Deferred::FollowUp { choices } => {
                let header = self.script.follow_up_header.clone();
                self.conversation.append(Speaker::Bot, TurnKind::ChoiceList, header, choices);
            }
            Deferred::Classify { text } => self.classify(&text, now),
        }
    }

    fn answer(&mut self, prompt: &str, now: Instant) {
        let script = Arc::clone(&self.script);
        match script.knowledge.lookup(prompt) {
            Some(entry) => {
                debug!("[{}] prompt matched: {}", self.id, prompt);
                self.conversation.append(
                    Speaker::Bot,
                    TurnKind::Plain,
                    entry.reply.clone(),
                    Vec::new()
                );
                if !entry.follow_ups.is_empty() {
                    self.pending.schedule(now, self.delays.follow_up, Deferred::FollowUp {
                        choices: entry.follow_ups.clone(),
                    });
                }
            }
            None => {
                debug!("[{}] no knowledge entry for '{}', recommending a session", self.id, prompt);
                self.conversation.append(
                    Speaker::Bot,
                    TurnKind::Recommendation,
                    script.fallback.clone(),
                    Vec::new()
                );
            }
        }
    }

    fn classify(&mut self, text: &str, now: Instant) {
        let script = Arc::clone(&self.script);
        let classification = script.intents.classify(text);
        debug!("[{}] free text classified as '{}'", self.id, classification.intent);
        match classification.outcome {
            Outcome::Recommend { text } => {
                self.conversation.append(
                    Speaker::Bot,
                    TurnKind::Recommendation,
                    text.clone(),
                    Vec::new()
                );
            }
            Outcome::AskPrompt { prompt } => self.select_prompt_at(prompt, now),
            Outcome::OfferChoices { text, choices } => {
                self.conversation.append(
                    Speaker::Bot,
                    TurnKind::ChoiceList,
                    text.clone(),
                    choices.clone()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICING: &str = "Сколько стоит сессия?";

    fn session() -> Session {
        Session::new(Arc::new(Script::builtin().unwrap()), TypingDelays::instant())
    }

    fn texts(turns: &[ConversationTurn]) -> Vec<&str> {
        turns
            .iter()
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn starts_with_greeting_listing_every_prompt() {
        let session = session();
        let turns = session.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].id, 1);
        assert_eq!(turns[0].speaker, Speaker::Bot);
        assert_eq!(turns[0].kind, TurnKind::ChoiceList);
        assert_eq!(turns[0].choices.len(), 4);
        assert_eq!(turns[0].choices[1], PRICING);
        assert_eq!(session.visibility(), Visibility::Collapsed);
    }

    #[test]
    fn user_turn_is_appended_before_any_delay() {
        let mut session = Session::new(
            Arc::new(Script::builtin().unwrap()),
            TypingDelays::default()
        );
        session.select_prompt(PRICING);
        assert_eq!(session.turns().len(), 2);
        assert_eq!(session.turns()[1].speaker, Speaker::User);
        assert_eq!(session.pending(), 1);
        assert_eq!(session.run_due(Instant::now()), 0);
    }

    #[test]
    fn pricing_prompt_replies_then_offers_follow_ups() {
        let mut session = session();
        session.select_prompt(PRICING);
        assert_eq!(session.drain(), 2);

        let turns = &session.turns()[1..];
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].speaker, Speaker::User);
        assert_eq!(turns[0].text, PRICING);
        assert_eq!(turns[1].kind, TurnKind::Plain);
        assert!(turns[1].text.contains("5000₽"));
        assert_eq!(turns[2].kind, TurnKind::ChoiceList);
        assert_eq!(turns[2].text, "Что ещё вас интересует?");
        assert_eq!(
            turns[2].choices,
            vec!["Записаться на сессию", "Узнать о пакетах", "Групповые занятия"]
        );
    }

    #[test]
    fn every_known_prompt_gets_its_reply() {
        let script = Arc::new(Script::builtin().unwrap());
        for entry in script.knowledge.entries() {
            let mut session = Session::new(Arc::clone(&script), TypingDelays::instant());
            session.select_prompt(&entry.prompt);
            session.drain();
            let turns = &session.turns()[1..];
            let users = turns
                .iter()
                .filter(|t| t.speaker == Speaker::User)
                .count();
            assert_eq!(users, 1);
            assert_eq!(turns[1].text, entry.reply);
            assert_eq!(turns[2].choices, entry.follow_ups);
        }
    }

    #[test]
    fn unknown_prompt_gets_a_recommendation() {
        let mut session = session();
        session.select_prompt("Записаться на сессию");
        assert_eq!(session.drain(), 1);
        let last = session.conversation().last().unwrap();
        assert_eq!(last.kind, TurnKind::Recommendation);
        assert_eq!(last.speaker, Speaker::Bot);
        assert!(last.choices.is_empty());
    }

    #[test]
    fn entry_without_follow_ups_replies_once() {
        let script = Script::from_json(
            r#"{
                "greeting": "hi",
                "follow_up_header": "more?",
                "fallback": "book a session",
                "entries": [{ "prompt": "a", "reply": "x" }],
                "intents": { "rules": [], "default": { "outcome": { "action": "recommend", "text": "call us" } } }
            }"#
        ).unwrap();
        let mut session = Session::new(Arc::new(script), TypingDelays::instant());
        session.select_prompt("a");

        assert_eq!(session.drain(), 1);
        let last = session.conversation().last().unwrap();
        assert_eq!(last.kind, TurnKind::Plain);
        assert_eq!(last.text, "x");
        assert_eq!(session.pending(), 0);
        assert_eq!(session.turns().len(), 3);
    }

    #[test]
    fn empty_free_text_is_a_no_op() {
        let mut session = session();
        session.send_free_text("");
        session.send_free_text("   \t");
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn booking_text_gets_contact_recommendation() {
        let mut session = session();
        session.send_free_text("хочу записаться");
        session.drain();
        let turns = &session.turns()[1..];
        assert_eq!(texts(turns)[0], "хочу записаться");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].kind, TurnKind::Recommendation);
        assert!(turns[1].text.contains("+7 (999) 123-45-67"));
    }

    #[test]
    fn pricing_text_reuses_the_prompt_path() {
        let mut session = session();
        session.send_free_text("Какая стоимость?");
        session.drain();
        let turns = &session.turns()[1..];
        assert_eq!(&texts(turns)[..2], &["Какая стоимость?", PRICING]);
        assert_eq!(turns[1].speaker, Speaker::User);
        assert_eq!(turns[2].kind, TurnKind::Plain);
        assert_eq!(turns[3].kind, TurnKind::ChoiceList);
        assert_eq!(turns.len(), 4);
    }

    #[test]
    fn unmatched_text_gets_consultation_choices() {
        let mut session = session();
        session.send_free_text("расскажи про йогу");
        session.drain();
        let turns = &session.turns()[1..];
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].kind, TurnKind::ChoiceList);
        assert_eq!(
            turns[1].choices,
            vec!["Записаться на сессию", "Узнать больше", "Связаться с терапевтом"]
        );
    }

    #[test]
    fn ids_increase_across_both_operations() {
        let mut session = session();
        session.select_prompt(PRICING);
        session.send_free_text("группа");
        session.select_prompt("непонятно");
        session.send_free_text("цена");
        session.drain();

        let ids: Vec<u64> = session
            .turns()
            .iter()
            .map(|t| t.id)
            .collect();
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(ids[0], 1);
    }

    #[test]
    fn visibility_does_not_touch_the_conversation() {
        let mut session = session();
        session.open();
        assert!(session.is_open());
        session.select_prompt(PRICING);
        session.close();
        session.drain();
        assert_eq!(session.visibility(), Visibility::Collapsed);
        assert_eq!(session.turns().len(), 4);
    }
}
