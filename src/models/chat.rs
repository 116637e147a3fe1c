use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

/// How the host should render a turn. Carries no logic of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Plain,
    ChoiceList,
    Recommendation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: u64,
    pub text: String,
    pub speaker: Speaker,
    pub created_at: DateTime<Utc>,
    pub kind: TurnKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl ConversationTurn {
    pub fn is_choice_list(&self) -> bool {
        self.kind == TurnKind::ChoiceList
    }
}

/// Append-only list of turns. Ids are handed out here so they always follow
/// append order.
#[derive(Clone, Debug, Serialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    #[serde(skip)]
    next_id: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self { turns: Vec::new(), next_id: 1 }
    }

    pub fn append(
        &mut self,
        speaker: Speaker,
        kind: TurnKind,
        text: impl Into<String>,
        choices: Vec<String>
    ) -> &ConversationTurn {
        // choices only travel with CHOICE_LIST turns
        let choices = if kind == TurnKind::ChoiceList { choices } else { Vec::new() };
        let turn = ConversationTurn {
            id: self.next_id,
            text: text.into(),
            speaker,
            created_at: Utc::now(),
            kind,
            choices,
        };
        self.next_id += 1;
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}
