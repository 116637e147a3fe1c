use serde::Deserialize;

/// What a matched intent produces.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    /// A RECOMMENDATION turn.
    Recommend {
        text: String,
    },
    /// Re-enter the prompt path as if the user had picked `prompt`.
    AskPrompt {
        prompt: String,
    },
    /// A CHOICE_LIST turn.
    OfferChoices {
        text: String,
        choices: Vec<String>,
    },
}

#[derive(Deserialize, Debug, Clone)]
pub struct IntentRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub outcome: Outcome,
}

impl IntentRule {
    /// `lowered` must already be lowercased.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

fn default_intent_name() -> String {
    "default".to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct DefaultIntent {
    #[serde(default = "default_intent_name")]
    pub name: String,
    pub outcome: Outcome,
}

/// Ordered keyword rules with a mandatory fallback. The first rule whose
/// keyword occurs in the text wins; if none does, `default` applies, so
/// classification is total.
#[derive(Deserialize, Debug, Clone)]
pub struct IntentTable {
    pub rules: Vec<IntentRule>,
    pub default: DefaultIntent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification<'a> {
    pub intent: &'a str,
    /// Position in the rule list, `None` for the default.
    pub priority: Option<usize>,
    pub outcome: &'a Outcome,
}

impl IntentTable {
    /// Lowercases keywords so matching can compare against lowercased input.
    pub fn normalize(&mut self) {
        for rule in &mut self.rules {
            for keyword in &mut rule.keywords {
                *keyword = keyword.to_lowercase();
            }
        }
    }

    pub fn classify(&self, text: &str) -> Classification<'_> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(&lowered))
            .map(|(i, rule)| Classification {
                intent: rule.name.as_str(),
                priority: Some(i),
                outcome: &rule.outcome,
            })
            .unwrap_or(Classification {
                intent: self.default.name.as_str(),
                priority: None,
                outcome: &self.default.outcome,
            })
    }
}
