use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;
use thiserror::Error;

use crate::responder::intents::{ IntentTable, Outcome };

const BUILTIN_SCRIPT: &str = include_str!("../../json/script.json");

static SCRIPT: OnceCell<Arc<Script>> = OnceCell::new();

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Script JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Prompt '{0}' is declared more than once")]
    DuplicatePrompt(String),
    #[error("Field '{0}' must not be empty")]
    EmptyField(String),
    #[error("Intent '{intent}' asks for prompt '{prompt}' which is not in the knowledge base")]
    UnknownDelegate {
        intent: String,
        prompt: String,
    },
    #[error("A script has already been installed for this process")]
    AlreadyInstalled,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    pub prompt: String,
    pub reply: String,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

/// Canned prompt -> reply table, looked up by exact string equality.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self, ScriptError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.prompt.trim().is_empty() {
                return Err(ScriptError::EmptyField(format!("entries[{}].prompt", i)));
            }
            if entry.reply.trim().is_empty() {
                return Err(ScriptError::EmptyField(format!("entries[{}].reply", i)));
            }
            if index.insert(entry.prompt.clone(), i).is_some() {
                return Err(ScriptError::DuplicatePrompt(entry.prompt.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn lookup(&self, prompt: &str) -> Option<&KnowledgeEntry> {
        self.index.get(prompt).map(|&i| &self.entries[i])
    }

    /// Top-level prompts in declaration order.
    pub fn prompts(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.prompt.clone())
            .collect()
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Deserialize, Debug)]
struct ScriptFile {
    greeting: String,
    follow_up_header: String,
    fallback: String,
    entries: Vec<KnowledgeEntry>,
    intents: IntentTable,
}

/// Everything the responder says. Immutable once built.
#[derive(Debug, Clone)]
pub struct Script {
    pub greeting: String,
    pub follow_up_header: String,
    pub fallback: String,
    pub knowledge: KnowledgeBase,
    pub intents: IntentTable,
}

impl Script {
    pub fn from_json(content: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile = serde_json::from_str(content)?;
        Self::build(file)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let content = fs::read_to_string(&path)?;
        let script = Self::from_json(&content)?;
        info!(
            "Loaded script from {}: {} knowledge entries, {} intent rules",
            path.as_ref().display(),
            script.knowledge.len(),
            script.intents.rules.len()
        );
        Ok(script)
    }

    pub fn builtin() -> Result<Self, ScriptError> {
        Self::from_json(BUILTIN_SCRIPT)
    }

    fn build(file: ScriptFile) -> Result<Self, ScriptError> {
        for (name, value) in [
            ("greeting", &file.greeting),
            ("follow_up_header", &file.follow_up_header),
            ("fallback", &file.fallback),
        ] {
            if value.trim().is_empty() {
                return Err(ScriptError::EmptyField(name.to_string()));
            }
        }

        let knowledge = KnowledgeBase::new(file.entries)?;
        let mut intents = file.intents;
        intents.normalize();

        for rule in &intents.rules {
            if rule.keywords.is_empty() || rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ScriptError::EmptyField(format!("intents.{}.keywords", rule.name)));
            }
        }

        let outcomes = intents.rules
            .iter()
            .map(|r| (r.name.as_str(), &r.outcome))
            .chain(std::iter::once((intents.default.name.as_str(), &intents.default.outcome)));
        for (name, outcome) in outcomes {
            match outcome {
                Outcome::AskPrompt { prompt } if knowledge.lookup(prompt).is_none() => {
                    return Err(ScriptError::UnknownDelegate {
                        intent: name.to_string(),
                        prompt: prompt.clone(),
                    });
                }
                Outcome::OfferChoices { choices, .. } if
                    choices.is_empty() || choices.iter().any(|c| c.trim().is_empty())
                => {
                    return Err(ScriptError::EmptyField(format!("intents.{}.choices", name)));
                }
                _ => {}
            }
        }

        Ok(Self {
            greeting: file.greeting,
            follow_up_header: file.follow_up_header,
            fallback: file.fallback,
            knowledge,
            intents,
        })
    }
}

/// Makes `script` the process-wide script. Only the first call wins.
pub fn install(script: Script) -> Result<Arc<Script>, ScriptError> {
    let script = Arc::new(script);
    SCRIPT.set(Arc::clone(&script)).map_err(|_| ScriptError::AlreadyInstalled)?;
    Ok(script)
}

/// The installed script, or the built-in one if nothing was installed.
pub fn current() -> Result<Arc<Script>, ScriptError> {
    SCRIPT.get_or_try_init(|| Script::builtin().map(Arc::new)).map(Arc::clone)
}
