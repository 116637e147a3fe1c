use serde::{ Serialize, Deserialize };

use crate::models::chat::ConversationTurn;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "select_prompt")] SelectPrompt {
        text: String,
    },
    #[serde(rename = "send_text")] SendText {
        text: String,
    },
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "close")]
    Close,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "turn")] Turn {
        turn: ConversationTurn,
    },
    #[serde(rename = "visibility")] Visibility {
        open: bool,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
