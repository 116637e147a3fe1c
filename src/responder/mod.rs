pub mod driver;
pub mod intents;
pub mod session;

pub use driver::{ drive, Command, TurnSink };
pub use session::{ Session, TypingDelays, Visibility };
