pub mod cli;
pub mod command;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod intent_recognition;
pub mod prompts;
pub mod server;
pub mod skills;

// Re-export commonly used items
pub use dispatcher::{Dispatcher, IncomingRequest, Reply};
pub use error::{AgentError, AgentResult};
