pub mod format;
pub mod interpreter;
pub mod router;
pub mod runtime;
pub mod schema;

pub use interpreter::{ChatMessage, Interpreter, Role};
pub use router::{IntentRouter, SpokenReply};
pub use runtime::AssistantRuntime;
pub use schema::SchemaGuide;
