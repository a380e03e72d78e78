mod email;
mod message;
mod tool;

pub use email::Email;
pub use message::{Conversation, Message};
pub use tool::{FunctionCall, ToolCall};
