pub mod client;
pub mod models;
pub mod response;

pub use client::{ChatClient, ChatModel};
pub use models::{AssistantTurn, RequestBody};
