mod auth;
mod client;
mod token_cache;

pub use auth::{GraphAuth, TokenSource, DEFAULT_AUTHORITY, GRAPH_DEFAULT_SCOPE};
pub use client::{GraphClient, Mailbox, MailApi, DEFAULT_GRAPH_BASE_URL};
pub use token_cache::{CachedToken, FileTokenCache, MemoryTokenCache, TokenCache};
