mod client;
mod types;

pub use client::{CrmApi, TwentyClient};
pub use types::{NewNote, NewOpportunity, NewPerson, PersonUpdate};
