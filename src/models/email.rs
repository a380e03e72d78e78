use serde::{Deserialize, Serialize};

/// One inbound message as the agent sees it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Email {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub sender: String,
}

impl Email {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            body: body.into(),
            sender: sender.into(),
        }
    }

    /// The user turn handed to the model.
    pub fn to_prompt(&self) -> String {
        format!("Email from {}: {}\n{}", self.sender, self.subject, self.body)
    }
}
