#![allow(dead_code)]

use async_trait::async_trait;
use mail2crm::api::{AssistantTurn, ChatModel};
use mail2crm::crm::{CrmApi, NewNote, NewOpportunity, NewPerson, PersonUpdate};
use mail2crm::error::{Mail2CrmError, Result};
use mail2crm::mail::MailApi;
use mail2crm::models::{Email, Message, ToolCall};
use mail2crm::retry::Sleeper;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Replays canned model turns and records what it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Result<AssistantTurn>>>,
    pub requests: Mutex<Vec<Vec<Message>>>,
    pub tool_counts: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<Result<AssistantTurn>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Message], tools: &[Value]) -> Result<AssistantTurn> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.tool_counts.lock().unwrap().push(tools.len());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Mail2CrmError::Other("script exhausted".to_string())))
    }
}

/// A model that asks for the same tool forever.
pub struct LoopingModel;

#[async_trait]
impl ChatModel for LoopingModel {
    async fn complete(&self, _messages: &[Message], _tools: &[Value]) -> Result<AssistantTurn> {
        Ok(AssistantTurn::tools(vec![ToolCall::new(
            "loop",
            "get_unread_emails",
            "{}",
        )]))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// In-memory CRM that logs every operation.
#[derive(Default)]
pub struct FakeCrm {
    pub calls: Mutex<Vec<String>>,
    pub people: Mutex<Vec<Value>>,
    pub notes: Mutex<Vec<NewNote>>,
    pub fail_notes: bool,
}

impl FakeCrm {
    pub fn with_person(id: &str, email: &str) -> Self {
        let crm = Self::default();
        crm.people
            .lock()
            .unwrap()
            .push(json!({ "id": id, "emails": { "primaryEmail": email } }));
        crm
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl CrmApi for FakeCrm {
    async fn get_person_by_email(&self, email: &str) -> Result<Value> {
        self.log("get_person_by_email");
        let people: Vec<Value> = self
            .people
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p["emails"]["primaryEmail"] == email)
            .cloned()
            .collect();
        Ok(json!({ "people": people }))
    }

    async fn create_person(&self, person: &NewPerson) -> Result<Value> {
        self.log("create_person");
        let id = format!("person-{}", self.people.lock().unwrap().len() + 1);
        let record = json!({
            "id": id,
            "emails": { "primaryEmail": person.email },
            "name": { "firstName": person.first_name, "lastName": person.last_name }
        });
        self.people.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update_person(&self, person_id: &str, _update: &PersonUpdate) -> Result<Value> {
        self.log("update_person");
        Ok(json!({ "id": person_id }))
    }

    async fn get_opportunities_by_person_id(&self, _person_id: &str) -> Result<Vec<Value>> {
        self.log("get_opportunities_by_person_id");
        Ok(Vec::new())
    }

    async fn create_opportunity(&self, opportunity: &NewOpportunity) -> Result<Value> {
        self.log("create_opportunity");
        Ok(json!({ "id": "opp-1", "name": opportunity.name }))
    }

    async fn create_note(&self, note: &NewNote) -> Result<Value> {
        self.log("create_note");
        if self.fail_notes {
            return Err(Mail2CrmError::Crm {
                status: 400,
                message: "bodyV2 is invalid".to_string(),
            });
        }
        self.notes.lock().unwrap().push(note.clone());
        Ok(json!({ "id": "note-1", "title": note.title }))
    }
}

#[derive(Default)]
pub struct FakeMail {
    pub inbox: Mutex<Vec<Email>>,
    pub marked: Mutex<Vec<String>>,
    pub fail_listing: bool,
    pub fail_marking: HashSet<String>,
}

impl FakeMail {
    pub fn with_emails(emails: Vec<Email>) -> Self {
        Self {
            inbox: Mutex::new(emails),
            ..Self::default()
        }
    }

    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailApi for FakeMail {
    async fn get_unread_emails(&self) -> Result<Vec<Email>> {
        if self.fail_listing {
            return Err(Mail2CrmError::Mail {
                status: 401,
                message: "InvalidAuthenticationToken".to_string(),
            });
        }
        let marked = self.marked.lock().unwrap().clone();
        Ok(self
            .inbox
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !marked.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn mark_email_as_read(&self, email_id: &str) -> Result<()> {
        if self.fail_marking.contains(email_id) {
            return Err(Mail2CrmError::Mail {
                status: 404,
                message: "ErrorItemNotFound".to_string(),
            });
        }
        self.marked.lock().unwrap().push(email_id.to_string());
        Ok(())
    }
}

pub fn sample_email() -> Email {
    Email::new(
        "AAMkAGI1",
        "Question about my lease",
        "Hello, I would like advice on terminating my lease early.",
        "jane.doe@example.com",
    )
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments.to_string())
}

pub fn rate_limited() -> Mail2CrmError {
    Mail2CrmError::RateLimited {
        message: "Resource has been exhausted".to_string(),
    }
}
