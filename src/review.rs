use crate::crm::{CrmApi, NewNote, NewPerson};
use crate::error::{Mail2CrmError, Result};
use crate::models::Email;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const REVIEW_QUEUE_FILE: &str = "review_queue.json";
pub const NEW_STATUS: &str = "New";

/// An email waiting for a human to decide what goes into the CRM.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReviewItem {
    pub id: String,
    pub sender: String,
    pub email_subject: String,
    pub email_body: String,
    pub status: String,
    pub note: String,
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub create_task: bool,
}

impl From<&Email> for ReviewItem {
    fn from(email: &Email) -> Self {
        Self {
            id: email.id.clone(),
            sender: email.sender.clone(),
            email_subject: email.subject.clone(),
            email_body: email.body.clone(),
            status: NEW_STATUS.to_string(),
            note: format!(
                "Email received from {}.\nSubject: {}",
                email.sender, email.subject
            ),
            task_description: String::new(),
            create_task: false,
        }
    }
}

pub struct ReviewQueue {
    path: PathBuf,
    items: Vec<ReviewItem>,
}

impl ReviewQueue {
    /// Missing or unreadable files give an empty queue.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "review queue is not valid JSON, starting empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        Self { path, items }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.items)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds emails not already queued. Returns how many were added.
    pub fn enqueue(&mut self, emails: &[Email]) -> usize {
        let mut added = 0;
        for email in emails {
            if self.items.iter().any(|item| item.id == email.id) {
                tracing::debug!(email_id = %email.id, "already queued");
                continue;
            }
            self.items.push(ReviewItem::from(email));
            added += 1;
        }
        added
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&ReviewItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn take(&mut self, id: &str) -> Option<ReviewItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn reject(&mut self, id: &str) -> bool {
        self.take(id).is_some()
    }
}

/// `jane.doe@x.com` -> ("Jane", "Doe"); a single part leaves the last name empty.
pub fn name_from_address(address: &str) -> (String, String) {
    let local = address.split('@').next().unwrap_or_default();
    let parts: Vec<&str> = local
        .split(['.', '_', '-'])
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (capitalize(only), String::new()),
        [first, .., last] => (capitalize(first), capitalize(last)),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn record_id(record: &Value) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}

/// Push an approved item into the CRM: find or create the sender, then
/// attach the reviewed note to them. Returns the created note.
pub async fn approve_item(crm: &dyn CrmApi, item: &ReviewItem) -> Result<Value> {
    let found = crm.get_person_by_email(&item.sender).await?;
    let existing = found
        .get("people")
        .and_then(Value::as_array)
        .and_then(|people| people.first())
        .and_then(record_id);

    let person_id = match existing {
        Some(id) => {
            tracing::info!(person_id = %id, sender = %item.sender, "found existing person");
            id
        }
        None => {
            let (first_name, last_name) = name_from_address(&item.sender);
            let person = NewPerson {
                first_name: Some(first_name),
                last_name: Some(last_name),
                email: item.sender.clone(),
                phone: None,
            };
            let created = crm.create_person(&person).await?;
            let id = record_id(&created).ok_or_else(|| {
                Mail2CrmError::Crm {
                    status: 0,
                    message: "created person has no id".to_string(),
                }
            })?;
            tracing::info!(person_id = %id, sender = %item.sender, "created person");
            id
        }
    };

    let mut body = item.note.clone();
    if item.create_task && !item.task_description.is_empty() {
        body.push_str(&format!("\n\nFollow-up task: {}", item.task_description));
    }

    let note = NewNote {
        title: item.email_subject.clone(),
        body,
        person_id: Some(person_id),
        company_id: None,
        opportunity_id: None,
    };
    crm.create_note(&note).await
}
