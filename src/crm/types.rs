use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NewPerson {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PersonUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NewOpportunity {
    pub name: String,
    pub person_id: String,
    /// Monetary amount in whole currency units (USD).
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NewNote {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub opportunity_id: Option<String>,
}

fn name_object(first_name: Option<&String>, last_name: Option<&String>) -> Option<Value> {
    if first_name.is_none() && last_name.is_none() {
        return None;
    }
    let mut name = Map::new();
    if let Some(first) = first_name {
        name.insert("firstName".to_string(), json!(first));
    }
    if let Some(last) = last_name {
        name.insert("lastName".to_string(), json!(last));
    }
    Some(Value::Object(name))
}

impl NewPerson {
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "emails": {
                "primaryEmail": self.email,
                "additionalEmails": []
            }
        });
        if let Some(name) = name_object(self.first_name.as_ref(), self.last_name.as_ref()) {
            payload["name"] = name;
        }
        if let Some(phone) = &self.phone {
            payload["phones"] = json!({ "primaryPhoneNumber": phone });
        }
        payload
    }
}

impl PersonUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }

    /// Only the provided fields; `None` when there is nothing to send.
    pub fn to_payload(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        let mut payload = Map::new();
        if let Some(name) = name_object(self.first_name.as_ref(), self.last_name.as_ref()) {
            payload.insert("name".to_string(), name);
        }
        if let Some(email) = &self.email {
            payload.insert("emails".to_string(), json!({ "primaryEmail": email }));
        }
        if let Some(phone) = &self.phone {
            payload.insert("phones".to_string(), json!({ "primaryPhoneNumber": phone }));
        }
        Some(Value::Object(payload))
    }
}

impl NewOpportunity {
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "name": self.name,
            "pointOfContactId": self.person_id,
        });
        if let Some(value) = self.value {
            payload["amount"] = json!({
                "amountMicros": (value * 1_000_000.0).round() as i64,
                "currencyCode": "USD"
            });
        }
        if let Some(status) = &self.status {
            payload["stage"] = json!(status);
        }
        payload
    }
}

impl NewNote {
    /// Note body in both markdown and the single-paragraph block document the
    /// CRM editor renders.
    pub fn to_payload(&self) -> Value {
        let blocknote = json!([{
            "id": "1",
            "type": "paragraph",
            "props": {
                "textColor": "default",
                "backgroundColor": "default",
                "textAlignment": "left"
            },
            "content": [{
                "type": "text",
                "text": self.body,
                "styles": {}
            }]
        }]);
        json!({
            "title": self.title,
            "bodyV2": {
                "markdown": self.body,
                "blocknote": blocknote.to_string()
            }
        })
    }

    /// `(field, id)` pairs for every record the note should be linked to.
    pub fn targets(&self) -> Vec<(&'static str, &str)> {
        let mut targets = Vec::new();
        if let Some(id) = self.person_id.as_deref() {
            targets.push(("personId", id));
        }
        if let Some(id) = self.company_id.as_deref() {
            targets.push(("companyId", id));
        }
        if let Some(id) = self.opportunity_id.as_deref() {
            targets.push(("opportunityId", id));
        }
        targets
    }
}
