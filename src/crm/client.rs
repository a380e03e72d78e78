use crate::crm::types::{NewNote, NewOpportunity, NewPerson, PersonUpdate};
use crate::error::{Mail2CrmError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;

/// CRM operations the agent may perform.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Returns `{"people": [...]}`, empty when nobody matches.
    async fn get_person_by_email(&self, email: &str) -> Result<Value>;
    async fn create_person(&self, person: &NewPerson) -> Result<Value>;
    async fn update_person(&self, person_id: &str, update: &PersonUpdate) -> Result<Value>;
    async fn get_opportunities_by_person_id(&self, person_id: &str) -> Result<Vec<Value>>;
    async fn create_opportunity(&self, opportunity: &NewOpportunity) -> Result<Value>;
    /// Creates the note, then links it to every target the note names.
    async fn create_note(&self, note: &NewNote) -> Result<Value>;
}

/// Twenty CRM REST client.
pub struct TwentyClient {
    client: reqwest::Client,
    base_url: String,
}

impl TwentyClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Mail2CrmError::Config(
                "CRM base URL must be provided".to_string(),
            ));
        }
        if api_key.trim().is_empty() {
            return Err(Mail2CrmError::Config(
                "CRM API key must be provided".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
                Mail2CrmError::Config(format!("Invalid CRM authorization header: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(%method, %url, ?query, "CRM request");

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), %url, body = %text, "CRM API call failed");
            return Err(Mail2CrmError::Crm {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn created(data: Value, key: &str) -> Result<Value> {
        match data.get("data").and_then(|d| d.get(key)) {
            Some(record) if !record.is_null() => Ok(record.clone()),
            _ => Err(Mail2CrmError::Crm {
                status: 200,
                message: format!("response is missing data.{}: {}", key, data),
            }),
        }
    }
}

#[async_trait]
impl CrmApi for TwentyClient {
    async fn get_person_by_email(&self, email: &str) -> Result<Value> {
        let filter = format!("emails.primaryEmail[eq]:{}", email);
        tracing::info!(email, "searching for person by primary email");

        let data = self
            .request(Method::GET, "people", &[("filter", filter.as_str())], None)
            .await?;

        let people = data
            .get("data")
            .and_then(|d| d.get("people"))
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();

        tracing::info!(email, found = people.len(), "person lookup finished");
        Ok(json!({ "people": people }))
    }

    async fn create_person(&self, person: &NewPerson) -> Result<Value> {
        tracing::info!(email = %person.email, "creating person");
        let data = self
            .request(Method::POST, "people", &[], Some(&person.to_payload()))
            .await?;
        Self::created(data, "createPerson")
    }

    async fn update_person(&self, person_id: &str, update: &PersonUpdate) -> Result<Value> {
        let payload = update.to_payload().ok_or_else(|| {
            Mail2CrmError::Tool(format!("No update data provided for person ID {}", person_id))
        })?;
        tracing::info!(person_id, "updating person");
        let data = self
            .request(
                Method::PUT,
                &format!("people/{}", person_id),
                &[],
                Some(&payload),
            )
            .await?;
        Self::created(data, "updatePerson")
    }

    async fn get_opportunities_by_person_id(&self, person_id: &str) -> Result<Vec<Value>> {
        let filter = format!("pointOfContactId[eq]:{}", person_id);
        let data = self
            .request(
                Method::GET,
                "opportunities",
                &[("filter", filter.as_str())],
                None,
            )
            .await?;

        let opportunities = match data.get("data") {
            Some(Value::Array(items)) => items.clone(),
            Some(inner) => inner
                .get("opportunities")
                .and_then(|o| o.as_array())
                .cloned()
                .unwrap_or_default(),
            None => Vec::new(),
        };

        tracing::info!(person_id, found = opportunities.len(), "opportunity lookup finished");
        Ok(opportunities)
    }

    async fn create_opportunity(&self, opportunity: &NewOpportunity) -> Result<Value> {
        tracing::info!(
            name = %opportunity.name,
            person_id = %opportunity.person_id,
            "creating opportunity"
        );
        let data = self
            .request(
                Method::POST,
                "opportunities",
                &[],
                Some(&opportunity.to_payload()),
            )
            .await?;
        Self::created(data, "createOpportunity")
    }

    async fn create_note(&self, note: &NewNote) -> Result<Value> {
        tracing::info!(title = %note.title, "creating note");
        let data = self
            .request(Method::POST, "notes", &[], Some(&note.to_payload()))
            .await?;
        let created = Self::created(data, "createNote")?;

        let note_id = created
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| Mail2CrmError::Crm {
                status: 200,
                message: format!("created note has no id: {}", created),
            })?
            .to_string();

        for (field, target_id) in note.targets() {
            let mut link = json!({ "noteId": note_id });
            link[field] = json!(target_id);
            self.request(Method::POST, "noteTargets", &[], Some(&link))
                .await?;
            tracing::info!(note_id = %note_id, field, target_id, "note linked");
        }

        Ok(created)
    }
}
