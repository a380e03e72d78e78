use crate::crm::{CrmApi, NewNote, NewOpportunity, NewPerson, PersonUpdate};
use crate::error::{Mail2CrmError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::registry::Tool;

#[derive(Deserialize)]
struct EmailArgs {
    email: String,
}

#[derive(Deserialize)]
struct PersonIdArgs {
    person_id: String,
}

#[derive(Deserialize)]
struct UpdatePersonArgs {
    person_id: String,
    #[serde(flatten)]
    update: PersonUpdate,
}

pub(super) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| Mail2CrmError::Tool(format!("invalid arguments: {}", e)))
}

/// The CRM half of the operation set offered to the model.
pub fn crm_tools(crm: Arc<dyn CrmApi>) -> Result<Vec<Tool>> {
    let mut tools = Vec::new();

    let api = crm.clone();
    tools.push(Tool::new(
        "get_person_by_email",
        "Retrieves a person's record from the CRM by their email address.",
        json!({
            "type": "object",
            "properties": {
                "email": {
                    "type": "string",
                    "description": "The email address of the person to retrieve."
                }
            },
            "required": ["email"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let args: EmailArgs = parse_args(args)?;
                api.get_person_by_email(&args.email).await
            }
        },
    )?);

    let api = crm.clone();
    tools.push(Tool::new(
        "create_person",
        "Creates a new person record in the CRM.",
        json!({
            "type": "object",
            "properties": {
                "first_name": {
                    "type": "string",
                    "description": "The first name of the person."
                },
                "last_name": {
                    "type": "string",
                    "description": "The last name of the person."
                },
                "email": {
                    "type": "string",
                    "description": "The email address of the person (must be unique)."
                },
                "phone": {
                    "type": "string",
                    "description": "The phone number of the person."
                }
            },
            "required": ["email"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let person: NewPerson = parse_args(args)?;
                api.create_person(&person).await
            }
        },
    )?);

    let api = crm.clone();
    tools.push(Tool::new(
        "update_person",
        "Updates an existing person record in the CRM.",
        json!({
            "type": "object",
            "properties": {
                "person_id": {
                    "type": "string",
                    "description": "The unique identifier of the person to update."
                },
                "first_name": {
                    "type": "string",
                    "description": "The updated first name of the person."
                },
                "last_name": {
                    "type": "string",
                    "description": "The updated last name of the person."
                },
                "email": {
                    "type": "string",
                    "description": "The updated email address of the person (must be unique)."
                },
                "phone": {
                    "type": "string",
                    "description": "The updated phone number of the person."
                }
            },
            "required": ["person_id"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let args: UpdatePersonArgs = parse_args(args)?;
                api.update_person(&args.person_id, &args.update).await
            }
        },
    )?);

    let api = crm.clone();
    tools.push(Tool::new(
        "get_opportunities_by_person_id",
        "Retrieves a list of opportunities associated with a specific person.",
        json!({
            "type": "object",
            "properties": {
                "person_id": {
                    "type": "string",
                    "description": "The ID of the person for whom to retrieve opportunities."
                }
            },
            "required": ["person_id"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let args: PersonIdArgs = parse_args(args)?;
                let opportunities = api.get_opportunities_by_person_id(&args.person_id).await?;
                Ok(json!({ "opportunities": opportunities }))
            }
        },
    )?);

    let api = crm.clone();
    tools.push(Tool::new(
        "create_opportunity",
        "Creates a new opportunity in the CRM, linking it to a person.",
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "A concise name summarizing the opportunity."
                },
                "person_id": {
                    "type": "string",
                    "description": "The unique identifier of the person associated with this opportunity."
                },
                "value": {
                    "type": "number",
                    "description": "The monetary value of the opportunity."
                },
                "status": {
                    "type": "string",
                    "description": "The current stage of the opportunity (e.g. NEW)."
                }
            },
            "required": ["name", "person_id"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let opportunity: NewOpportunity = parse_args(args)?;
                api.create_opportunity(&opportunity).await
            }
        },
    )?);

    let api = crm;
    tools.push(Tool::new(
        "create_note",
        "Creates a new note record in the CRM. A note can be standalone or linked to a person, company or opportunity.",
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "A brief, descriptive title for the note."
                },
                "body": {
                    "type": "string",
                    "description": "The main content of the note."
                },
                "person_id": {
                    "type": "string",
                    "description": "Optional: the ID of the person to link the note to (UUID format)."
                },
                "company_id": {
                    "type": "string",
                    "description": "Optional: the ID of the company to link the note to (UUID format)."
                },
                "opportunity_id": {
                    "type": "string",
                    "description": "Optional: the ID of the opportunity to link the note to (UUID format)."
                }
            },
            "required": ["title", "body"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let note: NewNote = parse_args(args)?;
                api.create_note(&note).await
            }
        },
    )?);

    Ok(tools)
}
