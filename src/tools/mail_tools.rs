use crate::error::Result;
use crate::mail::MailApi;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::crm_tools::parse_args;
use super::registry::Tool;

#[derive(Deserialize)]
struct EmailIdArgs {
    email_id: String,
}

pub fn mail_tools(mail: Arc<dyn MailApi>) -> Result<Vec<Tool>> {
    let mut tools = Vec::new();

    let api = mail.clone();
    tools.push(Tool::new(
        "get_unread_emails",
        "Fetches unread emails from the inbox.",
        json!({ "type": "object", "properties": {} }),
        move |_args| {
            let api = api.clone();
            async move {
                let emails = api.get_unread_emails().await?;
                Ok(json!({ "emails": emails }))
            }
        },
    )?);

    let api = mail;
    tools.push(Tool::new(
        "mark_email_as_read",
        "Marks an email as read by its ID.",
        json!({
            "type": "object",
            "properties": {
                "email_id": {
                    "type": "string",
                    "description": "The ID of the email to mark as read."
                }
            },
            "required": ["email_id"]
        }),
        move |args| {
            let api = api.clone();
            async move {
                let args: EmailIdArgs = parse_args(args)?;
                api.mark_email_as_read(&args.email_id).await?;
                Ok(json!({ "success": true, "email_id": args.email_id }))
            }
        },
    )?);

    Ok(tools)
}
