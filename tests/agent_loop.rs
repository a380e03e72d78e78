mod support;

use mail2crm::api::AssistantTurn;
use mail2crm::error::Mail2CrmError;
use mail2crm::models::Message;
use mail2crm::retry::RetryPolicy;
use mail2crm::tools::ToolRegistry;
use mail2crm::{run_inbox, EmailAgent, Outcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use support::{
    call, rate_limited, sample_email, FakeCrm, FakeMail, LoopingModel, RecordingSleeper,
    ScriptedModel,
};

fn registry(crm: Arc<FakeCrm>, mail: Arc<FakeMail>) -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::with_backends(crm, mail).unwrap())
}

fn agent(model: Arc<ScriptedModel>, crm: Arc<FakeCrm>, sleeper: Arc<RecordingSleeper>) -> EmailAgent {
    EmailAgent::new(model, registry(crm, Arc::new(FakeMail::default())))
        .with_sleeper(sleeper)
        .with_system_prompt("You update the CRM.")
}

fn tool_content(message: &Message) -> Value {
    match message {
        Message::Tool { content, .. } => serde_json::from_str(content).unwrap(),
        other => panic!("expected tool message, got {:?}", other.role()),
    }
}

#[tokio::test]
async fn test_plain_answer_completes_in_one_call() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(AssistantTurn::text(
        "No immediate action required.",
    ))]));
    let crm = Arc::new(FakeCrm::default());
    let agent = agent(model.clone(), crm.clone(), Arc::new(RecordingSleeper::default()));

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert_eq!(
        report.outcome,
        Outcome::Completed {
            text: "No immediate action required.".to_string()
        }
    );
    assert_eq!(report.llm_calls, 1);
    assert_eq!(report.tool_invocations, 0);
    assert_eq!(report.conversation.len(), 3);
    assert!(crm.calls().is_empty());

    let first_request = &model.requests.lock().unwrap()[0];
    assert_eq!(first_request.len(), 2);
    assert_eq!(
        first_request[1],
        Message::User {
            content: "Email from jane.doe@example.com: Question about my lease\nHello, I would like advice on terminating my lease early."
                .to_string()
        }
    );
    // all eight operations are offered on every turn
    assert_eq!(model.tool_counts.lock().unwrap()[0], 8);
}

#[tokio::test]
async fn test_two_tool_rounds_then_answer() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(AssistantTurn::tools(vec![call(
            "c1",
            "get_person_by_email",
            json!({ "email": "jane.doe@example.com" }),
        )])),
        Ok(AssistantTurn::tools(vec![call(
            "c2",
            "create_note",
            json!({ "title": "Lease question", "body": "Wants early termination", "person_id": "p-1" }),
        )])),
        Ok(AssistantTurn::text("Note created.")),
    ]));
    let crm = Arc::new(FakeCrm::with_person("p-1", "jane.doe@example.com"));
    let agent = agent(model.clone(), crm.clone(), Arc::new(RecordingSleeper::default()));

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert!(report.outcome.is_completed());
    assert_eq!(report.llm_calls, 3);
    assert_eq!(report.tool_invocations, 2);
    assert_eq!(report.conversation.len(), 7);
    assert_eq!(report.conversation.tool_message_count(), 2);
    assert_eq!(crm.calls(), vec!["get_person_by_email", "create_note"]);

    let messages = report.conversation.messages();
    let roles: Vec<&str> = messages.iter().map(Message::role).collect();
    assert_eq!(
        roles,
        vec!["system", "user", "assistant", "tool", "assistant", "tool", "assistant"]
    );
    match &messages[3] {
        Message::Tool { tool_call_id, name, .. } => {
            assert_eq!(tool_call_id, "c1");
            assert_eq!(name, "get_person_by_email");
        }
        other => panic!("unexpected {:?}", other.role()),
    }
    assert_eq!(tool_content(&messages[3])["people"][0]["id"], "p-1");

    // each request carries the whole history so far
    let lengths: Vec<usize> = model.requests.lock().unwrap().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![2, 4, 6]);
}

#[tokio::test]
async fn test_unknown_sender_is_created() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(AssistantTurn::tools(vec![call(
            "c1",
            "get_person_by_email",
            json!({ "email": "jane.doe@example.com" }),
        )])),
        Ok(AssistantTurn::tools(vec![call(
            "c2",
            "create_person",
            json!({ "first_name": "Jane", "last_name": "Doe", "email": "jane.doe@example.com" }),
        )])),
        Ok(AssistantTurn::text("Created a contact for Jane Doe.")),
    ]));
    let crm = Arc::new(FakeCrm::default());
    let agent = agent(model, crm.clone(), Arc::new(RecordingSleeper::default()));

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert_eq!(
        report.outcome,
        Outcome::Completed {
            text: "Created a contact for Jane Doe.".to_string()
        }
    );
    assert_eq!(report.llm_calls, 3);
    assert_eq!(report.conversation.len(), 7);
    assert_eq!(crm.calls(), vec!["get_person_by_email", "create_person"]);

    let messages = report.conversation.messages();
    assert_eq!(tool_content(&messages[3]), json!({ "people": [] }));
    let created = tool_content(&messages[5]);
    assert_eq!(created["emails"]["primaryEmail"], "jane.doe@example.com");
    assert_eq!(created["name"]["firstName"], "Jane");
    assert_eq!(crm.people.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_calls_in_one_turn_answered_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(AssistantTurn::tools(vec![
            call("a", "get_person_by_email", json!({ "email": "jane.doe@example.com" })),
            call("b", "get_opportunities_by_person_id", json!({ "person_id": "p-1" })),
        ])),
        Ok(AssistantTurn::text("")),
    ]));
    let crm = Arc::new(FakeCrm::with_person("p-1", "jane.doe@example.com"));
    let agent = agent(model, crm.clone(), Arc::new(RecordingSleeper::default()));

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert_eq!(report.outcome, Outcome::Completed { text: String::new() });
    let ids: Vec<&str> = report
        .conversation
        .messages()
        .iter()
        .filter_map(|m| match m {
            Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(
        tool_content(&report.conversation.messages()[4]),
        json!({ "opportunities": [] })
    );
    assert_eq!(crm.calls(), vec!["get_person_by_email", "get_opportunities_by_person_id"]);
}

#[tokio::test]
async fn test_malformed_arguments_are_reported_not_executed() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(AssistantTurn::tools(vec![mail2crm::models::ToolCall::new(
            "bad",
            "create_person",
            "{\"email\": ",
        )])),
        Ok(AssistantTurn::text("Could not create the person.")),
    ]));
    let crm = Arc::new(FakeCrm::default());
    let agent = agent(model, crm.clone(), Arc::new(RecordingSleeper::default()));

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert!(report.outcome.is_completed());
    assert_eq!(report.tool_invocations, 0);
    assert!(crm.calls().is_empty());
    let payload = tool_content(&report.conversation.messages()[3]);
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid JSON arguments"));
}

#[tokio::test]
async fn test_tool_failures_become_error_payloads() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(AssistantTurn::tools(vec![
            call("x", "delete_everything", json!({})),
            call("y", "create_note", json!({ "title": "t", "body": "b" })),
            call("z", "create_note", json!({ "body": "missing title" })),
        ])),
        Ok(AssistantTurn::text("Finished with errors.")),
    ]));
    let crm = Arc::new(FakeCrm {
        fail_notes: true,
        ..FakeCrm::default()
    });
    let agent = agent(model, crm.clone(), Arc::new(RecordingSleeper::default()));

    let report = agent.process_email(&sample_email()).await.unwrap();
    let messages = report.conversation.messages();

    assert!(report.outcome.is_completed());
    assert_eq!(
        tool_content(&messages[3]),
        json!({ "error": "Tool 'delete_everything' not found" })
    );
    assert!(tool_content(&messages[4])["error"]
        .as_str()
        .unwrap()
        .contains("bodyV2 is invalid"));
    assert!(tool_content(&messages[5])["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid arguments for 'create_note'"));
    // only the well-formed note reached the CRM
    assert_eq!(crm.calls(), vec!["create_note"]);
}

#[tokio::test]
async fn test_depth_bound_stops_a_looping_model() {
    let mail = Arc::new(FakeMail::default());
    let agent = EmailAgent::new(
        Arc::new(LoopingModel),
        registry(Arc::new(FakeCrm::default()), mail),
    )
    .with_max_depth(3);

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert_eq!(report.outcome, Outcome::MaxIterationsReached);
    assert_eq!(report.llm_calls, 3);
    assert_eq!(report.tool_invocations, 3);
    // 2 seed messages + 3 rounds of (assistant, tool)
    assert_eq!(report.conversation.len(), 8);
    assert!(report.conversation.messages().last().unwrap().is_tool());
}

#[tokio::test]
async fn test_zero_depth_never_calls_the_model() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let agent = agent(model.clone(), Arc::new(FakeCrm::default()), Arc::new(RecordingSleeper::default()))
        .with_max_depth(0);

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert_eq!(report.outcome, Outcome::MaxIterationsReached);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_rate_limits_are_retried_with_growing_delays() {
    let model = Arc::new(ScriptedModel::new(vec![
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(AssistantTurn::text("done")),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let agent = agent(model.clone(), Arc::new(FakeCrm::default()), sleeper.clone());

    let report = agent.process_email(&sample_email()).await.unwrap();

    assert!(report.outcome.is_completed());
    assert_eq!(report.llm_calls, 1);
    assert_eq!(model.calls(), 3);
    let delays = sleeper.delays();
    assert_eq!(delays.len(), 2);
    assert!(delays[0] >= Duration::from_secs(1) && delays[0] <= Duration::from_millis(1500));
    assert!(delays[1] >= Duration::from_secs(2) && delays[1] <= Duration::from_secs(3));
}

#[tokio::test]
async fn test_persistent_rate_limit_surfaces_as_error() {
    let model = Arc::new(ScriptedModel::new((0..3).map(|_| Err(rate_limited())).collect()));
    let sleeper = Arc::new(RecordingSleeper::default());
    let agent = agent(model.clone(), Arc::new(FakeCrm::default()), sleeper.clone())
        .with_retry_policy(RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
        });

    let err = agent.process_email(&sample_email()).await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(model.calls(), 3);
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_hard_api_error_is_not_retried() {
    let model = Arc::new(ScriptedModel::new(vec![Err(Mail2CrmError::Api {
        status: 400,
        message: "bad request".to_string(),
    })]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let agent = agent(model.clone(), Arc::new(FakeCrm::default()), sleeper.clone());

    let err = agent.process_email(&sample_email()).await.unwrap_err();

    assert!(matches!(err, Mail2CrmError::Api { status: 400, .. }));
    assert!(!err.is_rate_limited());
    assert_eq!(model.calls(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_run_inbox_marks_only_completed_emails() {
    let mut second = sample_email();
    second.id = "AAMkAGI2".to_string();
    let mut third = sample_email();
    third.id = "AAMkAGI3".to_string();

    let model = Arc::new(ScriptedModel::new(vec![
        Ok(AssistantTurn::text("first done")),
        Err(Mail2CrmError::Api {
            status: 500,
            message: "upstream".to_string(),
        }),
        Ok(AssistantTurn::text("third done")),
    ]));
    let mail = Arc::new(FakeMail::with_emails(vec![sample_email(), second, third]));
    let agent = EmailAgent::new(
        model,
        registry(Arc::new(FakeCrm::default()), mail.clone()),
    )
    .with_sleeper(Arc::new(RecordingSleeper::default()));

    let summary = run_inbox(mail.as_ref(), &agent).await.unwrap();

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exhausted, 0);
    assert_eq!(mail.marked(), vec!["AAMkAGI1", "AAMkAGI3"]);
}

#[tokio::test]
async fn test_run_inbox_leaves_exhausted_emails_unread() {
    let mail = Arc::new(FakeMail::with_emails(vec![sample_email()]));
    let agent = EmailAgent::new(
        Arc::new(LoopingModel),
        registry(Arc::new(FakeCrm::default()), mail.clone()),
    )
    .with_max_depth(2);

    let summary = run_inbox(mail.as_ref(), &agent).await.unwrap();

    assert_eq!(summary.exhausted, 1);
    assert!(mail.marked().is_empty());
}

#[tokio::test]
async fn test_run_inbox_propagates_listing_failure() {
    let mail = Arc::new(FakeMail {
        fail_listing: true,
        ..FakeMail::default()
    });
    let agent = EmailAgent::new(
        Arc::new(ScriptedModel::new(vec![])),
        registry(Arc::new(FakeCrm::default()), mail.clone()),
    );

    let err = run_inbox(mail.as_ref(), &agent).await.unwrap_err();
    assert!(matches!(err, Mail2CrmError::Mail { status: 401, .. }));
}
