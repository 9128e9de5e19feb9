//! End-to-end scenario tests covering the chat/webhook → agent → classify
//! → record/export → delivery path with in-process test doubles for every
//! external collaborator.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use revops_core::agent::runtime::{AgentRuntime, RuntimeError, RuntimeEvent, RuntimeEventStream};
use revops_core::agent::{ProgressThrottle, consume};
use revops_core::classifier;
use revops_core::clock::FixedClock;
use revops_core::delivery::{DeliveryPayload, DeliveryTransport, Outcome, RetryPolicy, TransportError, deliver};
use revops_core::ingress::chat::ChatInnerEvent;
use revops_core::ingress::{ChatAck, ChatClient, ChatClientError, ChatEnvelope, WebhookRequest, build_work_item, on_chat_event};
use revops_core::model::{DeliveryJob, WorkItem, WorkItemOrigin};
use revops_core::object_store::InMemoryObjectStore;
use revops_core::recorder::{build_record, export_conversation};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
}

#[derive(Default)]
struct FakeChatClient {
    posted: Mutex<Vec<(String, String, String)>>,
    updated: Mutex<Vec<(String, String, String)>>,
    next_id: Mutex<u64>,
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn post_message(&self, channel_id: &str, thread_id: &str, text: &str) -> Result<String, ChatClientError> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let message_id = format!("msg-{next_id}");
        self.posted
            .lock()
            .unwrap()
            .push((channel_id.to_owned(), thread_id.to_owned(), text.to_owned()));
        Ok(message_id)
    }

    async fn update_message(&self, channel_id: &str, message_id: &str, text: &str) -> Result<(), ChatClientError> {
        self.updated
            .lock()
            .unwrap()
            .push((channel_id.to_owned(), message_id.to_owned(), text.to_owned()));
        Ok(())
    }
}

struct ScriptedRuntime {
    events: Mutex<Vec<Result<RuntimeEvent, RuntimeError>>>,
}

impl ScriptedRuntime {
    fn new(events: Vec<Result<RuntimeEvent, RuntimeError>>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn invoke(&self, _session_key: &str, _prompt: &str) -> Result<RuntimeEventStream, RuntimeError> {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

struct ScriptedTransport(Mutex<Vec<Result<u16, TransportError>>>);

impl ScriptedTransport {
    fn new(responses: Vec<Result<u16, TransportError>>) -> Self {
        Self(Mutex::new(responses))
    }
}

#[async_trait]
impl DeliveryTransport for ScriptedTransport {
    async fn post(&self, _target_url: &str, _body: &str) -> Result<u16, TransportError> {
        self.0.lock().unwrap().remove(0)
    }
}

fn mention_envelope(user: &str, thread_ts: Option<&str>, ts: &str, event_id: &str) -> ChatEnvelope {
    ChatEnvelope {
        envelope_type: "event_callback".into(),
        challenge: None,
        event_id: Some(event_id.into()),
        event: Some(ChatInnerEvent {
            event_type: "app_mention".into(),
            user: user.into(),
            channel: "C1".into(),
            text: "<@BOT> Q4 revenue?".into(),
            ts: ts.into(),
            thread_ts: thread_ts.map(str::to_owned),
        }),
    }
}

/// S1 — chat mention, new thread: placeholder posted with `thread_ts`
/// equal to the mention's own `ts`, and the same message is updated with
/// the final response once the agent completes.
#[tokio::test]
async fn s1_chat_mention_new_thread() {
    let envelope = mention_envelope("U1", None, "1700000000.000100", "evt-1");
    let chat_client = FakeChatClient::default();

    let (ack, work_item) = on_chat_event(&envelope, &chat_client, now()).await.unwrap();
    assert_eq!(ack, ChatAck::Enqueued);
    let work_item = work_item.unwrap();

    let WorkItemOrigin::Chat { thread_id, .. } = &work_item.origin else {
        panic!("expected chat origin");
    };
    assert_eq!(thread_id, "1700000000.000100");

    {
        let posted = chat_client.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1, "1700000000.000100");
    }

    let runtime = ScriptedRuntime::new(vec![Ok(RuntimeEvent::Chunk("Q4 revenue is up 12%.".into()))]);
    let clock = FixedClock(now());
    let throttle = ProgressThrottle::default();
    let outcome = consume(&work_item, &runtime, &chat_client, &clock, &throttle).await;

    assert!(outcome.session.success);
    let session_key = &outcome.session.session_key;
    assert_eq!(session_key, "U1:C1:1700000000.000100");

    let updated = chat_client.updated.lock().unwrap();
    let last = updated.last().unwrap();
    assert_eq!(last.0, "C1");
    assert_eq!(last.2, "Q4 revenue is up 12%.");
}

/// S2 — chat mention, existing thread, two users: distinct session keys
/// preserving per-user context inside the same thread.
#[tokio::test]
async fn s2_existing_thread_two_users_distinct_sessions() {
    let chat_client = FakeChatClient::default();

    let envelope_u1 = mention_envelope("U1", Some("T"), "1700000001.000100", "evt-u1");
    let (_, work_item_u1) = on_chat_event(&envelope_u1, &chat_client, now()).await.unwrap();
    let work_item_u1 = work_item_u1.unwrap();

    let envelope_u2 = mention_envelope("U2", Some("T"), "1700000002.000100", "evt-u2");
    let (_, work_item_u2) = on_chat_event(&envelope_u2, &chat_client, now()).await.unwrap();
    let work_item_u2 = work_item_u2.unwrap();

    let clock = FixedClock(now());
    let throttle = ProgressThrottle::default();

    let runtime_u1 = ScriptedRuntime::new(vec![Ok(RuntimeEvent::Chunk("reply to U1".into()))]);
    let outcome_u1 = consume(&work_item_u1, &runtime_u1, &chat_client, &clock, &throttle).await;

    let runtime_u2 = ScriptedRuntime::new(vec![Ok(RuntimeEvent::Chunk("reply to U2".into()))]);
    let outcome_u2 = consume(&work_item_u2, &runtime_u2, &chat_client, &clock, &throttle).await;

    assert_eq!(outcome_u1.session.session_key, "U1:C1:T");
    assert_eq!(outcome_u2.session.session_key, "U2:C1:T");
    assert_ne!(outcome_u1.session.session_key, outcome_u2.session.session_key);
}

/// S3 — webhook classifiable as `deal_analysis`: the ack carries a
/// tracking id, the classifier resolves `deal_analysis`, and the
/// delivery payload header matches.
#[tokio::test]
async fn s3_webhook_classified_as_deal_analysis() {
    let request = WebhookRequest {
        query: "What is the status of the IXIS deal?".into(),
        source_system: "crm".into(),
        source_process: "auto".into(),
        timestamp: "2025-01-01T10:00:00Z".into(),
    };

    let (work_item, ack) = build_work_item(&request, now()).unwrap();
    assert!(!ack.tracking_id.is_nil());

    let chat_client = FakeChatClient::default();
    let runtime = ScriptedRuntime::new(vec![Ok(RuntimeEvent::Chunk(
        "The IXIS deal is in final negotiation, expected to close this quarter.".into(),
    ))]);
    let clock = FixedClock(now());
    let throttle = ProgressThrottle::default();
    let outcome = consume(&work_item, &runtime, &chat_client, &clock, &throttle).await;
    assert!(outcome.session.success);

    let record = build_record(&outcome.session, &work_item.origin, &work_item.query, None);
    let intent_class = classifier::classify(&record.final_response, &record.user_query);
    assert_eq!(intent_class, revops_core::model::IntentClass::DealAnalysis);

    let payload = DeliveryPayload::new(
        intent_class,
        record.final_response.clone(),
        record.agents_involved(),
        record.conversation_id.clone(),
        0,
        now(),
    );
    assert_eq!(payload.header, "deal_analysis");
}

/// S4 — delivery retry: 503 on attempts 1–3, 200 on attempt 4; delays
/// follow ~1s/2s/4s (±jitter) and the job reaches `Delivered` with
/// `attempt == 3` (the attempt counter reflects completed retries, the
/// 4th call succeeds before another `schedule_retry`).
#[tokio::test]
async fn s4_delivery_retry_then_success() {
    let transport = ScriptedTransport::new(vec![Ok(503), Ok(503), Ok(503), Ok(200)]);
    let policy = RetryPolicy::default();
    let payload = DeliveryPayload::new(revops_core::model::IntentClass::General, "hi", vec![], "conv-s4", 5, now());
    let mut rng = StdRng::seed_from_u64(42);

    let mut job = DeliveryJob::new("conv-s4", "https://example.test/hook", "{}", 5, now());
    let mut delays = Vec::new();

    for _ in 0..3 {
        let result = deliver(job, &payload, &transport, &policy, now(), &mut rng).await.unwrap();
        assert_eq!(result.outcome, Outcome::Retryable);
        delays.push(result.job.next_ready_at - now());
        job = result.job;
    }

    assert!(delays[0].num_milliseconds() >= 900 && delays[0].num_milliseconds() <= 1100);
    assert!(delays[1].num_milliseconds() >= 1800 && delays[1].num_milliseconds() <= 2200);
    assert!(delays[2].num_milliseconds() >= 3600 && delays[2].num_milliseconds() <= 4400);
    assert_eq!(job.attempt, 3);

    let result = deliver(job, &payload, &transport, &policy, now(), &mut rng).await.unwrap();
    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.job.attempt, 3);
    assert_eq!(
        result.job.terminal_status,
        revops_core::model::DeliveryStatus::Delivered
    );
}

/// S5 — agent parse failure: one step's reasoning text carries no
/// recognized section markers (the corrupt case) while another step's
/// text parses normally; the record still exports successfully.
#[tokio::test]
async fn s5_agent_parse_failure_isolated_to_one_step() {
    let chat_client = FakeChatClient::default();
    let runtime = ScriptedRuntime::new(vec![
        Ok(RuntimeEvent::Trace(revops_core::model::TracePayload::CollaboratorInvoke {
            name: "deal_agent".into(),
            input_summary: None,
        })),
        Ok(RuntimeEvent::Trace(revops_core::model::TracePayload::Rationale {
            text: "not a recognized reasoning format, just garbage text".into(),
        })),
        Ok(RuntimeEvent::Trace(revops_core::model::TracePayload::CollaboratorInvoke {
            name: "data_agent".into(),
            input_summary: None,
        })),
        Ok(RuntimeEvent::Trace(revops_core::model::TracePayload::Rationale {
            text: "[USER]\ncurrent date: 2025-01-01\n[ASSISTANT]\nfinal answer here\n".into(),
        })),
        Ok(RuntimeEvent::Chunk("done".into())),
    ]);
    let clock = FixedClock(now());
    let throttle = ProgressThrottle::default();
    let origin = WorkItemOrigin::Webhook {
        source_system: "crm".into(),
        source_process: "auto".into(),
        target_correlation_id: "conv-s5".into(),
    };
    let work_item = WorkItem::new(
        revops_core::model::WorkItemKind::WebhookQuery,
        origin,
        "status?",
        "ctx",
        now(),
    )
    .unwrap();

    let outcome = consume(&work_item, &runtime, &chat_client, &clock, &throttle).await;
    assert!(outcome.session.success);

    let record = build_record(&outcome.session, &work_item.origin, &work_item.query, None);
    assert_eq!(record.agent_flow.len(), 2);

    let broken_step = &record.agent_flow[0];
    assert!(broken_step.reasoning_breakdown.parsing_error.is_some());
    assert!(broken_step.reasoning_breakdown.original_reasoning_text.is_some());

    let clean_step = &record.agent_flow[1];
    assert!(clean_step.reasoning_breakdown.parsing_error.is_none());

    let store = InMemoryObjectStore::new();
    let exported = export_conversation(&store, &record, now()).await.unwrap();
    assert_eq!(exported.len(), revops_core::recorder::EXPORT_FORMATS.len());
}

/// S6 — prompt dedup: a 5-step session sharing one 8 KB system prompt
/// interns exactly one fingerprint entry.
#[tokio::test]
async fn s6_prompt_dedup_across_steps() {
    let chat_client = FakeChatClient::default();
    let system_prompt = "x".repeat(8 * 1024);

    let mut events = Vec::new();
    for step in 0..5 {
        events.push(Ok(RuntimeEvent::Trace(
            revops_core::model::TracePayload::CollaboratorInvoke {
                name: format!("agent-{step}"),
                input_summary: None,
            },
        )));
        events.push(Ok(RuntimeEvent::Trace(revops_core::model::TracePayload::Rationale {
            text: format!("[USER]\ncurrent date: 2025-01-01\n[ASSISTANT]\nstep {step} done\n"),
        })));
    }
    let runtime = ScriptedRuntime::new(events);
    let clock = FixedClock(now());
    let throttle = ProgressThrottle::default();
    let origin = WorkItemOrigin::Webhook {
        source_system: "crm".into(),
        source_process: "auto".into(),
        target_correlation_id: "conv-s6".into(),
    };
    let work_item = WorkItem::new(
        revops_core::model::WorkItemKind::WebhookQuery,
        origin,
        "status?",
        "ctx",
        now(),
    )
    .unwrap();

    let outcome = consume(&work_item, &runtime, &chat_client, &clock, &throttle).await;
    assert!(outcome.session.success);

    let record = build_record(
        &outcome.session,
        &work_item.origin,
        &work_item.query,
        Some(("fingerprint-1", &system_prompt)),
    );

    assert_eq!(record.system_prompt_fingerprints.len(), 1);
    assert_eq!(record.agent_flow.len(), 5);
    let total_size: usize = record.system_prompt_fingerprints.values().map(String::len).sum();
    assert!(total_size < 5 * 8 * 1024);
}
