//! The shared data model (spec §3): `WorkItem`, `AgentSession`,
//! `TraceEvent`, `ConversationRecord`, `DeliveryJob`, `IntentClass`.
//!
//! Ownership is exclusive per component: C2 creates `WorkItem`s, C3 owns
//! `AgentSession` for its lifetime, C6 owns `ConversationRecord` mutation,
//! C5 owns `DeliveryJob` mutation. Nothing in this module enforces that at
//! the type level beyond making the mutating methods live on the owning
//! component's types — see each component's module for the actual
//! mutation sites.

mod conversation_record;
mod delivery_job;
mod intent;
mod trace_event;
mod work_item;

pub use conversation_record::{
    AgentStep, CollaborationEdge, ConversationRecord, DataOperation, FunctionAudit,
    QualitySignals, ToolExecution,
};
pub use delivery_job::{DeliveryJob, DeliveryJobError, DeliveryStatus};
pub use intent::IntentClass;
pub use trace_event::{LifecycleKind, TraceEvent, TraceEventKind, TracePayload};
pub use work_item::{WorkItem, WorkItemKind, WorkItemOrigin};
