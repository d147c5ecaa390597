//! Workflow Engine and Trace Recorder (C9, C10) — the request pipeline that
//! ties every other component together (§4.8, §4.9).

pub mod trace;
pub mod workflow;

pub use trace::{
    ContextChanges, ContextSnapshotView, StagePayload, StageRecord, TraceRecord, TraceRecorder,
    TraceSummary,
};
pub use workflow::{AudioStream, WorkflowEngine, WorkflowOutcome};
