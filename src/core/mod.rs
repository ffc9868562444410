//! Core application primitives (scheduler, runtime, monitoring surface)

pub mod context;
pub mod cycle;
pub mod http;
pub mod runtime;
pub mod scheduler;

pub use context::PipelineContext;
pub use cycle::{CycleOutcome, PairContext, PairPhase, SkipReason};
pub use http::{create_router, start_server, AppState};
pub use runtime::{RuntimeConfig, SignalRuntime};
pub use scheduler::PairScheduler;
