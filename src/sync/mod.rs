//! Reading-position synchronization: in-memory state, session-start reconciliation and
//! debounced persistence of live updates.

mod coalescer;
mod orchestrator;
mod remote;
mod state;
mod timer;

pub use coalescer::PositionUpdateCoalescer;
pub use orchestrator::{SyncOrchestrator, SyncOutcome, SyncWarning};
pub use remote::RemoteProgressStore;
pub use state::ProgressState;
