// Game automation module
// Runs a configured stage (enter → battle loop → settlement → restart →
// resource check) against one device until a limit or a stop request.

pub mod cancel;
pub mod channels;
pub mod clock;
pub mod engine;
pub mod poll;
pub mod purchase;
pub mod types;


// Re-export the main types and functions for easy access
pub use cancel::CancelToken;
pub use channels::{StatusSender, create_status_channel};
pub use clock::{Clock, TokioClock};
pub use engine::{EngineConfig, StepEngine};
pub use poll::{PollOutcome, poll_bounded, poll_until};
pub use types::{PurchaseOutcome, RunState, RunSummary, StatusEvent, TerminationReason};
