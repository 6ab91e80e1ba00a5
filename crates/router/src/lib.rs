//! Per-turn orchestration
//!
//! `MemoryRouter::handle_chat_turn` is the single entry point of the
//! memory system. One turn flows:
//!
//! ```text
//! classify -> (fact query || context query) -> enforce -> store turn ->
//! observe patterns -> respond
//! ```
//!
//! Every layer is timed and error-guarded: a failing non-critical layer
//! falls back (empty retrieval, unknown domain, structural-only check)
//! and the failure lands in the routing log instead of aborting the
//! turn. All observable behavior is the returned response value; the
//! router never writes to standard output.

pub mod background;
pub mod response;
pub mod router;
pub mod routing_log;

pub use background::BackgroundTasks;
pub use response::{ChatTurnRequest, ChatTurnResponse, MemoryCounts, StoredInfo, TurnMetadata};
pub use router::{MemoryRouter, MemoryRouterBuilder};
pub use routing_log::{LayerError, LayerStep, RoutingLog};
