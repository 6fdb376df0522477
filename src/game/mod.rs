//! Game subsystem.
//!
//! # Data Flow
//! ```text
//! Selection (decoded from the request body)
//!     → engine.rs (opponent move from MoveSource, decide)
//!     → tag the active span with the round
//!     → ResultRecorder::record_result (one counter increment)
//!     → Outcome (encoded by the HTTP adapter)
//! ```
//!
//! # Design Decisions
//! - Moves and outcomes are closed enums; there is no "bad choice" path
//! - The opponent move comes from an injected source, fixed to paper by default
//! - Recording is synchronous into in-memory aggregators; export is elsewhere

pub mod engine;
pub mod types;

pub use engine::{decide, FixedMove, GameService, MoveSource};
pub use types::{Move, Outcome, Selection};
