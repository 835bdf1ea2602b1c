//! Schedule-to-calendar reconciliation.
//!
//! One sync cycle covers one (note, date) pair: parse the note, index the
//! remote day, then create/patch/delete until the calendar matches the
//! schedule section, updating the persisted key map as it goes.

pub mod engine;
pub mod types;


pub use engine::SyncEngine;
pub use types::{SyncOutcome, SyncPhase};
