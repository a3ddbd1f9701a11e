//! `yourtime` - multi-activity stopwatch tracking
//!
//! Named stopwatches are stored in `SQLite`. A [`TimerEngine`] mounted for a
//! record counts its time and writes it back every period, while the
//! [`Coordinator`] makes sure only one record accumulates time at once.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analytics;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod logging;
pub mod record;
pub mod storage;
pub mod store;

pub use analytics::{Breakdown, Slice};
pub use config::Config;
pub use coordinator::{Coordinator, Lease};
pub use engine::{EngineConfig, EngineView, Outcome, Presence, RunState, StoreHealth, TimerEngine};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{RecordId, TimerRecord};
pub use storage::Storage;
pub use store::{MemoryStore, RecordStore, SqliteStore};
