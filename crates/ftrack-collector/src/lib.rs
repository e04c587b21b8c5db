//! Forecaster channel collection engine: due-channel scheduling, the
//! per-channel job state machine, dedup, keyword filtering, and hand-off to
//! prediction extraction.

pub mod clock;
pub mod collector;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod extract;
pub mod job;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, SystemClock};
pub use collector::{
    BatchReport, BatchStatus, ChannelOutcome, ChannelReport, Collector, CollectorSettings,
};
pub use error::{CollectError, SetupError};
pub use executor::{Executor, JobSummary};
pub use extract::{Direction, ExtractError, HttpExtractor, Prediction, PredictionExtractor};
pub use scheduler::{find_due_channels, select_due};
pub use store::{CollectionStore, PgStore, StoreError};
