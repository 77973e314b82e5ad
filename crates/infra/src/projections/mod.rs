//! Projections: rebuildable read models fed from committed events.
//!
//! Idempotent per stream: an envelope at or below a stream's cursor is
//! ignored, a gap is an error.

pub mod transfer_summaries;

pub use transfer_summaries::{TransferSummariesProjection, TransferSummaryProjectionError};
