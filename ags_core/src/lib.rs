#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core glucose control logic (collaborator-agnostic).
//!
//! Every external program (acquisition, history query, statistical
//! predictor, archive) is reached through the traits in `ags_traits`.
//!
//! ## Architecture
//!
//! - **History**: fixed-capacity ring buffers of BG and insulin readings
//!   (`ring_buffer`, `history`)
//! - **Ingestion**: record parsing and sample-time dedup (`record`, `ingest`)
//! - **Models**: `PredictionModel` with state-space and statistical variants (`model`)
//! - **Control**: insulin-action curve and brute-force bolus search (`controller`)
//! - **Loop**: scheduled cycles with typed outcomes (`runner`, `status`)
//!
//! ## Time base
//!
//! Trajectories and insulin sequences are indexed in 5 minute steps; index 0
//! of an insulin sequence is "now". BG inputs are held oldest first.

pub mod atomic;
pub mod collab_error;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod history;
pub mod ingest;
pub mod mocks;
pub mod model;
pub mod reading;
pub mod record;
pub mod ring_buffer;
pub mod runner;
pub mod status;
pub mod util;

pub use crate::collab_error::map_collab_error;
pub use crate::config::{ControllerCfg, ModelCfg, ModelChoice, ScheduleCfg};
pub use crate::controller::{MpcOptimizer, MpcOptimizerBuilder, Recommendation};
pub use crate::error::{AgsError, BuildError, Result};
pub use crate::history::History;
pub use crate::ingest::{IngestOutcome, IngestionService};
pub use crate::model::{PredictionModel, StateSpaceModel, StatisticalModel};
pub use crate::reading::{BgReading, InsulinReading, TimedReading};
pub use crate::record::RawRecord;
pub use crate::ring_buffer::{RingBuffer, RingBufferError};
pub use crate::runner::{ControlLoop, LoopSummary, ModelFactory};
pub use crate::status::CycleOutcome;
