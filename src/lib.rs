//! # AGV Fleet Monitor
//!
//! Polls the AGV status table, detects when any vehicle row changes and pushes
//! the full snapshot to every connected viewer. Viewers turn raw rows into
//! typed per-vehicle views.
//!
//! ## Features
//!
//! - **Change-driven broadcast**: a snapshot goes out only when its content differs
//! - **Single-flight polling**: a slow store never stacks up queries
//! - **Fault-tolerant**: store failures are logged, the last snapshot stays current
//! - **Typed decoding**: big-endian field buffers with an explicit "N/A" sentinel
//! - **Configurable tables**: fault and location labels overridable from TOML
//!
//! ## Quick Start
//!
//! ```rust
//! use agvmon::{decode, AgvRecord, Classifier, Snapshot, ViewProjector};
//!
//! let mut record = AgvRecord::new(1);
//! record.agv_id = Some(7);
//! record.battery_raw = decode::encode(75, decode::WORD_WIDTH);
//! record.route = decode::encode(12, decode::WORD_WIDTH);
//! let snapshot = Snapshot::new(vec![record]).unwrap();
//!
//! let mut projector = ViewProjector::new(Classifier::builtin(), vec![1, 2]);
//! let views = projector.apply(&snapshot);
//! assert!(views[0].available);
//! assert_eq!(views[0].location, "WINDSHIELD");
//! assert!(!views[1].available);
//! ```
//!
//! ## Architecture
//!
//! - [`store`] - Store trait, SQLite and fixture implementations
//! - [`collector`] - Single-flight, time-bounded polls
//! - [`detector`] - Change detection between snapshots
//! - [`hub`] - Subscriber set and snapshot fan-out
//! - [`monitor`] - Poll loop tying the above together
//! - [`server`] - Newline-delimited JSON transport for viewers
//! - [`decode`] / [`classify`] / [`projector`] - Viewer-side view model

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod classify;
pub mod collector;
pub mod config;
pub mod decode;
pub mod detector;
pub mod error;
pub mod hub;
pub mod monitor;
pub mod projector;
pub mod record;
pub mod server;
pub mod store;

// Re-export main public types for convenience
pub use classify::{Classifier, FaultEntry, FaultTable, LocationTable, Severity};
pub use collector::{LateFetch, PollOutcome, PollPermit, StoreCollector};
pub use config::MonitorConfig;
pub use decode::Reading;
pub use detector::{Change, ChangeDetector};
pub use error::{ConfigError, EventError, MonitorError, StoreError};
pub use hub::{BroadcastHub, SubscriberId, Subscription, SUBSCRIBER_QUEUE_DEPTH};
pub use monitor::{Monitor, MonitorStats, TickOutcome};
pub use projector::{AgvState, AgvView, AvailabilityTracker, BatteryLevel, ViewProjector};
pub use record::{AgvRecord, CommunicationId, Snapshot};
pub use store::{FixtureStore, SqliteStore, Store};
