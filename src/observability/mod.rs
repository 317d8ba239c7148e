//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! store / processors / cache produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log lines
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Processor failures, lock timeouts and resyncs are always both logged
//!   and counted
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
