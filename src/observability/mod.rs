//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (tunnel key, req_id, ws_id) instead of formatted text
//! - Metrics are cheap (atomic increments) and always recorded; the exporter
//!   is optional

pub mod logging;
pub mod metrics;
