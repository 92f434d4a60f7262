//! Best-effort worker telemetry.
//!
//! Real CPU/RAM/GPU probing is out of scope (see SPEC_FULL.md's Non-goals);
//! this worker reports no hardware telemetry rather than faking it. The
//! fields still round-trip through the wire protocol and store schema so a
//! real probe can be dropped in later without touching either.
use hive_protocol::WorkerTelemetry;

pub fn collect() -> WorkerTelemetry {
    WorkerTelemetry::default()
}
