//! Metrics for session operations.
//!
//! Records measurements through the `metrics` facade; installing a recorder
//! (and any exporter) is the embedding application's decision. Every label
//! value comes from a closed enum, so cardinality is bounded by construction.

use metrics::{counter, describe_counter};

use crate::capture::CaptureFailure;
use crate::phase::Phase;

/// Registers metric descriptions with the global recorder.
pub fn describe() {
    describe_counter!(
        "viva_phase_transitions_total",
        "Phases entered, labelled by phase name"
    );
    describe_counter!(
        "viva_capture_attempts_total",
        "Response capture attempts started"
    );
    describe_counter!(
        "viva_capture_rejections_total",
        "Capture attempts that produced no usable response, labelled by failure kind"
    );
    describe_counter!(
        "viva_stimulus_failures_total",
        "Stimulus playback failures"
    );
    describe_counter!(
        "viva_sessions_finalized_total",
        "Finalize attempts that reached the submission sink, labelled by result"
    );
}

/// Counts a phase entry.
pub fn record_phase_entered(phase: Phase) {
    counter!("viva_phase_transitions_total", "phase" => phase.as_str()).increment(1);
}

/// Counts a capture attempt.
pub fn record_capture_attempt() {
    counter!("viva_capture_attempts_total").increment(1);
}

/// Counts a rejected capture attempt.
pub fn record_capture_rejection(failure: &CaptureFailure) {
    let kind = match failure {
        CaptureFailure::Empty => "empty",
        CaptureFailure::PermissionDenied(_) => "permission_denied",
        CaptureFailure::Device(_) => "device",
    };
    counter!("viva_capture_rejections_total", "kind" => kind).increment(1);
}

/// Counts a stimulus playback failure.
pub fn record_stimulus_failure() {
    counter!("viva_stimulus_failures_total").increment(1);
}

/// Counts a submission attempt's result.
pub fn record_session_finalized(accepted: bool) {
    let result = if accepted { "submitted" } else { "failed" };
    counter!("viva_sessions_finalized_total", "result" => result).increment(1);
}
