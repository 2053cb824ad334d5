//! Outbound events: what the server pushes to clients.
//!
//! Every event is adjacently tagged on the wire:
//!
//! ```text
//! { "event": "analysis-progress",
//!   "data":  { "meetingId": "123", "progress": 65, ..., "timestamp": "..." } }
//! ```
//!
//! The `timestamp` is never part of a payload type. Producers build the
//! payload, and the server wraps it in [`Stamped`] at emit time, so a
//! client-visible timestamp always comes from the server clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RoomName, UserId};

// ---------------------------------------------------------------------------
// Stamped
// ---------------------------------------------------------------------------

/// A payload plus the server time it was emitted at.
///
/// `#[serde(flatten)]` inlines the payload's fields next to `timestamp`,
/// so clients see one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    #[serde(flatten)]
    pub payload: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> Stamped<T> {
    /// Stamps `payload` with the current server time.
    pub fn now(payload: T) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Control payloads
// ---------------------------------------------------------------------------

/// Sent once, right after a connection is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub connection_id: u64,
    pub user_id: UserId,
}

/// Acknowledges a join or leave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAck {
    pub room: RoomName,
}

/// Reply to `ping`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {}

/// Machine-readable reason carried by the `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The room identifier was empty or whitespace.
    InvalidRoom,
    /// The caller may not subscribe to that entity.
    UnauthorizedAccess,
    /// The frame could not be decoded as a command.
    InvalidMessage,
    /// The connection was already cleaned up when the command arrived.
    NotConnected,
}

/// A command-level failure, delivered only to the offending connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Job payloads
// ---------------------------------------------------------------------------

// Progress values are passed through as given. Range checks belong to
// the producer that builds these payloads.

/// Meeting analysis progress. Routed to `meeting-<meeting_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub meeting_id: String,
    pub analysis_id: String,
    pub progress: f64,
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moments_found: Option<u32>,
}

/// Meeting analysis finished. Routed to `meeting-<meeting_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCompleted {
    pub meeting_id: String,
    pub analysis_id: String,
    pub results: Value,
}

/// Meeting analysis failed. Routed to `meeting-<meeting_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFailure {
    pub meeting_id: String,
    pub analysis_id: String,
    pub error: String,
}

/// Smart-sampling progress. Routed to `analysis-<analysis_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingProgress {
    pub analysis_id: String,
    pub progress: f64,
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments_sampled: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<u32>,
    /// Fraction of the full-analysis cost avoided by sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_savings: Option<f64>,
}

/// Smart sampling finished. Routed to `analysis-<analysis_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingCompleted {
    pub analysis_id: String,
    pub results: Value,
}

/// Smart sampling failed. Routed to `analysis-<analysis_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingFailure {
    pub analysis_id: String,
    pub error: String,
}

/// Scenario generation progress. Routed to `generation-<generation_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub generation_id: String,
    pub progress: f64,
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios_generated: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_scenarios: Option<u32>,
}

/// Scenario generation finished. Routed to `generation-<generation_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCompleted {
    pub generation_id: String,
    pub results: Value,
}

/// Scenario generation failed. Routed to `generation-<generation_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub generation_id: String,
    pub error: String,
}

/// Batch job progress. Routed to `batch-<batch_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub batch_id: String,
    pub progress: f64,
    pub stage: String,
    pub message: String,
    pub completed_items: u32,
    pub total_items: u32,
    #[serde(default)]
    pub failed_items: u32,
}

/// Batch job finished. Routed to `batch-<batch_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCompleted {
    pub batch_id: String,
    pub results: Value,
}

/// Batch job failed. Routed to `batch-<batch_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub batch_id: String,
    pub error: String,
}

/// State change in a live practice session. Routed to `session-<session_id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_id: String,
    /// e.g. `"turn"`, `"score"`, `"ended"`.
    pub update_type: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintPriority {
    Low,
    Medium,
    High,
}

/// Real-time coaching during a practice session. Routed to
/// `session-<session_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingHint {
    pub session_id: String,
    pub hint: String,
    pub category: String,
    pub priority: HintPriority,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Every event the server can push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(Stamped<Connected>),
    RoomJoined(Stamped<RoomAck>),
    RoomLeft(Stamped<RoomAck>),
    Pong(Stamped<Pong>),
    Error(Stamped<ErrorPayload>),

    AnalysisProgress(Stamped<AnalysisProgress>),
    AnalysisCompleted(Stamped<AnalysisCompleted>),
    AnalysisError(Stamped<AnalysisFailure>),

    SamplingProgress(Stamped<SamplingProgress>),
    SamplingCompleted(Stamped<SamplingCompleted>),
    SamplingError(Stamped<SamplingFailure>),

    GenerationProgress(Stamped<GenerationProgress>),
    GenerationCompleted(Stamped<GenerationCompleted>),
    GenerationError(Stamped<GenerationFailure>),

    BatchProgress(Stamped<BatchProgress>),
    BatchCompleted(Stamped<BatchCompleted>),
    BatchError(Stamped<BatchFailure>),

    SessionUpdate(Stamped<SessionUpdate>),
    CoachingHint(Stamped<CoachingHint>),
}

impl ServerEvent {
    pub fn connected(connection_id: u64, user_id: UserId) -> Self {
        Self::Connected(Stamped::now(Connected {
            connection_id,
            user_id,
        }))
    }

    pub fn room_joined(room: RoomName) -> Self {
        Self::RoomJoined(Stamped::now(RoomAck { room }))
    }

    pub fn room_left(room: RoomName) -> Self {
        Self::RoomLeft(Stamped::now(RoomAck { room }))
    }

    pub fn pong() -> Self {
        Self::Pong(Stamped::now(Pong {}))
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(Stamped::now(ErrorPayload {
            code,
            message: message.into(),
        }))
    }

    /// The wire name of this event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::RoomJoined(_) => "room-joined",
            Self::RoomLeft(_) => "room-left",
            Self::Pong(_) => "pong",
            Self::Error(_) => "error",
            Self::AnalysisProgress(_) => "analysis-progress",
            Self::AnalysisCompleted(_) => "analysis-completed",
            Self::AnalysisError(_) => "analysis-error",
            Self::SamplingProgress(_) => "sampling-progress",
            Self::SamplingCompleted(_) => "sampling-completed",
            Self::SamplingError(_) => "sampling-error",
            Self::GenerationProgress(_) => "generation-progress",
            Self::GenerationCompleted(_) => "generation-completed",
            Self::GenerationError(_) => "generation-error",
            Self::BatchProgress(_) => "batch-progress",
            Self::BatchCompleted(_) => "batch-completed",
            Self::BatchError(_) => "batch-error",
            Self::SessionUpdate(_) => "session-update",
            Self::CoachingHint(_) => "coaching-hint",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn progress(value: f64) -> AnalysisProgress {
        AnalysisProgress {
            meeting_id: "123".into(),
            analysis_id: "a1".into(),
            progress: value,
            stage: "moment-detection".into(),
            message: "Detecting key moments".into(),
            moments_found: Some(4),
        }
    }

    #[test]
    fn test_analysis_progress_wire_shape_is_flat_camel_case() {
        let event = ServerEvent::AnalysisProgress(Stamped::now(progress(65.0)));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "analysis-progress");
        assert_eq!(json["data"]["meetingId"], "123");
        assert_eq!(json["data"]["analysisId"], "a1");
        assert_eq!(json["data"]["progress"], 65.0);
        assert_eq!(json["data"]["stage"], "moment-detection");
        assert_eq!(json["data"]["momentsFound"], 4);
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn test_optional_counts_are_omitted_when_absent() {
        let event = ServerEvent::SamplingProgress(Stamped::now(SamplingProgress {
            analysis_id: "a1".into(),
            progress: 10.0,
            stage: "sampling".into(),
            message: "".into(),
            segments_sampled: None,
            total_segments: None,
            cost_savings: Some(0.42),
        }));
        let json = serde_json::to_value(&event).unwrap();
        let data = json["data"].as_object().unwrap();

        assert!(!data.contains_key("segmentsSampled"));
        assert_eq!(data["costSavings"], 0.42);
    }

    #[test]
    fn test_out_of_range_progress_passes_through() {
        let event = ServerEvent::AnalysisProgress(Stamped::now(progress(250.0)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["progress"], 250.0);

        let event = ServerEvent::AnalysisProgress(Stamped::now(progress(-3.0)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["progress"], -3.0);
    }

    #[test]
    fn test_nested_timestamp_in_results_does_not_replace_server_stamp() {
        let event = ServerEvent::AnalysisCompleted(Stamped::now(AnalysisCompleted {
            meeting_id: "123".into(),
            analysis_id: "a1".into(),
            results: json!({ "timestamp": "2001-01-01T00:00:00Z", "score": 8 }),
        }));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["data"]["results"]["timestamp"], "2001-01-01T00:00:00Z");
        assert_ne!(json["data"]["timestamp"], "2001-01-01T00:00:00Z");
    }

    #[test]
    fn test_error_event_wire_shape() {
        let event = ServerEvent::error(ErrorCode::InvalidRoom, "room id is empty");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["code"], "INVALID_ROOM");
        assert_eq!(json["data"]["message"], "room id is empty");
    }

    #[test]
    fn test_coaching_hint_priority_is_lowercase() {
        let event = ServerEvent::CoachingHint(Stamped::now(CoachingHint {
            session_id: "s1".into(),
            hint: "Ask an open question".into(),
            category: "discovery".into(),
            priority: HintPriority::High,
        }));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "coaching-hint");
        assert_eq!(json["data"]["priority"], "high");
        assert_eq!(json["data"]["sessionId"], "s1");
    }

    #[test]
    fn test_event_decodes_back_from_wire() {
        let event = ServerEvent::room_joined(RoomName::parse("meeting-9").unwrap());
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.name(), "room-joined");
    }
}
