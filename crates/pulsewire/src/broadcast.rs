//! Emit operations: one per event family.
//!
//! Each method resolves the target room from the payload's identifying
//! field, stamps the payload with the current server time, and hands the
//! event to every member of that room. Emitting to a room nobody follows
//! delivers to nobody and returns `0`.
//!
//! Delivery happens while the hub lock is held, so two emits to the same
//! room reach every member in call order.

use pulsewire_protocol::{
    AnalysisCompleted, AnalysisFailure, AnalysisProgress, BatchCompleted,
    BatchFailure, BatchProgress, CoachingHint, GenerationCompleted,
    GenerationFailure, GenerationProgress, RoomKind, RoomName,
    SamplingCompleted, SamplingFailure, SamplingProgress, ServerEvent,
    SessionUpdate, Stamped,
};
use serde_json::Value;

use crate::Hub;

impl Hub {
    async fn emit(&self, kind: RoomKind, entity_id: &str, event: ServerEvent) -> usize {
        let Some(room) = RoomName::for_entity(kind, entity_id) else {
            tracing::debug!(%kind, event = event.name(), "emit without entity id dropped");
            return 0;
        };

        let delivered = self.state.lock().await.deliver(&room, &event);
        tracing::debug!(%room, event = event.name(), delivered, "event emitted");
        delivered
    }

    // --- meeting analysis → meeting-<meeting_id> ---

    pub async fn emit_analysis_progress(&self, payload: AnalysisProgress) -> usize {
        let meeting_id = payload.meeting_id.clone();
        let event = ServerEvent::AnalysisProgress(Stamped::now(payload));
        self.emit(RoomKind::Meeting, &meeting_id, event).await
    }

    pub async fn emit_analysis_completed(
        &self,
        meeting_id: &str,
        analysis_id: &str,
        results: Value,
    ) -> usize {
        let event = ServerEvent::AnalysisCompleted(Stamped::now(AnalysisCompleted {
            meeting_id: meeting_id.to_string(),
            analysis_id: analysis_id.to_string(),
            results,
        }));
        self.emit(RoomKind::Meeting, meeting_id, event).await
    }

    pub async fn emit_analysis_error(
        &self,
        meeting_id: &str,
        analysis_id: &str,
        error: impl Into<String>,
    ) -> usize {
        let event = ServerEvent::AnalysisError(Stamped::now(AnalysisFailure {
            meeting_id: meeting_id.to_string(),
            analysis_id: analysis_id.to_string(),
            error: error.into(),
        }));
        self.emit(RoomKind::Meeting, meeting_id, event).await
    }

    // --- smart sampling → analysis-<analysis_id> ---

    pub async fn emit_sampling_progress(&self, payload: SamplingProgress) -> usize {
        let analysis_id = payload.analysis_id.clone();
        let event = ServerEvent::SamplingProgress(Stamped::now(payload));
        self.emit(RoomKind::Analysis, &analysis_id, event).await
    }

    pub async fn emit_sampling_completed(&self, analysis_id: &str, results: Value) -> usize {
        let event = ServerEvent::SamplingCompleted(Stamped::now(SamplingCompleted {
            analysis_id: analysis_id.to_string(),
            results,
        }));
        self.emit(RoomKind::Analysis, analysis_id, event).await
    }

    pub async fn emit_sampling_error(
        &self,
        analysis_id: &str,
        error: impl Into<String>,
    ) -> usize {
        let event = ServerEvent::SamplingError(Stamped::now(SamplingFailure {
            analysis_id: analysis_id.to_string(),
            error: error.into(),
        }));
        self.emit(RoomKind::Analysis, analysis_id, event).await
    }

    // --- scenario generation → generation-<generation_id> ---

    pub async fn emit_generation_progress(&self, payload: GenerationProgress) -> usize {
        let generation_id = payload.generation_id.clone();
        let event = ServerEvent::GenerationProgress(Stamped::now(payload));
        self.emit(RoomKind::Generation, &generation_id, event).await
    }

    pub async fn emit_generation_completed(
        &self,
        generation_id: &str,
        results: Value,
    ) -> usize {
        let event = ServerEvent::GenerationCompleted(Stamped::now(GenerationCompleted {
            generation_id: generation_id.to_string(),
            results,
        }));
        self.emit(RoomKind::Generation, generation_id, event).await
    }

    pub async fn emit_generation_error(
        &self,
        generation_id: &str,
        error: impl Into<String>,
    ) -> usize {
        let event = ServerEvent::GenerationError(Stamped::now(GenerationFailure {
            generation_id: generation_id.to_string(),
            error: error.into(),
        }));
        self.emit(RoomKind::Generation, generation_id, event).await
    }

    // --- batch jobs → batch-<batch_id> ---

    pub async fn emit_batch_progress(&self, payload: BatchProgress) -> usize {
        let batch_id = payload.batch_id.clone();
        let event = ServerEvent::BatchProgress(Stamped::now(payload));
        self.emit(RoomKind::Batch, &batch_id, event).await
    }

    pub async fn emit_batch_completed(&self, batch_id: &str, results: Value) -> usize {
        let event = ServerEvent::BatchCompleted(Stamped::now(BatchCompleted {
            batch_id: batch_id.to_string(),
            results,
        }));
        self.emit(RoomKind::Batch, batch_id, event).await
    }

    pub async fn emit_batch_error(&self, batch_id: &str, error: impl Into<String>) -> usize {
        let event = ServerEvent::BatchError(Stamped::now(BatchFailure {
            batch_id: batch_id.to_string(),
            error: error.into(),
        }));
        self.emit(RoomKind::Batch, batch_id, event).await
    }

    // --- practice sessions → session-<session_id> ---

    pub async fn emit_session_update(&self, payload: SessionUpdate) -> usize {
        let session_id = payload.session_id.clone();
        let event = ServerEvent::SessionUpdate(Stamped::now(payload));
        self.emit(RoomKind::Session, &session_id, event).await
    }

    pub async fn emit_coaching_hint(&self, payload: CoachingHint) -> usize {
        let session_id = payload.session_id.clone();
        let event = ServerEvent::CoachingHint(Stamped::now(payload));
        self.emit(RoomKind::Session, &session_id, event).await
    }
}
