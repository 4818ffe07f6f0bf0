//! crates/study_path_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the pipeline's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! core independent of the generation backend, the workspace page API, and
//! wherever sessions happen to be kept.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Attachment, PageRecord, SessionState};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, quota).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Upstream service answered with status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Unsupported request: {0}")]
    Unsupported(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// One user turn sent to the generation backend.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub conversation_id: Uuid,
    /// Task description the backend must follow for this turn.
    pub instruction: &'a str,
    pub input_text: &'a str,
    pub attachment: Option<&'a Attachment>,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Runs one turn to completion and returns the text fragments of the
    /// final response, in order.
    async fn generate(&self, request: GenerationRequest<'_>) -> PortResult<Vec<String>>;
}

#[async_trait]
pub trait PageSubmissionService: Send + Sync {
    /// Creates one page in the workspace from the given record.
    async fn create_page(&self, record: &PageRecord) -> PortResult<()>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, session_id: Uuid) -> PortResult<Arc<SessionState>>;

    /// Stores `state` under its id, replacing any previous value.
    async fn put(&self, state: SessionState) -> PortResult<Arc<SessionState>>;

    /// Updates a session that is still stored. Fails with `NotFound` when the
    /// id was removed or evicted in the meantime.
    async fn replace(&self, state: SessionState) -> PortResult<Arc<SessionState>>;

    async fn remove(&self, session_id: Uuid) -> PortResult<()>;
}
