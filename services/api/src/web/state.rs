//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use study_path_core::{Pipeline, SessionRepository};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Per-user data never lives here directly: each session is a separate
/// `SessionState` value inside `sessions`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionRepository>,
    pub pipeline: Pipeline,
}
