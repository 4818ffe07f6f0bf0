//! services/api/src/lib.rs
//!
//! The HTTP service around `study_path_core`: configuration, the concrete
//! adapters behind the core ports and the Axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
