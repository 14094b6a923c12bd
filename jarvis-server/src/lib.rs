//! `jarvis-server` exposes a [`jarvis_rag::RagEngine`] over HTTP.
//! It answers questions, ingests knowledge, and reports health and stats.

pub mod bootstrap;
pub mod protocol;
pub mod server;
pub mod settings;

pub use bootstrap::build_engine;
pub use server::{ApiError, AppState, ServerConfig, app_router, run_server};
pub use settings::Settings;
