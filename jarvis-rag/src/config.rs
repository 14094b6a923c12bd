//! Configuration for chunking, retrieval, and prompt history.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Nominal chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results to retrieve when a query does not specify one.
    pub top_k: usize,
    /// Number of vectors sent to the index per upsert call.
    pub upsert_batch_size: usize,
    /// Number of most recent history entries rendered into a prompt.
    pub history_window: usize,
    /// Maximum number of entries a conversation session retains.
    pub max_history_entries: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            upsert_batch_size: 100,
            history_window: 10,
            max_history_entries: 200,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load configuration from process environment variables.
    ///
    /// Unset variables fall back to the defaults. See [`RagConfig::from_lookup`]
    /// for the recognised keys.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Recognised keys: `CHUNK_SIZE`, `CHUNK_OVERLAP`, `TOP_K_RESULTS`,
    /// `UPSERT_BATCH_SIZE`, `HISTORY_WINDOW`, `MAX_HISTORY_ENTRIES`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a value does not parse or the
    /// resulting configuration fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self::builder()
            .chunk_size(parse_or(&lookup, "CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(parse_or(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .top_k(parse_or(&lookup, "TOP_K_RESULTS", defaults.top_k)?)
            .upsert_batch_size(parse_or(
                &lookup,
                "UPSERT_BATCH_SIZE",
                defaults.upsert_batch_size,
            )?)
            .history_window(parse_or(&lookup, "HISTORY_WINDOW", defaults.history_window)?)
            .max_history_entries(parse_or(
                &lookup,
                "MAX_HISTORY_ENTRIES",
                defaults.max_history_entries,
            )?)
            .build()
    }
}

/// Parse `key` from `lookup`, falling back to `default` when unset or blank.
pub fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| RagError::ConfigError(format!("invalid value for {key} ({raw:?}): {e}"))),
        _ => Ok(default),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the nominal chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of vectors per upsert call.
    pub fn upsert_batch_size(mut self, size: usize) -> Self {
        self.config.upsert_batch_size = size;
        self
    }

    /// Set how many recent history entries a prompt may include.
    pub fn history_window(mut self, window: usize) -> Self {
        self.config.history_window = window;
        self
    }

    /// Set the retention cap for a conversation session.
    pub fn max_history_entries(mut self, max: usize) -> Self {
        self.config.max_history_entries = max;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// An overlap greater than or equal to the chunk size is accepted; the
    /// chunker still advances on every window.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any of `chunk_size`, `top_k`,
    /// `upsert_batch_size`, `history_window`, or `max_history_entries` is zero.
    pub fn build(self) -> Result<RagConfig> {
        let checks = [
            ("chunk_size", self.config.chunk_size),
            ("top_k", self.config.top_k),
            ("upsert_batch_size", self.config.upsert_batch_size),
            ("history_window", self.config.history_window),
            ("max_history_entries", self.config.max_history_entries),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, value)| *value == 0) {
            return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.upsert_batch_size, 100);
        assert_eq!(config.history_window, 10);
    }

    #[test]
    fn env_values_override_defaults() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("CHUNK_SIZE", "256"),
            ("CHUNK_OVERLAP", " 32 "),
            ("TOP_K_RESULTS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.chunk_overlap, 32);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn unparsable_value_is_a_config_error() {
        let err = RagConfig::from_lookup(lookup_from(&[("CHUNK_SIZE", "big")])).unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("CHUNK_SIZE")));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("top_k")));
    }

    #[test]
    fn overlap_larger_than_chunk_size_is_accepted() {
        let config = RagConfig::builder().chunk_size(10).chunk_overlap(20).build().unwrap();
        assert_eq!(config.chunk_overlap, 20);
    }
}
