//! Process settings read from the environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use jarvis_rag::RagConfig;
use jarvis_rag::config::parse_or;
use jarvis_rag::ollama;

/// Default index (collection) name.
pub const DEFAULT_INDEX_NAME: &str = "jarvis-knowledge-base";
/// Default Qdrant gRPC address.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Which embedding backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Ollama,
    OpenAI,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(format!("unknown embedding backend '{other}' (expected ollama or openai)")),
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        })
    }
}

/// Which similarity index to store vectors in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Memory,
    Qdrant,
}

impl FromStr for VectorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(format!("unknown vector backend '{other}' (expected memory or qdrant)")),
        }
    }
}

impl fmt::Display for VectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Qdrant => "qdrant",
        })
    }
}

/// Everything the `jarvis` binary needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub embedding_base_url: String,
    pub openai_api_key: Option<String>,
    pub vector_backend: VectorBackend,
    pub qdrant_url: String,
    pub index_name: String,
    pub generation_timeout: Duration,
    pub health_timeout: Duration,
    pub embedding_timeout: Duration,
    pub rag: RagConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Blank values count as unset. `EMBEDDING_BASE_URL` defaults to
    /// `OLLAMA_BASE_URL` for the Ollama backend and to the public OpenAI API
    /// otherwise.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: u64| {
            parse_or(&lookup, key, default).map(Duration::from_secs)
        };

        let ollama_base_url = text("OLLAMA_BASE_URL", ollama::DEFAULT_BASE_URL);
        let embedding_backend = parse_or(&lookup, "EMBEDDING_BACKEND", EmbeddingBackend::Ollama)?;
        let (default_embedding_url, default_embedding_model) = match embedding_backend {
            EmbeddingBackend::Ollama => (ollama_base_url.as_str(), ollama::DEFAULT_EMBEDDING_MODEL),
            EmbeddingBackend::OpenAI => {
                (jarvis_rag::openai::DEFAULT_BASE_URL, jarvis_rag::openai::DEFAULT_MODEL)
            }
        };

        Ok(Self {
            host: text("API_HOST", "0.0.0.0"),
            port: parse_or(&lookup, "API_PORT", 8000)?,
            embedding_model: text("EMBEDDING_MODEL", default_embedding_model),
            embedding_base_url: text("EMBEDDING_BASE_URL", default_embedding_url),
            ollama_model: text("OLLAMA_MODEL", ollama::DEFAULT_MODEL),
            ollama_base_url,
            embedding_backend,
            openai_api_key: lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()),
            vector_backend: parse_or(&lookup, "VECTOR_BACKEND", VectorBackend::Memory)?,
            qdrant_url: text("QDRANT_URL", DEFAULT_QDRANT_URL),
            index_name: text("INDEX_NAME", DEFAULT_INDEX_NAME),
            generation_timeout: secs("GENERATION_TIMEOUT_SECS", 60)?,
            health_timeout: secs("HEALTH_TIMEOUT_SECS", 5)?,
            embedding_timeout: secs("EMBEDDING_TIMEOUT_SECS", 30)?,
            rag: RagConfig::from_lookup(&lookup)?,
        })
    }

    /// The `host:port` the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let settings = Settings::from_lookup(|_| None).unwrap();

        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert_eq!(settings.ollama_base_url, "http://localhost:11434");
        assert_eq!(settings.ollama_model, "llama2");
        assert_eq!(settings.embedding_backend, EmbeddingBackend::Ollama);
        assert_eq!(settings.embedding_model, "all-minilm");
        assert_eq!(settings.embedding_base_url, "http://localhost:11434");
        assert_eq!(settings.vector_backend, VectorBackend::Memory);
        assert_eq!(settings.index_name, "jarvis-knowledge-base");
        assert_eq!(settings.generation_timeout, Duration::from_secs(60));
        assert_eq!(settings.health_timeout, Duration::from_secs(5));
        assert_eq!(settings.embedding_timeout, Duration::from_secs(30));
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.rag, RagConfig::default());
    }

    #[test]
    fn embedding_url_follows_ollama_url() {
        let settings =
            Settings::from_lookup(lookup_from(&[("OLLAMA_BASE_URL", "http://gpu-box:11434")]))
                .unwrap();
        assert_eq!(settings.embedding_base_url, "http://gpu-box:11434");
    }

    #[test]
    fn openai_backend_switches_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("EMBEDDING_BACKEND", "OpenAI"),
            ("OPENAI_API_KEY", "sk-test"),
            ("TOP_K_RESULTS", "5"),
        ]))
        .unwrap();

        assert_eq!(settings.embedding_backend, EmbeddingBackend::OpenAI);
        assert_eq!(settings.embedding_base_url, "https://api.openai.com");
        assert_eq!(settings.embedding_model, "text-embedding-3-small");
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.rag.top_k, 5);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Settings::from_lookup(lookup_from(&[("API_PORT", "eighty")])).is_err());
        assert!(Settings::from_lookup(lookup_from(&[("VECTOR_BACKEND", "pinecone")])).is_err());
        assert!(Settings::from_lookup(lookup_from(&[("CHUNK_SIZE", "0")])).is_err());
    }
}
