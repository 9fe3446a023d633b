use super::{Config, Secret};

/// Parse `v` into `T`, warning and returning `None` when it does not parse.
fn parse_env<T: std::str::FromStr>(key: &str, v: &str) -> Option<T> {
    let parsed = v.trim().parse::<T>().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

/// Deserialize a lowercase enum name the way the TOML loader would.
fn parse_kind<T: serde::de::DeserializeOwned>(key: &str, v: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(v.trim().to_lowercase())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_providers();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_providers(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_LLM_PROVIDER")
            && let Some(kind) = parse_kind("QUARRY_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("QUARRY_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_OPENAI_BASE_URL") {
            self.llm.openai.get_or_insert_with(Default::default).base_url = v;
        }
        if let Ok(v) = std::env::var("QUARRY_OPENAI_MODEL") {
            self.llm.openai.get_or_insert_with(Default::default).model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_OPENAI_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v.trim()));
        }
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_PROVIDER")
            && let Some(kind) = parse_kind("QUARRY_EMBEDDING_PROVIDER", &v)
        {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("QUARRY_CANDLE_REPO_ID") {
            self.embedding
                .candle
                .get_or_insert_with(Default::default)
                .repo_id = v;
        }
        if let Ok(v) = std::env::var("QUARRY_CANDLE_DEVICE") {
            self.embedding
                .candle
                .get_or_insert_with(Default::default)
                .device = v;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_CHUNK_SIZE")
            && let Some(n) = parse_env("QUARRY_CHUNK_SIZE", &v)
        {
            self.ingest.chunk_size = n;
        }
        if let Ok(v) = std::env::var("QUARRY_CHUNK_OVERLAP")
            && let Some(n) = parse_env("QUARRY_CHUNK_OVERLAP", &v)
        {
            self.ingest.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("QUARRY_FETCH_TIMEOUT")
            && let Some(secs) = parse_env("QUARRY_FETCH_TIMEOUT", &v)
        {
            self.ingest.fetch_timeout = secs;
        }
        if let Ok(v) = std::env::var("QUARRY_FETCH_MAX_BODY")
            && let Some(bytes) = parse_env("QUARRY_FETCH_MAX_BODY", &v)
        {
            self.ingest.max_body_bytes = bytes;
        }
        if let Ok(v) = std::env::var("QUARRY_FETCH_CONCURRENCY")
            && let Some(n) = parse_env("QUARRY_FETCH_CONCURRENCY", &v)
        {
            self.ingest.fetch_concurrency = n;
        }
        if let Ok(v) = std::env::var("QUARRY_USER_AGENT") {
            self.ingest.user_agent = v;
        }
        if let Ok(v) = std::env::var("QUARRY_TOP_K")
            && let Some(k) = parse_env("QUARRY_TOP_K", &v)
        {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("QUARRY_CACHE_CAPACITY")
            && let Some(n) = parse_env("QUARRY_CACHE_CAPACITY", &v)
        {
            self.retrieval.cache_capacity = n;
        }
        if let Ok(v) = std::env::var("QUARRY_TIMEOUT_LLM")
            && let Some(secs) = parse_env("QUARRY_TIMEOUT_LLM", &v)
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("QUARRY_TIMEOUT_EMBEDDING")
            && let Some(secs) = parse_env("QUARRY_TIMEOUT_EMBEDDING", &v)
        {
            self.timeouts.embedding_seconds = secs;
        }
    }
}
