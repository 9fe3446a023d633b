use std::io::Write;
use std::path::Path;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 21] = [
    "QUARRY_LLM_PROVIDER",
    "QUARRY_LLM_BASE_URL",
    "QUARRY_LLM_MODEL",
    "QUARRY_OPENAI_BASE_URL",
    "QUARRY_OPENAI_MODEL",
    "QUARRY_OPENAI_API_KEY",
    "QUARRY_EMBEDDING_PROVIDER",
    "QUARRY_EMBEDDING_MODEL",
    "QUARRY_EMBEDDING_BASE_URL",
    "QUARRY_CANDLE_REPO_ID",
    "QUARRY_CANDLE_DEVICE",
    "QUARRY_CHUNK_SIZE",
    "QUARRY_CHUNK_OVERLAP",
    "QUARRY_FETCH_TIMEOUT",
    "QUARRY_FETCH_MAX_BODY",
    "QUARRY_FETCH_CONCURRENCY",
    "QUARRY_USER_AGENT",
    "QUARRY_TOP_K",
    "QUARRY_CACHE_CAPACITY",
    "QUARRY_TIMEOUT_LLM",
    "QUARRY_TIMEOUT_EMBEDDING",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quarry.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{contents}").unwrap();
    (dir, path)
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Ollama);
    assert_eq!(config.embedding.model, "all-minilm");
    assert_eq!(config.ingest.chunk_size, 500);
    assert_eq!(config.ingest.chunk_overlap, 100);
    assert_eq!(config.ingest.fetch_concurrency, 1);
    assert_eq!(config.ingest.max_body_bytes, 50 * 1024 * 1024);
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.timeouts.llm_seconds, 120);
    assert!(config.llm.openai.is_none());
    assert!(config.secrets.openai_api_key.is_none());
}

#[test]
#[serial]
fn load_nonexistent_path_uses_defaults() {
    clear_env();
    let config = Config::load(Path::new("/does/not/exist.toml")).unwrap();
    assert_eq!(config.ingest.chunk_size, 500);
}

#[test]
#[serial]
fn parse_valid_toml() {
    let (_dir, path) = write_config(
        r#"
[llm]
provider = "openai"
model = "unused-for-openai"

[llm.openai]
model = "gpt-4o"
max_tokens = 512

[embedding]
provider = "openai"
model = "text-embedding-3-small"

[ingest]
chunk_size = 800
chunk_overlap = 150
fetch_concurrency = 4

[retrieval]
top_k = 6
"#,
    );

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    let openai = config.llm.openai.as_ref().unwrap();
    assert_eq!(openai.model, "gpt-4o");
    assert_eq!(openai.max_tokens, 512);
    assert_eq!(openai.base_url, "https://api.openai.com/v1");
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::OpenAi);
    assert_eq!(config.ingest.chunk_size, 800);
    assert_eq!(config.ingest.chunk_overlap, 150);
    assert_eq!(config.ingest.fetch_timeout, 30);
    assert_eq!(config.retrieval.top_k, 6);
    assert_eq!(config.retrieval.cache_capacity, 4);
}

#[test]
#[serial]
fn candle_section_defaults() {
    let (_dir, path) = write_config(
        r#"
[embedding]
provider = "candle"

[embedding.candle]
device = "auto"
"#,
    );
    clear_env();
    let config = Config::load(&path).unwrap();
    let candle = config.embedding.candle.unwrap();
    assert_eq!(candle.repo_id, "sentence-transformers/all-MiniLM-L6-v2");
    assert_eq!(candle.device, "auto");
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    let (_dir, path) = write_config("[ingest\nchunk_size = ");
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_take_precedence() {
    let (_dir, path) = write_config("[ingest]\nchunk_size = 800\n");
    clear_env();
    unsafe {
        std::env::set_var("QUARRY_CHUNK_SIZE", "1000");
        std::env::set_var("QUARRY_TOP_K", "2");
        std::env::set_var("QUARRY_EMBEDDING_PROVIDER", "Candle");
        std::env::set_var("QUARRY_CANDLE_DEVICE", "metal");
        std::env::set_var("QUARRY_OPENAI_API_KEY", "sk-from-env");
        std::env::set_var("QUARRY_LLM_MODEL", "qwen2.5");
    }

    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.ingest.chunk_size, 1000);
    assert_eq!(config.retrieval.top_k, 2);
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Candle);
    assert_eq!(config.embedding.candle.unwrap().device, "metal");
    assert_eq!(
        config.secrets.openai_api_key.as_ref().unwrap().expose(),
        "sk-from-env"
    );
    assert_eq!(config.llm.model, "qwen2.5");
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("QUARRY_CHUNK_SIZE", "lots");
        std::env::set_var("QUARRY_LLM_PROVIDER", "carrier-pigeon");
    }
    let config = Config::load(Path::new("/does/not/exist.toml")).unwrap();
    clear_env();
    assert_eq!(config.ingest.chunk_size, 500);
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
}

#[test]
#[serial]
fn overlap_not_below_size_is_rejected() {
    let (_dir, path) = write_config("[ingest]\nchunk_size = 100\nchunk_overlap = 100\n");
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("chunk_overlap"));
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ingest.fetch_concurrency = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ingest.chunk_size = 0;
    config.ingest.chunk_overlap = 0;
    assert!(config.validate().is_err());

    assert!(Config::default().validate().is_ok());
}

#[test]
fn secret_is_redacted() {
    let secret = Secret::new("sk-live");
    assert_eq!(format!("{secret:?}"), "[REDACTED]");
    assert_eq!(secret.to_string(), "[REDACTED]");
    assert_eq!(secret.expose(), "sk-live");
}

#[test]
fn derived_pipeline_configs() {
    let config = Config::default();
    assert_eq!(config.splitter_config().chunk_size, 500);
    assert_eq!(config.fetcher_config().concurrency, 1);
    let answer = config.answer_config();
    assert_eq!(answer.top_k, 4);
    assert_eq!(answer.llm_timeout.as_secs(), 120);
    assert_eq!(answer.embed_timeout.as_secs(), 30);
}

#[test]
fn provider_kind_display() {
    assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    assert_eq!(EmbeddingProviderKind::Candle.to_string(), "candle");
}
