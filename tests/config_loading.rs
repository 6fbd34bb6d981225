use std::io::Write;

use syllabot_core::config::AppConfig;
use syllabot_core::error::SyllabotError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-test-key"
max_tokens = 2048
temperature = 0.2

[model.retry]
max_retries = 5

[agent]
max_turns = 6

[protocol]
enforce_sequence = false
max_handoffs = 12

[source]
page_url = "https://example.org/downloads"
required_substring = "Syllabus_EN"

[vector_store]
id = "vs_from_file"
max_num_results = 3

[web_search]
provider = "tavily"
api_key = "tvly-test"

[prompts]
dir = "/etc/syllabot/prompts"
user_input = "request.md"

[http]
timeout_secs = 10
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.api_key.as_deref(), Some("sk-test-key"));
    assert_eq!(config.model.max_tokens, 2048);
    let retry = config.model.retry.expect("retry present");
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 1000);

    assert_eq!(config.agent.max_turns, 6);
    assert!(!config.protocol.enforce_sequence);
    assert_eq!(config.protocol.max_handoffs, 12);
    assert_eq!(config.source.page_url, "https://example.org/downloads");
    assert_eq!(config.source.required_substring, "Syllabus_EN");
    assert_eq!(config.vector_store.id.as_deref(), Some("vs_from_file"));
    assert_eq!(config.vector_store.max_num_results, 3);
    assert_eq!(config.web_search.expect("web search present").api_key, "tvly-test");
    assert_eq!(
        config.prompts.prompt_path(&config.prompts.coordinator),
        std::path::PathBuf::from("/etc/syllabot/prompts/coordinator.md")
    );
    assert_eq!(config.prompts.user_input, "request.md");
    assert_eq!(config.http.timeout_secs, 10);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("SYLLABOT_TEST_MODEL_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
api_key = "${SYLLABOT_TEST_MODEL_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("SYLLABOT_TEST_MODEL_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "gpt-4o"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.agent.max_turns, 12);
    assert!(config.protocol.enforce_sequence);
    assert_eq!(config.protocol.max_handoffs, 8);
    assert_eq!(config.source.page_url, "https://casqb.org/ke-stazeni");
    assert_eq!(config.source.required_substring, "ISTQB_CTFL_Syllabus_CZ");
    assert_eq!(config.vector_store.base_url, "https://api.openai.com/v1");
    assert!(config.vector_store.id.is_none());
    assert!(config.web_search.is_none());
    assert!(config.model.retry.is_none());
    assert_eq!(config.prompts.dir, "prompts");
    assert_eq!(config.prompts.user_input, "user_input.md");
    assert_eq!(config.http.timeout_secs, 30);
}

#[test]
fn test_missing_vector_store_id_is_configuration_error() {
    let config = AppConfig::default();
    let err = config.require_vector_store_id().unwrap_err();
    assert_eq!(err.kind(), "configuration");
    assert!(err.to_string().contains("VECTOR_STORE_ID"));
}

#[test]
fn test_missing_file_is_config_not_found() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SyllabotError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_toml_is_configuration_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[agent]\nmax_turns = \"many\"\n").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), "configuration");
}
