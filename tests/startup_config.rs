//! Start-up path: config.txt, secret store precedence and runtime settings

use sheet_classifier::credentials::{
    DEFAULT_PROMPT, EXAMPLE_CONFIG, KeySource, LocalConfig, ResolvedCredentials, SecretStore,
};
use sheet_classifier::{Config, CredentialPool, Error};
use std::time::Duration;

#[tokio::test]
async fn missing_config_file_is_created_and_no_keys_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.txt");

    let local = LocalConfig::load_or_create(&path).await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    let resolved = ResolvedCredentials::resolve(&SecretStore::default(), Some(&local));
    assert_eq!(resolved.key_source, KeySource::None);
    assert_eq!(resolved.model_name, "gemini-2.5-flash-lite");

    let err = CredentialPool::new(resolved.keys).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn existing_config_file_is_not_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.txt");
    let content = "MODEL_NAME = gemini-2.0-flash\nKEYS:\nlocal-1\nlocal-2\nPROMPT:\nSay ID=<id>\n";
    std::fs::write(&path, content).unwrap();

    let local = LocalConfig::load_or_create(&path).await.unwrap();
    let resolved = ResolvedCredentials::resolve(&SecretStore::default(), Some(&local));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    assert_eq!(resolved.key_source, KeySource::LocalFile);
    assert_eq!(resolved.model_name, "gemini-2.0-flash");
    assert_eq!(resolved.prompt_template, "Say ID=<id>");

    let pool = CredentialPool::new(resolved.keys).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.current().expose(), "local-1");
}

#[test]
fn secret_store_wins_over_local_file() {
    let local =
        LocalConfig::parse("MODEL_NAME = local-model\nKEYS:\nlocal-key\nPROMPT:\nlocal prompt\n");
    let secrets = SecretStore::from_pairs([
        ("GEMINI_KEYS", "['s1', 's2', 's3']"),
        ("MODEL_NAME", "secret-model"),
    ]);

    let resolved = ResolvedCredentials::resolve(&secrets, Some(&local));

    assert_eq!(resolved.key_source, KeySource::SecretList);
    assert_eq!(
        resolved.keys.iter().map(|k| k.expose()).collect::<Vec<_>>(),
        vec!["s1", "s2", "s3"]
    );
    assert_eq!(resolved.model_name, "secret-model");
    // no PROMPT secret, so the local prompt stays
    assert_eq!(resolved.prompt_template, "local prompt");
}

#[test]
fn defaults_apply_without_any_source() {
    let resolved = ResolvedCredentials::resolve(&SecretStore::default(), None);
    assert_eq!(resolved.prompt_template, DEFAULT_PROMPT);
    assert!(resolved.keys.is_empty());
}

#[test]
fn partial_runtime_settings_fill_in_defaults() {
    let json = r#"{ "retry": { "max_attempts": 5 }, "persistence": { "flush_interval": 10 } }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.backoff, Duration::from_secs(5));
    assert_eq!(config.persistence.flush_interval, 10);
    assert_eq!(config.persistence.compact_interval, 100);
    assert_eq!(config.model.model_name, "gemini-2.5-flash-lite");
}
