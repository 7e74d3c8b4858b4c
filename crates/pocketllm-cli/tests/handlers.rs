//! Handler tests against a real on-disk catalog.

use std::path::Path;
use std::sync::Arc;

use pocketllm_cli::handlers::{self, import::ImportArgs};
use pocketllm_cli::{CliContext, CliError, ConfigCommand, SettingsCommand};
use pocketllm_core::{
    ArtifactStore, NoopEmitter, ResolvedPaths, SettingsStore,
};
use pocketllm_db::{CoreFactory, setup_database};
use pocketllm_runtime::GGUF_MAGIC;

async fn context(root: &Path) -> CliContext {
    let paths = ResolvedPaths::from_overrides(Some(root), None, None).unwrap();
    let pool = setup_database(&paths.database_path).await.unwrap();
    let repos = CoreFactory::build_repos(pool);
    let settings = SettingsStore::new(repos.model_settings, repos.settings);
    let store = Arc::new(ArtifactStore::new(
        repos.artifacts,
        settings.clone(),
        Arc::new(NoopEmitter::new()),
        paths.models_dir.clone(),
    ));
    store.refresh().await.unwrap();
    CliContext {
        paths,
        store,
        settings,
    }
}

fn write_model(dir: &Path, name: &str, size: usize) -> std::path::PathBuf {
    let mut data = vec![0u8; size];
    data[..4].copy_from_slice(&GGUF_MAGIC);
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn import_args(file_path: std::path::PathBuf) -> ImportArgs {
    ImportArgs {
        file_path,
        name: None,
        owner: "local".to_string(),
        architecture: Some("llama".to_string()),
        quantization: None,
        context_length: None,
    }
}

#[tokio::test]
async fn test_import_list_remove() {
    let root = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let ctx = context(root.path()).await;
    let file = write_model(source.path(), "tiny.gguf", 2 * 1024 * 1024);

    handlers::import::execute(&ctx, import_args(file.clone()))
        .await
        .unwrap();
    assert!(ctx.paths.models_dir.join("tiny.gguf").exists());
    handlers::list::execute(&ctx, false).await.unwrap();
    handlers::list::execute(&ctx, true).await.unwrap();

    let err = handlers::import::execute(&ctx, import_args(file))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);

    handlers::remove::execute(&ctx, "tiny.gguf").await.unwrap();
    assert!(ctx.store.list().is_empty());
    assert!(!ctx.paths.models_dir.join("tiny.gguf").exists());

    let err = handlers::remove::execute(&ctx, "tiny.gguf")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::NotFound(_)));
}

#[tokio::test]
async fn test_verify_reports_truncated_files() {
    let root = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let ctx = context(root.path()).await;
    let file = write_model(source.path(), "good.gguf", 2 * 1024 * 1024);
    handlers::import::execute(&ctx, import_args(file)).await.unwrap();

    handlers::verify::execute(&ctx, None).await.unwrap();
    handlers::verify::execute(&ctx, Some("good.gguf")).await.unwrap();

    std::fs::write(ctx.paths.models_dir.join("good.gguf"), b"GGUF").unwrap();
    let err = handlers::verify::execute(&ctx, None).await.unwrap_err();
    assert!(matches!(err, CliError::Integrity(_)));
    assert_eq!(err.exit_code(), 65);

    let err = handlers::verify::execute(&ctx, Some("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::NotFound(_)));
}

#[tokio::test]
async fn test_validate_and_history() {
    let root = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let ctx = context(root.path()).await;
    let file = write_model(source.path(), "hist.gguf", 2 * 1024 * 1024);
    handlers::import::execute(&ctx, import_args(file)).await.unwrap();

    handlers::validate::execute(&ctx).await.unwrap();
    handlers::history::execute(&ctx, "hist.gguf").await.unwrap();

    let artifact = ctx.store.get_by_name("hist.gguf").unwrap();
    ctx.store
        .update_runtime_metadata(&artifact.id, 4096)
        .await
        .unwrap();
    let history = ctx.store.history(&artifact.id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_settings_and_config_commands() {
    let root = tempfile::tempdir().unwrap();
    let source = tempfile::tempdir().unwrap();
    let ctx = context(root.path()).await;
    let file = write_model(source.path(), "cfg.gguf", 2 * 1024 * 1024);
    handlers::import::execute(&ctx, import_args(file)).await.unwrap();

    handlers::settings::execute(
        &ctx,
        SettingsCommand::Set {
            name: "cfg.gguf".to_string(),
            temperature: Some(0.2),
            top_p: None,
            top_k: None,
            max_tokens: Some(256),
            repeat_penalty: None,
            threads: Some(4),
            context_length: None,
        },
    )
    .await
    .unwrap();
    let stored = ctx.settings.get("cfg.gguf").await.unwrap().unwrap();
    assert_eq!(stored.inference.max_tokens, Some(256));
    assert_eq!(stored.threads, Some(4));

    handlers::settings::execute(
        &ctx,
        SettingsCommand::Show {
            name: "cfg.gguf".to_string(),
        },
    )
    .await
    .unwrap();

    handlers::config::execute(
        &ctx,
        ConfigCommand::Set {
            idle_timeout_ms: Some(2_000),
            hard_timeout_ms: None,
            stop_grace_ms: None,
            busy_retry_after_ms: None,
            max_load_failures: Some(5),
            min_model_size_bytes: None,
            default_context_size: None,
            remove_corrupt_files: None,
        },
    )
    .await
    .unwrap();
    let policy = ctx.policy().await.unwrap();
    assert_eq!(policy.idle_timeout.as_millis(), 2_000);
    assert_eq!(policy.max_load_failures, 5);

    let err = handlers::config::execute(
        &ctx,
        ConfigCommand::Set {
            idle_timeout_ms: None,
            hard_timeout_ms: None,
            stop_grace_ms: None,
            busy_retry_after_ms: None,
            max_load_failures: None,
            min_model_size_bytes: None,
            default_context_size: Some(10),
            remove_corrupt_files: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.exit_code(), 78);
}
