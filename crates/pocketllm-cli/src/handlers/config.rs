//! Global configuration handlers.

use pocketllm_core::SettingsUpdate;

use crate::bootstrap::CliContext;
use crate::commands::ConfigCommand;
use crate::error::CliError;

/// Dispatch a config subcommand.
pub async fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<(), CliError> {
    match command {
        ConfigCommand::Show => show(ctx).await,
        ConfigCommand::Set {
            idle_timeout_ms,
            hard_timeout_ms,
            stop_grace_ms,
            busy_retry_after_ms,
            max_load_failures,
            min_model_size_bytes,
            default_context_size,
            remove_corrupt_files,
        } => {
            let update = SettingsUpdate {
                idle_timeout_ms: idle_timeout_ms.map(Some),
                hard_timeout_ms: hard_timeout_ms.map(Some),
                stop_grace_ms: stop_grace_ms.map(Some),
                busy_retry_after_ms: busy_retry_after_ms.map(Some),
                max_load_failures: max_load_failures.map(Some),
                min_model_size_bytes: min_model_size_bytes.map(Some),
                default_context_size: default_context_size.map(Some),
                remove_corrupt_files: remove_corrupt_files.map(Some),
                default_inference: None,
            };
            if is_empty(&update) {
                return Err(CliError::Arguments(
                    "nothing to update; pass at least one option".to_string(),
                ));
            }
            ctx.settings.update_global(&update).await?;
            println!("Configuration updated.");
            show(ctx).await
        }
    }
}

async fn show(ctx: &CliContext) -> Result<(), CliError> {
    let settings = ctx.settings.global().await?;
    let policy = settings.runtime_policy();

    println!("{}", serde_json::to_string_pretty(&settings)?);
    println!();
    println!("Effective runtime policy:");
    println!("  idle timeout:        {:?}", policy.idle_timeout);
    println!("  hard timeout:        {:?}", policy.hard_timeout);
    println!("  stop grace:          {:?}", policy.stop_grace);
    println!("  busy retry after:    {:?}", policy.busy_retry_after);
    println!("  max load failures:   {}", policy.max_load_failures);
    println!("  min model size:      {} bytes", policy.min_model_size_bytes);
    println!("  default context:     {}", policy.default_context_size);
    println!("  remove corrupt files: {}", policy.remove_corrupt_files);
    Ok(())
}

const fn is_empty(update: &SettingsUpdate) -> bool {
    update.idle_timeout_ms.is_none()
        && update.hard_timeout_ms.is_none()
        && update.stop_grace_ms.is_none()
        && update.busy_retry_after_ms.is_none()
        && update.max_load_failures.is_none()
        && update.min_model_size_bytes.is_none()
        && update.default_context_size.is_none()
        && update.remove_corrupt_files.is_none()
        && update.default_inference.is_none()
}
