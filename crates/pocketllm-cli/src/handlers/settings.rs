//! Per-model settings handlers.

use pocketllm_core::ModelSettingsUpdate;

use crate::bootstrap::CliContext;
use crate::commands::SettingsCommand;
use crate::error::CliError;

/// Dispatch a settings subcommand.
pub async fn execute(ctx: &CliContext, command: SettingsCommand) -> Result<(), CliError> {
    match command {
        SettingsCommand::Show { name } => show(ctx, &name).await,
        SettingsCommand::Set {
            name,
            temperature,
            top_p,
            top_k,
            max_tokens,
            repeat_penalty,
            threads,
            context_length,
        } => {
            let update = ModelSettingsUpdate {
                temperature: temperature.map(Some),
                top_p: top_p.map(Some),
                top_k: top_k.map(Some),
                max_tokens: max_tokens.map(Some),
                repeat_penalty: repeat_penalty.map(Some),
                threads: threads.map(Some),
                context_length: context_length.map(Some),
            };
            set(ctx, &name, &update).await
        }
    }
}

async fn show(ctx: &CliContext, name: &str) -> Result<(), CliError> {
    if ctx.store.get_by_name(name).is_none() {
        return Err(CliError::NotFound(name.to_string()));
    }
    let settings = ctx.settings.get_or_default(name).await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn set(ctx: &CliContext, name: &str, update: &ModelSettingsUpdate) -> Result<(), CliError> {
    if ctx.store.get_by_name(name).is_none() {
        return Err(CliError::NotFound(name.to_string()));
    }
    let settings = ctx.settings.update(name, update).await?;
    println!("Updated settings for {name}");
    println!("{}", serde_json::to_string_pretty(&settings.inference)?);
    Ok(())
}
