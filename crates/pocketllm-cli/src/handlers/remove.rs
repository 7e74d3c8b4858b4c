//! Remove command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Soft-delete a model and remove its file.
pub async fn execute(ctx: &CliContext, name: &str) -> Result<(), CliError> {
    if !ctx.store.delete(name).await? {
        return Err(CliError::NotFound(name.to_string()));
    }
    if let Err(e) = ctx.settings.remove(name).await {
        tracing::warn!(model = name, error = %e, "Failed to remove model settings");
    }
    println!("Removed {name}");
    Ok(())
}
