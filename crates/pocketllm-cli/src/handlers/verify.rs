//! Verify command handler.
//!
//! Runs the same integrity gate the runtime applies before a load, without
//! touching a native context.

use pocketllm_runtime::verify_model_file;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::format_bytes;

/// Check one model (or all) on disk.
pub async fn execute(ctx: &CliContext, name: Option<&str>) -> Result<(), CliError> {
    let models = match name {
        Some(name) => vec![
            ctx.store
                .get_by_name(name)
                .ok_or_else(|| CliError::NotFound(name.to_string()))?,
        ],
        None => ctx.store.list(),
    };
    let min_size = ctx.policy().await?.min_model_size_bytes;

    let mut failed = 0usize;
    for model in &models {
        let checked = match ctx.store.path_for(model) {
            Ok(path) => verify_model_file(&path, min_size).await,
            Err(e) => Err(e),
        };
        match checked {
            Ok(size) => println!("OK    {} ({})", model.name, format_bytes(size)),
            Err(e) => {
                failed += 1;
                println!("FAIL  {}: {e}", model.name);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Integrity(format!(
            "{failed} of {} model(s) failed verification; re-import them",
            models.len()
        )));
    }
    Ok(())
}
