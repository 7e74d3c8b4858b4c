//! History command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_optional, print_separator};

/// Print every recorded metadata version of a model.
pub async fn execute(ctx: &CliContext, name: &str) -> Result<(), CliError> {
    let artifact = ctx
        .store
        .get_by_name(name)
        .ok_or_else(|| CliError::NotFound(name.to_string()))?;
    let versions = ctx.store.history(&artifact.id).await?;

    println!("{} ({})", artifact.name, artifact.id);
    println!("{:<5} {:<14} {:<9} {:<8} Recorded", "Seq", "Version", "Context", "Active");
    print_separator(60);
    for version in versions {
        println!(
            "{:<5} {:<14} {:<9} {:<8} {}",
            version.seq,
            version.hash.short(),
            format_optional(version.artifact.context_length.as_ref(), "--"),
            version.artifact.active,
            version.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}
