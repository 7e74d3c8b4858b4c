//! Validate command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Fail if any stored catalog entry has a filename with a path separator.
pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let checked = ctx.store.validate_all().await?;
    println!("Catalog OK: {checked} entr{} checked", if checked == 1 { "y" } else { "ies" });
    Ok(())
}
