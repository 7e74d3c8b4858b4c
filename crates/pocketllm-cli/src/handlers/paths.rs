//! Paths command handler.

use crate::bootstrap::CliContext;

/// Print the resolved data root, database and models directory.
pub fn execute(ctx: &CliContext) {
    println!("{}", ctx.paths);
}
