//! List command handler.

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_bytes, format_optional, print_separator, truncate_string};

/// Print every listed model with its load status.
pub async fn execute(ctx: &CliContext, json: bool) -> Result<(), CliError> {
    let views = ctx.store.list_with_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No models imported.");
        println!("Use 'pocketllm import <file>' to add your first model.");
        return Ok(());
    }

    println!("Found {} model(s):\n", views.len());
    println!(
        "{:<14} {:<28} {:<10} {:<8} {:<9} {:<10} {:<7} Imported",
        "ID", "Name", "Arch", "Quant", "Context", "Size", "Loaded"
    );
    print_separator(110);

    for view in views {
        let model = &view.artifact;
        println!(
            "{:<14} {:<28} {:<10} {:<8} {:<9} {:<10} {:<7} {}",
            model.id.short(),
            truncate_string(&model.name, 27),
            truncate_string(model.architecture.as_deref().unwrap_or("--"), 9),
            truncate_string(model.quantization.as_deref().unwrap_or("--"), 7),
            format_optional(model.context_length.as_ref(), "--"),
            format_bytes(model.size),
            if view.status.is_loaded { "yes" } else { "no" },
            model.imported_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}
