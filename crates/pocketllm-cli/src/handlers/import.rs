//! Import command handler.

use std::path::PathBuf;

use pocketllm_core::{ImportRequest, ImportSource, OwnerId};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::format_bytes;

/// Arguments for the import command.
pub struct ImportArgs {
    pub file_path: PathBuf,
    pub name: Option<String>,
    pub owner: String,
    pub architecture: Option<String>,
    pub quantization: Option<String>,
    pub context_length: Option<u64>,
}

/// Copy a file into the managed directory and register it.
pub async fn execute(ctx: &CliContext, args: ImportArgs) -> Result<(), CliError> {
    if !args.file_path.is_file() {
        return Err(CliError::Io(format!(
            "{} is not a readable file",
            args.file_path.display()
        )));
    }

    let mut request = ImportRequest::new(ImportSource::File(args.file_path), OwnerId::new(args.owner));
    request.name = args.name;
    request.architecture = args.architecture;
    request.quantization = args.quantization;
    request.context_length = args.context_length;

    let artifact = ctx.store.import(request).await?;

    println!("Imported {} ({})", artifact.name, format_bytes(artifact.size));
    println!("  id:   {}", artifact.id);
    println!("  file: {}", ctx.store.models_dir().join(&artifact.filename).display());
    Ok(())
}
