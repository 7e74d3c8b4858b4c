//! CLI entry point.

use clap::{CommandFactory, Parser};
use std::process::ExitCode;

use pocketllm_cli::handlers::{self, import::ImportArgs};
use pocketllm_cli::{Cli, CliError, Commands, bootstrap, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(err.downcast_ref::<CliError>().map_or(1, CliError::exit_code))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(cli.models_dir.as_deref()).await?;

    match command {
        Commands::Paths => handlers::paths::execute(&ctx),
        Commands::Import {
            file_path,
            name,
            owner,
            architecture,
            quantization,
            context_length,
        } => {
            let args = ImportArgs {
                file_path,
                name,
                owner,
                architecture,
                quantization,
                context_length,
            };
            handlers::import::execute(&ctx, args).await?;
        }
        Commands::List { json } => handlers::list::execute(&ctx, json).await?,
        Commands::Remove { name } => handlers::remove::execute(&ctx, &name).await?,
        Commands::Validate => handlers::validate::execute(&ctx).await?,
        Commands::Verify { name } => handlers::verify::execute(&ctx, name.as_deref()).await?,
        Commands::History { name } => handlers::history::execute(&ctx, &name).await?,
        Commands::Settings { command } => handlers::settings::execute(&ctx, command).await?,
        Commands::Config { command } => handlers::config::execute(&ctx, command).await?,
    }

    Ok(())
}
