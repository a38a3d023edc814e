use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use runner::{
    AppContext, BootstrapError, CliOverrides, FaqImportError, import_faq_file, load_config,
    shutdown_signal,
};
use thiserror::Error;
use types::{RuntimeError, init_tracing};

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
enum CliCommand {
    /// Serve the chat API
    Serve,
    /// FAQ knowledge base maintenance
    Faq {
        #[command(subcommand)]
        action: FaqAction,
    },
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
enum FaqAction {
    /// Embed and upsert entries from a JSON array file
    Import { file: PathBuf },
    /// Print the best FAQ match for a query
    Search { query: String },
}

#[derive(Debug, Clone, Parser, PartialEq, Eq)]
#[command(name = "helpdesk", about = "Helpdesk chatbot backend")]
struct CliArgs {
    #[arg(short = 'c', long = "config")]
    config_path: Option<PathBuf>,
    #[arg(long = "profile")]
    profile: Option<String>,
    /// Overrides `server.bind_address`
    #[arg(long = "bind")]
    bind_address: Option<String>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    FaqImport(#[from] FaqImportError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("failed to start async runtime: {0}")]
    AsyncRuntimeInit(#[source] std::io::Error),
}

fn main() -> ExitCode {
    if let Err(error) = run() {
        eprintln!("helpdesk error: {error}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<(), CliError> {
    init_tracing();
    let args = CliArgs::parse();
    let config = load_config(
        args.profile.as_deref(),
        args.config_path,
        CliOverrides::with_bind_address(args.bind_address),
    )?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::AsyncRuntimeInit)?;

    rt.block_on(async move {
        let context = AppContext::build(config).await?;
        match args.command {
            CliCommand::Serve => context.serve(shutdown_signal()).await?,
            CliCommand::Faq { action } => handle_faq_action(&context, action).await?,
        }
        Ok::<(), CliError>(())
    })
}

async fn handle_faq_action(context: &AppContext, action: FaqAction) -> Result<(), CliError> {
    match action {
        FaqAction::Import { file } => {
            let imported =
                import_faq_file(&file, context.embedder().as_ref(), context.store().as_ref())
                    .await?;
            println!("imported={imported}");
        }
        FaqAction::Search { query } => {
            let outcome = context.faq_search().search(&query).await?;
            println!("found={}", outcome.found);
            println!("score={:.4}", outcome.score);
            if let Some(entry) = outcome.entry {
                println!("faq_uuid={}", entry.faq_uuid);
                println!("category={}", entry.category);
                println!("question={}", entry.question);
                println!("answer={}", entry.answer);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cli_args_requires_subcommand() {
        assert!(CliArgs::try_parse_from(["helpdesk"]).is_err());
    }

    #[test]
    fn parse_cli_args_accepts_serve_with_overrides() {
        let args = CliArgs::try_parse_from([
            "helpdesk",
            "-c",
            "custom.toml",
            "--profile",
            "prod",
            "--bind",
            "0.0.0.0:8080",
            "serve",
        ])
        .expect("serve args should parse");
        assert_eq!(args.command, CliCommand::Serve);
        assert_eq!(args.config_path, Some(PathBuf::from("custom.toml")));
        assert_eq!(args.profile.as_deref(), Some("prod"));
        assert_eq!(args.bind_address.as_deref(), Some("0.0.0.0:8080"));
    }

    #[test]
    fn parse_cli_args_accepts_faq_import() {
        let args = CliArgs::try_parse_from(["helpdesk", "faq", "import", "faqs.json"])
            .expect("faq import should parse");
        assert_eq!(
            args.command,
            CliCommand::Faq {
                action: FaqAction::Import {
                    file: PathBuf::from("faqs.json")
                }
            }
        );
    }

    #[test]
    fn parse_cli_args_accepts_faq_search() {
        let args = CliArgs::try_parse_from(["helpdesk", "faq", "search", "business hours"])
            .expect("faq search should parse");
        assert_eq!(
            args.command,
            CliCommand::Faq {
                action: FaqAction::Search {
                    query: "business hours".to_owned()
                }
            }
        );
    }

    #[test]
    fn parse_cli_args_rejects_missing_flag_value() {
        assert!(
            CliArgs::try_parse_from(["helpdesk", "serve", "--config"]).is_err(),
            "missing value should fail clap parsing"
        );
    }
}
