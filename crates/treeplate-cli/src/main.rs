// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use treeplate_cli::{commands, config::Overrides};

#[derive(Parser)]
#[command(name = "treeplate")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Serve a directory tree of HTML templates", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Content type of rendered responses (e.g. application/xhtml+xml)
    #[arg(long, global = true)]
    content_type: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TemplateArgs {
    /// Template root directory
    #[arg(short, long)]
    root: Option<PathBuf>,
    /// Filename suffix of template files
    #[arg(short, long)]
    suffix: Option<String>,
}

#[derive(Args)]
struct ServerArgs {
    #[command(flatten)]
    templates: TemplateArgs,
    /// Port to run the server on
    #[arg(short, long)]
    port: Option<u16>,
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start development server, reloading templates on change
    Dev(ServerArgs),
    /// Serve templates compiled once at startup
    Serve(ServerArgs),
    /// Compile all templates and list their names
    Check(TemplateArgs),
}

impl TemplateArgs {
    fn overrides(self, content_type: Option<String>) -> Overrides {
        Overrides {
            root_dir: self.root,
            suffix: self.suffix,
            content_type,
            ..Overrides::default()
        }
    }
}

impl ServerArgs {
    fn overrides(self, content_type: Option<String>) -> Overrides {
        Overrides {
            host: self.host,
            port: self.port,
            ..self.templates.overrides(content_type)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Dev(args) => commands::dev::run(args.overrides(cli.content_type)).await,
        Commands::Serve(args) => commands::serve::run(args.overrides(cli.content_type)).await,
        Commands::Check(args) => commands::check::run(args.overrides(cli.content_type)),
    }
}
