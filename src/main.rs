use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use datatex::api;
use datatex_core::config::default_database_path;
use datatex_core::models::CreateFileInput;
use datatex_core::{Compiler, CompilerConfig, Database};

#[derive(Parser)]
#[command(name = "datatex")]
#[command(about = "LaTeX document store and compile service")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Database file (defaults to the per-user data directory)
    #[arg(long, global = true, env = "DATATEX_DB")]
    db: Option<PathBuf>,

    /// Server options used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct ServeArgs {
    /// Port for HTTP API
    #[arg(short, long, default_value = "3000", env = "DATATEX_PORT")]
    port: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (the default)
    Serve(ServeArgs),
    /// Manage stored files
    #[command(subcommand)]
    Files(FileCommands),
    /// List chapters with their file counts
    Chapters,
    /// Compile a .tex file to PDF
    Compile {
        input: PathBuf,
        /// Where to write the PDF (defaults to the input path with .pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// List all files grouped by chapter
    List,
    /// Show one file with all of its metadata
    Show { id: String },
    /// Create a file
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        chapter: Option<String>,
        /// Read content from this file ("-" for stdin)
        #[arg(long)]
        content: Option<PathBuf>,
    },
    /// Replace a file's content
    Update {
        id: String,
        /// Read content from this file ("-" for stdin)
        #[arg(long)]
        content: PathBuf,
    },
    /// Delete a file
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "datatex=debug,datatex_core=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_database_path);

    match cli.command.unwrap_or(Commands::Serve(cli.serve)) {
        Commands::Serve(args) => serve(&db_path, args.port).await?,
        Commands::Files(cmd) => {
            let db = Database::open(&db_path)
                .with_context(|| format!("opening database {}", db_path.display()))?;
            run_file_command(&db, cmd)?;
            db.close()?;
        }
        Commands::Chapters => {
            let db = Database::open(&db_path)?;
            print_json(&db.list_chapters()?)?;
            db.close()?;
        }
        Commands::Compile { input, output } => compile_file(&input, output).await?,
    }

    Ok(())
}

async fn serve(db_path: &Path, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting DataTeX server on port {}", port);

    let db = Database::initialize(db_path);
    if !db.is_ready() {
        tracing::warn!("Store unavailable, file endpoints will return 503");
    }

    let config = CompilerConfig::from_env();
    tracing::debug!("Compiler config: {:?}", config);
    let compiler = Compiler::new(config);
    if !compiler.health_check().await {
        tracing::warn!(
            "Engine '{}' not found, compiles will fail",
            compiler.config().engine
        );
    }

    let app = api::create_router(db.clone(), compiler);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("DataTeX server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

fn run_file_command(db: &Database, cmd: FileCommands) -> anyhow::Result<()> {
    match cmd {
        FileCommands::List => print_json(&db.list_files()?)?,
        FileCommands::Show { id } => print_json(&db.get_file(&id)?)?,
        FileCommands::Create {
            title,
            chapter,
            content,
        } => {
            let content = match content {
                Some(path) => read_content(&path)?,
                None => String::new(),
            };
            let entry = db.create_file(CreateFileInput {
                title,
                content,
                file_type: None,
                chapter,
            })?;
            print_json(&entry)?;
        }
        FileCommands::Update { id, content } => {
            let content = read_content(&content)?;
            if !db.update_file_content(&id, &content)? {
                anyhow::bail!("no file with id {}", id);
            }
        }
        FileCommands::Delete { id } => {
            if !db.delete_file(&id)? {
                anyhow::bail!("no file with id {}", id);
            }
        }
    }
    Ok(())
}

async fn compile_file(input: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let source = read_content(input)?;
    let compiler = Compiler::new(CompilerConfig::from_env());

    match compiler.compile(&source).await {
        Ok(doc) => {
            let output = output.unwrap_or_else(|| input.with_extension("pdf"));
            std::fs::write(&output, &doc.pdf)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{}", output.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.logs);
            if let Some(dir) = &err.work_dir {
                eprintln!("Working directory kept at {}", dir.display());
            }
            Err(err.into())
        }
    }
}

fn read_content(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
