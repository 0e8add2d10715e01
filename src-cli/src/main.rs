//! meetgraph Command-Line Interface
//!
//! Builds knowledge graphs from meeting recordings and text files, and
//! queries them. Indexing, querying and transcription run as Python child
//! processes; this binary manages projects and drives those tools.

mod colors;
mod commands;
mod exit_codes;

use clap::{Args, Parser, Subcommand};
use exit_codes::ExitCode;
use meetgraph_core::search::{DEFAULT_COMMUNITY_LEVEL, DEFAULT_RESPONSE_TYPE};
use meetgraph_core::InferenceOverrides;
use meetgraph_types::logging::{self, LOG_FILE_PREFIX, LOG_FILE_SUFFIX};
use meetgraph_types::InferenceMode;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// meetgraph - Meeting Knowledge Graph CLI
#[derive(Parser, Debug)]
#[command(name = "meetgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data root holding the default project and history/ (overrides config)
    #[arg(long, global = true, env = "MEETGRAPH_ROOT")]
    root: Option<PathBuf>,

    /// Application config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MEETGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new named project
    Init {
        /// Project name (letters, digits, '_' and '-')
        #[arg(long)]
        name: String,
    },
    /// Build or update a project's knowledge graph
    Build(BuildArgs),
    /// Ask a question of a built project
    Search(SearchArgs),
    /// List named projects
    List,
    /// Delete a named project and all of its files
    Delete {
        /// Project name
        #[arg(long)]
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Copy an existing project directory into the history root
    Import {
        /// Directory to import; its base name becomes the project name
        #[arg(long)]
        path: PathBuf,

        /// Replace a project of the same name
        #[arg(long)]
        force: bool,
    },
    /// Remove the lock marker left by an interrupted build
    Unlock {
        /// Project name (the default project when omitted)
        #[arg(long)]
        name: Option<String>,
    },
    /// Build from the newest recording in a project's meeting_data/
    Meeting(MeetingArgs),
    /// Inspect log files
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
    /// Manage saved model names
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
enum LogsCommand {
    /// List log files, newest first
    List,
    /// Print a log file
    Show {
        /// Log file name (see 'meetgraph logs list')
        file: String,

        /// Only print the last N lines
        #[arg(long)]
        tail: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
enum ModelsCommand {
    /// List default and saved models
    List,
    /// Save a model name for later use
    Add {
        /// Which model list to add to
        #[arg(long, value_parser = ["local", "cloud"])]
        mode: String,

        /// Model name
        #[arg(long)]
        name: String,

        /// API base URL for a cloud model
        #[arg(long)]
        api_base: Option<String>,

        /// API key for a cloud model (stored in the config file)
        #[arg(long)]
        api_key: Option<String>,
    },
}

/// Model and endpoint overrides shared by build, search and meeting.
#[derive(Args, Debug, Clone, Default)]
pub struct InferenceArgs {
    /// Where the chat model runs
    #[arg(long, value_parser = ["local", "cloud"])]
    pub inference_mode: Option<String>,

    /// Cloud API base URL
    #[arg(long)]
    pub cloud_api_base: Option<String>,

    /// Cloud API key (never written to settings.yaml)
    #[arg(long, env = "GRAPHRAG_API_KEY", hide_env_values = true)]
    pub cloud_api_key: Option<String>,

    /// Cloud chat model
    #[arg(long)]
    pub cloud_model: Option<String>,

    /// Local (OpenAI-compatible) API base URL
    #[arg(long)]
    pub local_api_base: Option<String>,

    /// Local chat model
    #[arg(long)]
    pub local_model: Option<String>,

    /// Embedding model
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Embedding API base URL
    #[arg(long)]
    pub embedding_api_base: Option<String>,
}

impl InferenceArgs {
    pub fn overrides(&self) -> InferenceOverrides {
        InferenceOverrides {
            mode: self.inference_mode.as_deref().and_then(InferenceMode::parse),
            local_api_base: self.local_api_base.clone(),
            local_model: self.local_model.clone(),
            cloud_api_base: self.cloud_api_base.clone(),
            cloud_model: self.cloud_model.clone(),
            cloud_api_key: self.cloud_api_key.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_api_base: self.embedding_api_base.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Project name (the default project when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Meeting dialogue recording to transcribe
    #[arg(long)]
    pub dialogue: Option<PathBuf>,

    /// Speaker names, paired with --speaker-paths by position
    #[arg(long, num_args = 1..)]
    pub speaker_names: Vec<String>,

    /// Speaker voice samples
    #[arg(long, num_args = 1..)]
    pub speaker_paths: Vec<String>,

    /// Text files to index directly
    #[arg(long, num_args = 1..)]
    pub text_files: Vec<PathBuf>,

    #[command(flatten)]
    pub inference: InferenceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// The question to ask
    #[arg(short, long)]
    pub query: String,

    /// Project name (the default project when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Search method
    #[arg(long, default_value = "local", value_parser = ["local", "global"])]
    pub method: String,

    /// Community level in the graph hierarchy
    #[arg(long, default_value_t = DEFAULT_COMMUNITY_LEVEL)]
    pub level: u32,

    /// Free-form description of the desired answer shape
    #[arg(long = "response_type", default_value = DEFAULT_RESPONSE_TYPE)]
    pub response_type: String,

    /// Ask for the answer in a specific language
    #[arg(long, value_parser = ["english", "chinese", "en", "zh"])]
    pub answer_language: Option<String>,

    #[command(flatten)]
    pub inference: InferenceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MeetingArgs {
    /// Project whose meeting_data/ holds the recordings
    #[arg(long)]
    pub name: String,

    /// Speaker name for the voice sample
    #[arg(long)]
    pub speaker_name: String,

    /// Speaker voice sample
    #[arg(long)]
    pub speaker_path: PathBuf,

    /// Rebuild every N minutes until interrupted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    #[command(flatten)]
    pub inference: InferenceArgs,
}

/// Install stderr and daily-file log layers.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(verbose: bool, quiet: bool) -> Option<WorkerGuard> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    let stderr_level = match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "warn",
    };
    let file_level = if verbose { "debug" } else { "info" };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter(stderr_level));

    let appender = logging::ensure_log_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(LOG_FILE_SUFFIX)
            .build(dir)
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter(file_level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() {
    let cli = Cli::parse();
    let log_guard = init_logging(cli.verbose, cli.quiet);

    let exit_code = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run(cli)),
        Err(e) => {
            eprintln!(
                "{}",
                colors::error(&format!("Failed to create async runtime: {e}"))
            );
            ExitCode::GeneralError
        }
    };

    // process::exit skips destructors; flush the log file first.
    drop(log_guard);
    std::process::exit(exit_code.as_i32());
}

async fn run(cli: Cli) -> ExitCode {
    let ctx = commands::Context::load(cli.json, cli.quiet, cli.config, cli.root);
    match cli.command {
        Commands::Init { name } => commands::init(&ctx, &name),
        Commands::Build(args) => commands::build(&ctx, args).await,
        Commands::Search(args) => commands::search(&ctx, args).await,
        Commands::List => commands::list(&ctx),
        Commands::Delete { name, yes } => commands::delete(&ctx, &name, yes),
        Commands::Import { path, force } => commands::import(&ctx, &path, force),
        Commands::Unlock { name } => commands::unlock(&ctx, name.as_deref()),
        Commands::Meeting(args) => commands::meeting(&ctx, args).await,
        Commands::Logs { command } => match command {
            LogsCommand::List => commands::logs_list(&ctx),
            LogsCommand::Show { file, tail } => commands::logs_show(&ctx, &file, tail),
        },
        Commands::Models { command } => match command {
            ModelsCommand::List => commands::models_list(&ctx),
            ModelsCommand::Add {
                mode,
                name,
                api_base,
                api_key,
            } => commands::models_add(&ctx, &mode, &name, api_base, api_key),
        },
        Commands::Version => {
            commands::version(cli.json);
            ExitCode::Success
        }
    }
}
