use backboard::config::Config;
use backboard::ingest::{GitIngestor, Ingest, SnapshotIngestor};
use backboard::registry::{Registry, Shutdown};
use backboard::report::{self, Format};
use backboard::serve::{self, ServeState};
use backboard::{board, refresh, BoardQuery, Snapshot};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "backboard")]
#[command(author, version, about = "Track which trunk changes have been backported to release branches")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: BACKBOARD_CONFIG or .backboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the board over HTTP, refreshing it in the background
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,

        /// Number of request worker threads (overrides server.workers)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Serve a snapshot file instead of ingesting from git and GitHub
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Seconds between refreshes (overrides server.refresh_interval_secs)
        #[arg(long)]
        refresh: Option<u64>,
    },

    /// Ingest every configured repository and write a snapshot file
    Sync {
        /// Snapshot file to write
        #[arg(short, long, default_value = "board.snapshot.json")]
        output: PathBuf,
    },

    /// Print the board for one release branch
    Show {
        /// Release branch (default: server.default_branch, else the newest)
        #[arg(short, long)]
        branch: Option<String>,

        /// Numeric repository id (default: the first tracked repository)
        #[arg(short, long)]
        repo: Option<u64>,

        /// Only commits by this author email
        #[arg(short, long)]
        author: Option<String>,

        /// Only commits whose pull request carries this label
        #[arg(short, long)]
        label: Option<String>,

        /// Read a snapshot file instead of ingesting
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Generate shell completion script
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let result = match cli.command {
        Command::Completion { shell } => {
            generate(shell, &mut Cli::command(), "backboard", &mut io::stdout());
            Ok(())
        }
        Command::Serve {
            bind,
            workers,
            snapshot,
            refresh,
        } => interruptible().and_then(|shutdown| {
            let config = load_config(cli.config.as_deref())?;
            run_serve(config, bind, workers, snapshot, refresh, shutdown)
        }),
        Command::Sync { output } => interruptible().and_then(|shutdown| {
            let config = load_config(cli.config.as_deref())?;
            run_sync(config, &output, &shutdown)
        }),
        Command::Show {
            branch,
            repo,
            author,
            label,
            snapshot,
            format,
        } => interruptible().and_then(|shutdown| {
            let config = load_config(cli.config.as_deref())?;
            let query = BoardQuery {
                repo,
                branch,
                author,
                label,
            };
            run_show(config, query, snapshot, format, &shutdown)
        }),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "backboard=debug,info"
        } else {
            "backboard=info,warn"
        })
    });

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        LogFormat::Compact => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

/// A shutdown token fired by Ctrl+C or SIGTERM. A second signal exits at once.
fn interruptible() -> Result<Arc<Shutdown>, Box<dyn Error>> {
    let shutdown = Arc::new(Shutdown::new());
    let handler = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        if handler.is_triggered() {
            std::process::exit(130);
        }
        info!("interrupted, shutting down");
        handler.trigger();
    })?;
    Ok(shutdown)
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn ingestor(config: &Config, snapshot: Option<PathBuf>) -> Arc<dyn Ingest> {
    match snapshot {
        Some(path) => Arc::new(SnapshotIngestor::new(path)),
        None => Arc::new(GitIngestor::from_env(config.repos.clone())),
    }
}

fn run_serve(
    config: Config,
    bind: Option<String>,
    workers: Option<usize>,
    snapshot: Option<PathBuf>,
    refresh_secs: Option<u64>,
    shutdown: Arc<Shutdown>,
) -> CliResult {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let workers = workers.unwrap_or(config.server.workers);
    let interval = Duration::from_secs(refresh_secs.unwrap_or(config.server.refresh_interval_secs).max(1));
    let ingest = ingestor(&config, snapshot);

    let registry = Arc::new(Registry::new());
    info!(source = %ingest.describe(), interval_secs = interval.as_secs(), "starting refresh loop");
    let refresher = refresh::spawn(Arc::clone(&registry), ingest, interval, Arc::clone(&shutdown))?;

    let state = ServeState {
        registry,
        default_branch: config.server.default_branch.clone(),
    };
    let served = serve::run(state, &bind, workers, Arc::clone(&shutdown));

    shutdown.trigger();
    if refresher.join().is_err() {
        tracing::warn!("refresh thread panicked");
    }
    served?;
    Ok(())
}

fn run_sync(config: Config, output: &Path, shutdown: &Shutdown) -> CliResult {
    let ingest = GitIngestor::from_env(config.repos);
    let repos = ingest.ingest(shutdown)?;

    let snapshot = Snapshot::new(repos);
    snapshot.save(output)?;

    eprintln!("{} {}", "Snapshot saved:".green(), output.display());
    for repo in &snapshot.repos {
        eprintln!(
            "  {} ({} trunk commits, {} release branches, {} pull requests)",
            repo.full_name().bold(),
            repo.trunk_commits.len(),
            repo.release_branches.len(),
            repo.pulls.len()
        );
    }
    Ok(())
}

fn run_show(
    config: Config,
    query: BoardQuery,
    snapshot: Option<PathBuf>,
    format: Format,
    shutdown: &Shutdown,
) -> CliResult {
    let repos = ingestor(&config, snapshot).ingest(shutdown)?;
    let view = board::build(&repos, &query, config.server.default_branch.as_deref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::write(&mut out, &view, format)?;
    Ok(())
}
