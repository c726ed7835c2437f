//! taskview - follow tasks on the task service from the terminal

mod commands;
mod config;
mod line;
mod ui;
mod utils;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskview_api::TaskClient;
use taskview_core::Session;

/// taskview - submit tasks and watch them run
#[derive(Parser, Debug)]
#[command(name = "taskview")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task service base URL (default: $TASKVIEW_SERVER, then the config file)
    #[arg(long)]
    server: Option<String>,

    /// Submit a single prompt and follow the task to the end
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Upload files before submitting the prompt given with --command
    #[arg(long, num_args = 1.., requires = "command")]
    attach: Vec<PathBuf>,

    /// Show a task by ID, following it if it is still running
    #[arg(long, conflicts_with = "command")]
    load: Option<String>,

    /// List recent tasks
    #[arg(long)]
    history: bool,

    /// Delete all tasks
    #[arg(long)]
    clear_history: bool,

    /// Don't ask before clearing history
    #[arg(long, requires = "clear_history")]
    yes: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Use and remember the dark theme
    #[arg(long, conflicts_with = "light")]
    dark: bool,

    /// Use and remember the light theme
    #[arg(long)]
    light: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Theme requested on the command line, if any
    fn dark_mode(&self) -> Option<bool> {
        match (self.dark, self.light) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("taskview=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file
    let mut cfg = config::Config::load();

    if let Some(dark) = args.dark_mode() {
        if let Err(e) = config::Config::persist_dark_mode(dark) {
            eprintln!("Warning: Failed to save theme: {}", e);
        }
        cfg.dark_mode = Some(dark);
    }

    let server = cfg.server_url(args.server.clone());
    tracing::debug!(server = %server, "using task service");

    let client = TaskClient::new(server);
    let (mut session, mut rx) = Session::new(Arc::new(client), cfg.subscription.to_config());

    if args.clear_history {
        return line::clear_history(&mut session, args.yes).await;
    }

    if args.history {
        return line::print_history(&mut session).await;
    }

    if let Some(ref task_id) = args.load {
        return line::run_load(&mut session, &mut rx, task_id).await;
    }

    if let Some(ref prompt) = args.command {
        return line::run_command(&mut session, &mut rx, prompt, &args.attach).await;
    }

    let use_tui = !args.no_tui && cfg.tui.unwrap_or(true);
    if use_tui {
        ui::run_tui(session, rx, &cfg).await
    } else {
        line::run_interactive(&mut session, &mut rx, &cfg).await
    }
}
