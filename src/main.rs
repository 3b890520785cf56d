use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::fs::OpenOptions;
use std::io::stdout;
use std::path::PathBuf;

use histnav::app::{App, build_history};
use histnav::config::Config;
use histnav::storage::{FileStorage, Storage};

#[derive(Parser, Debug)]
#[command(name = "histnav")]
#[command(version)]
#[command(about = "Browse a bounded back/forward navigation history in the terminal")]
#[command(
    long_about = "Browse a bounded back/forward navigation history in the terminal.

histnav keeps a capacity-limited list of visited locations. Opening a new
location from the middle of the list discards everything ahead of it, and a
location is never listed twice. The current location is stored under a key
so other sessions using the same key follow along."
)]
#[command(after_long_help = "KEYBINDINGS:
    h/l, Left/Right   Back / forward
    gg, G             Oldest / newest entry
    j/k, Down/Up      Move selection
    Enter             Go to selected entry
    o                 Open a location
    f, /              Fuzzy jump
    s, r              Save / restore the history list
    x                 Clear the current location
    ?                 Show keybindings help
    q, Escape         Quit

EXAMPLES:
    histnav /blog /blog/post-1          Record two locations and browse
    histnav --key preview               Use the 'preview' storage key
    histnav --memory --capacity 3 a b c d

CONFIGURATION:
    Config file: ~/.config/histnav/config.toml
    Set capacity, key, storage_dir, drop_patterns and keybindings.

LOGGING:
    Set HISTNAV_LOG (e.g. debug) to control the log written to the data directory.")]
struct Args {
    /// Locations to open at startup, in order
    #[arg(value_name = "LOCATION")]
    locations: Vec<String>,

    /// Storage key for the current location
    #[arg(long)]
    key: Option<String>,

    /// Maximum number of entries kept
    #[arg(long)]
    capacity: Option<usize>,

    /// Directory holding stored keys
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Keep everything in memory; nothing is read or written
    #[arg(long, conflicts_with_all = ["key", "storage_dir"])]
    memory: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(key) = args.key {
        config.key = key;
    }
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    if let Some(dir) = args.storage_dir {
        config.storage_dir = Some(dir);
    }

    init_logging();

    let storage: Option<Box<dyn Storage>> = if args.memory {
        None
    } else {
        let dir = config.storage_dir();
        let storage = FileStorage::new(&dir)
            .with_context(|| format!("could not open storage directory {}", dir.display()))?;
        Some(Box::new(storage))
    };

    // Fail on bad configuration before touching the terminal
    let history = build_history(&config, storage)?;
    let mut app = App::new(history, &config);
    app.open_all(&args.locations);

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to a file; stderr belongs to the terminal UI.
fn init_logging() {
    let log_dir = Config::data_dir();
    let file = std::fs::create_dir_all(&log_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("histnav.log"))
    });

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::new().filter_or("HISTNAV_LOG", "warn"));
    match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            // No writable data directory: stay quiet rather than draw over the UI
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}
