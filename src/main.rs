mod annotation;
mod app;
mod ask;
mod bottom_bar;
mod config;
mod document;
mod event;
mod logging;
mod note;
mod overlay;
mod theme;
mod ui;

use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::{
    event::{DisableMouseCapture, EnableBracketedPaste, DisableBracketedPaste, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};

use app::App;
use config::Config;
use document::Document;
use note::ProxyClient;
use theme::Theme;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("lectern {}", VERSION);
    println!("A terminal reading companion with AI notes pinned to what you highlight");
    println!();
    println!("USAGE:");
    println!("    lectern [OPTIONS] [FILE]");
    println!();
    println!("ARGS:");
    println!("    FILE             Lesson to open (plain text or markdown)");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
    println!("    -c, --config     Print config file path");
    println!("    -l, --log        Print log file path");
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut document_arg: Option<PathBuf> = None;
    if let Some(arg) = args.get(1) {
        match arg.as_str() {
            "-v" | "--version" => {
                println!("lectern {}", VERSION);
                return Ok(());
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-c" | "--config" => {
                println!("{}", Config::config_path().display());
                return Ok(());
            }
            "-l" | "--log" => {
                println!("{}", Config::log_path().display());
                return Ok(());
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {}", other);
                eprintln!("Run 'lectern --help' for usage information");
                return Ok(());
            }
            path => document_arg = Some(PathBuf::from(path)),
        }
    }

    let (config, config_error) = match Config::load_or_create() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    if let Err(err) = logging::init(&Config::log_path(), &config.log_level) {
        eprintln!("Logging disabled: {err}");
    }
    if let Some(err) = config_error {
        warn!(error = %err, "using default config");
    }
    info!(version = VERSION, "lectern starting");

    let removal_delay = config.removal_delay();
    let document = match document_arg.or_else(|| config.document_path()) {
        Some(path) => match Document::load(&path, removal_delay) {
            Ok(document) => document,
            Err(err) => {
                eprintln!("Cannot open {}: {err}", path.display());
                return Ok(());
            }
        },
        None => Document::sample(removal_delay),
    };

    let client = Arc::new(ProxyClient::new(config.endpoint.clone(), config.request_timeout()));
    let theme = Theme::from_name(&config.theme, &Config::themes_dir());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config, theme, document, client);

    let result = event::run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        error!(error = %err, "event loop failed");
        eprintln!("Error: {err:?}");
    }
    info!("lectern exiting");

    Ok(())
}
