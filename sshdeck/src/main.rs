//! `SSHDeck` - terminal UI for managing and launching SSH connections
//!
//! Loads settings, starts file logging, optionally moves itself into a new
//! tmux session so connections can open in tmux windows, then runs the
//! event loop until the user quits.

mod app;
mod error;
mod input;
mod multiplexer;
mod tui;
mod ui;

use sshdeck_core::config::ConfigManager;
use sshdeck_core::logging::{TracingConfig, init_tracing};

use crate::app::App;
use crate::error::AppError;
use crate::tui::Tui;

fn main() {
    if let Err(e) = run() {
        tracing::error!(error = %e, "Fatal error");
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let config = ConfigManager::new()?;
    config.ensure_dirs()?;
    let settings = config.load_settings()?;

    let tracing_config = TracingConfig::for_tui(&settings.logging.level, &config.default_log_path());
    if let Err(e) = init_tracing(&tracing_config) {
        eprintln!("Warning: logging disabled: {e}");
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting SSHDeck");

    if settings.launch.auto_tmux {
        multiplexer::reexec_in_tmux()?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    let _runtime = runtime.enter();

    let mut app = App::new(config, settings);
    let mut tui = Tui::enter().map_err(AppError::Terminal)?;
    let result = app.run(&mut tui);
    drop(tui);
    runtime.shutdown_background();
    result
}
