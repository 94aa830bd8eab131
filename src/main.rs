// main.rs

mod app;
mod config;
mod error;
mod id;
mod link;
mod logging;
mod mediator;
mod storage;
mod task;
mod theme;
mod tui;

use crate::app::App;
use crate::config::Config;
use crate::mediator::Mediator;
use crate::storage::JsonFileStore;
use anyhow::Context;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    logging::init_tracing(&cfg.log_file, &cfg.log_level)?;
    info!(data = %cfg.data_file.display(), "starting RustyTab");

    let store = JsonFileStore::open(&cfg.data_file)
        .with_context(|| format!("failed to open {}", cfg.data_file.display()))?;
    let mediator = Mediator::spawn(store).context("failed to start background mediator")?;

    // Mount before touching the terminal so load errors print normally.
    let mut app = App::mount(mediator.handle())
        .context("failed to load dashboard data")?
        .with_favicon_size(cfg.favicon_size);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = tui::run_app(&mut terminal, &mut app);

    // Restore terminal state
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    drop(app);
    mediator.shutdown();

    if let Err(err) = res {
        error!(error = %err, "dashboard loop failed");
        eprintln!("Application error: {}", err);
    }
    info!("bye");
    Ok(())
}
