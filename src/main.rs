use anyhow::Result;

mod app;
mod gemini;
mod handler;
mod session;
mod store;
mod tui;
mod ui;

use app::App;
use gemini::GeminiClient;
use store::Store;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let store = Store::new()?;
    let mut app = App::new(store, GeminiClient::new());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut app, &mut terminal, &mut events).await;
    tui::restore()?;
    result
}

async fn run(app: &mut App, terminal: &mut Tui, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }

        poll_pending_reply(app).await;
    }
    Ok(())
}

/// Pick up a finished reply task. The tick event guarantees the loop comes
/// back here within 250ms of completion.
async fn poll_pending_reply(app: &mut App) {
    let finished = app
        .pending_reply
        .as_ref()
        .map(|task| task.is_finished())
        .unwrap_or(false);
    if !finished {
        return;
    }
    if let Some(task) = app.pending_reply.take() {
        let result = match task.await {
            Ok(result) => result,
            Err(err) => Err(anyhow::anyhow!("reply task failed: {err}")),
        };
        app.finish_send(result);
    }
}

// File-based logging, enabled by RUST_LOG; the terminal owns stdout/stderr
// while the alternate screen is up.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let Some(config_dir) = dirs::config_dir() else {
        return;
    };
    let log_dir = config_dir.join("gemchat");
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(log_dir.join("gemchat.log")) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
