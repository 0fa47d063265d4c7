mod app;
mod capture;
mod config;
mod console;
mod event;
mod hotkey;
mod paths;
mod reveal;
mod session;
mod status;

use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::app::{App, Flow};
use crate::capture::XcapDisplays;
use crate::console::Notice;
use crate::event::AppEvent;
use crate::hotkey::GlobalHook;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ── Settings ──────────────────────────────────────────────────────────────
    // Running without a config directory is fine: defaults, no status file.
    let app_dir = match paths::app_data_dir() {
        Ok(dir) => Some(dir),
        Err(e) => {
            warn!("{e}; using default settings");
            None
        }
    };
    let initial_config = match &app_dir {
        Some(dir) => config::load_or_default(&paths::config_file_path(dir)).unwrap_or_else(|e| {
            error!("{e:#} (using defaults)");
            config::Config::default()
        }),
        None => config::Config::default(),
    };

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    if let Some(dir) = &app_dir {
        tokio::spawn(config::watch_config(
            paths::config_file_path(dir),
            event_tx.clone(),
        ));
    }
    if let Err(e) = console::spawn(event_tx.clone()) {
        error!("Failed to start console input: {e}");
        std::process::exit(1);
    }

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(AppEvent::Shutdown).await;
            }
        });
    }

    let mut app = App::new(
        GlobalHook,
        XcapDisplays,
        &initial_config,
        app_dir.as_deref().map(paths::status_file_path),
        event_tx,
    );

    info!("shotbundle v{} started", env!("CARGO_PKG_VERSION"));
    console::notify(Notice::Banner);
    app.publish();

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        if app.handle(evt) == Flow::Exit {
            break;
        }
    }
}
