mod app;
mod msg;

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tokio::sync::{Mutex, mpsc};

use docshell::dialog::TerminalDialogs;
use docshell::model::config::AppConfig;
use docshell::reconcile::watch::{NoopWatcher, NotifyWatcher};
use docshell::reconcile::{DocumentKind, PathWatcher, Reconciler, ScratchDir, WatchEvent};
use docshell::session::SessionStore;
use docshell::store::JsonFileStore;

use app::App;
use msg::Msg;

fn main() -> Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging to file (never stdout)
    let log_dir = config.data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "docshell.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("docshell=info")
        .init();

    tracing::info!("docshell starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config));

    if let Err(e) = &result {
        tracing::error!("docshell error: {e:?}");
        eprintln!("docshell error: {e:?}");
    }
    tracing::info!("docshell exiting");
    result
}

async fn run(config: AppConfig) -> Result<()> {
    // Input thread: the only stdin reader. Shell commands and dialog answers
    // share this line stream.
    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });
    let input = Arc::new(Mutex::new(line_rx));

    let (watch_tx, mut watch_rx) = mpsc::unbounded_channel::<WatchEvent>();
    let watcher: Box<dyn PathWatcher> = if config.watch.enabled {
        match NotifyWatcher::new(watch_tx) {
            Ok(watcher) => Box::new(watcher),
            Err(err) => {
                tracing::warn!("failed to initialize file watcher: {err}");
                Box::new(NoopWatcher)
            }
        }
    } else {
        Box::new(NoopWatcher)
    };

    let session = SessionStore::new(
        JsonFileStore::new(config.preferences_path()),
        config.session.max_recent,
    );
    spawn_recent_listener(session.subscribe_recent());

    let core = Reconciler::new(
        session,
        TerminalDialogs::new(input.clone()),
        watcher,
        ScratchDir::new(config.scratch_dir()),
        DocumentKind::new(&config.general.doc_extension, &config.general.doc_filter_name),
    );
    let mut app = App::new(core, config, io::stdout());
    app.start().await?;

    // ── Main event loop ──
    while !app.should_quit {
        let msg = tokio::select! {
            line = async { input.lock().await.recv().await } => match line {
                Some(line) => Msg::Line(line),
                None => Msg::InputClosed,
            },
            Some(event) = watch_rx.recv() => Msg::FileChanged(event),
        };
        app.update(msg).await?;
    }

    tracing::info!(
        "{} windows left open at exit",
        app.core().registry().len()
    );
    Ok(())
}

/// Stand-in for the native "Open Recent" menu: log every refresh.
fn spawn_recent_listener(
    mut recent: tokio::sync::watch::Receiver<Vec<docshell::model::RecentDocEntry>>,
) {
    tokio::spawn(async move {
        while recent.changed().await.is_ok() {
            let count = recent.borrow_and_update().len();
            tracing::debug!("recent documents menu refreshed ({count} entries)");
        }
    });
}
