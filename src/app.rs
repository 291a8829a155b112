use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use docshell::dialog::Dialogs;
use docshell::model::buffer::Buffer;
use docshell::model::config::AppConfig;
use docshell::model::document::{absolute_path, window_title};
use docshell::model::{DocumentId, Geometry};
use docshell::provider::bridge::Reply;
use docshell::provider::renderer::{SharedBuffer, lock, spawn_renderer};
use docshell::provider::{Bridge, WindowChannel};
use docshell::reconcile::{
    CloseOutcome, FlowError, MergeOutcome, OpenOutcome, Reconciler, SaveMode, WatchEvent,
};
use docshell::session::recent_paths;
use docshell::store::PersistentStore;

use crate::msg::{Command, HELP, Msg};

pub struct App<S, D, W> {
    core: Reconciler<S, D>,
    bridge: Bridge,
    replies: mpsc::UnboundedSender<Reply>,
    windows: BTreeMap<DocumentId, SharedBuffer>,
    focused: Option<DocumentId>,
    config: AppConfig,
    out: W,
    pub should_quit: bool,
}

impl<S: PersistentStore, D: Dialogs, W: Write> App<S, D, W> {
    pub fn new(core: Reconciler<S, D>, config: AppConfig, out: W) -> Self {
        let bridge = Bridge::new();
        let (replies, reply_rx) = mpsc::unbounded_channel();
        bridge.spawn_router(reply_rx);
        Self {
            core,
            bridge,
            replies,
            windows: BTreeMap::new(),
            focused: None,
            config,
            out,
            should_quit: false,
        }
    }

    pub fn core(&self) -> &Reconciler<S, D> {
        &self.core
    }

    /// Reopen the previous session's windows, or a blank one.
    pub async fn start(&mut self) -> Result<()> {
        let restored = if self.config.session.restore_on_launch {
            self.core.restore_session().await
        } else {
            Vec::new()
        };

        if restored.is_empty() {
            let geometry = self.default_geometry();
            self.create_window(None, String::new(), None, geometry).await;
        } else {
            tracing::info!("restoring {} windows", restored.len());
            for doc in restored {
                let path = doc.entry.file_path.clone().filter(|_| doc.entry.has_real_path());
                let geometry = doc.entry.geometry();
                self.create_window(path, doc.content, doc.entry.guid, geometry)
                    .await;
            }
        }
        self.print_windows()
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub async fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Line(line) => {
                if line.trim().is_empty() {
                    return Ok(());
                }
                match Command::parse(&line) {
                    Ok(cmd) => self.handle_command(cmd).await?,
                    Err(err) => writeln!(self.out, "{err} (try `help`)")?,
                }
            }
            Msg::InputClosed => {
                if !self.quit().await? {
                    tracing::warn!("input closed with windows still open");
                }
                self.should_quit = true;
            }
            Msg::FileChanged(event) => self.handle_file_changed(event).await?,
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::New => {
                let geometry = self.next_geometry();
                let id = self.create_window(None, String::new(), None, geometry).await;
                writeln!(self.out, "window {id}: {}", self.title(id))?;
            }
            Command::Open(path) => self.open(path).await?,
            Command::List => self.print_windows()?,
            Command::Focus(id) => {
                if self.windows.contains_key(&id) {
                    self.focused = Some(id);
                } else {
                    writeln!(self.out, "no window {id}")?;
                }
            }
            Command::Type(text) => {
                if let Some(buffer) = self.focused_buffer() {
                    lock(&buffer).insert_text(&format!("{text}\n"));
                }
            }
            Command::Set(text) => {
                if let Some(buffer) = self.focused_buffer() {
                    lock(&buffer).replace(&text);
                }
            }
            Command::Show => {
                if let Some(buffer) = self.focused_buffer() {
                    let content = lock(&buffer).content.clone();
                    write!(self.out, "{content}")?;
                    if !content.is_empty() && !content.ends_with('\n') {
                        writeln!(self.out)?;
                    }
                }
            }
            Command::Save => self.save(SaveMode::Save).await?,
            Command::SaveAs => self.save(SaveMode::SaveAs).await?,
            Command::Close(id) => {
                if let Some(id) = id.or(self.focused) {
                    self.close(id).await?;
                }
            }
            Command::Move(x, y) => {
                if let Some(geometry) = self.focused_geometry() {
                    self.set_geometry(Geometry { x, y, ..geometry }).await;
                }
            }
            Command::Resize(width, height) => {
                if let Some(geometry) = self.focused_geometry() {
                    self.set_geometry(Geometry {
                        width,
                        height,
                        ..geometry
                    })
                    .await;
                }
            }
            Command::Recent => match self.core.session().load_recent_docs().await {
                Ok(recent) => {
                    for (idx, path) in recent_paths(&recent).iter().enumerate() {
                        writeln!(self.out, "{:>3}  {}", idx + 1, path.display())?;
                    }
                }
                Err(err) => writeln!(self.out, "can't read recent documents: {err}")?,
            },
            Command::ClearRecent => {
                if let Err(err) = self.core.session().clear_recent_docs().await {
                    tracing::warn!("failed to clear recent docs: {err}");
                }
            }
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => {
                if self.quit().await? {
                    self.should_quit = true;
                } else {
                    writeln!(self.out, "quit cancelled")?;
                }
            }
        }
        Ok(())
    }

    // ── Windows ─────────────────────────────────────────────────

    async fn create_window(
        &mut self,
        path: Option<PathBuf>,
        content: String,
        guid: Option<Uuid>,
        geometry: Geometry,
    ) -> DocumentId {
        let doc = self
            .core
            .register_document(path.clone(), guid, geometry)
            .await;
        let buffer = match path {
            Some(path) => Buffer::from_file(path, content),
            None => {
                let mut buffer = Buffer::new(self.core.registry_mut().next_untitled_title());
                buffer.load(content);
                buffer
            }
        };

        let buffer: SharedBuffer = Arc::new(Mutex::new(buffer));
        let requests = spawn_renderer(buffer.clone(), self.replies.clone());
        self.bridge.connect(doc.id, requests);
        self.windows.insert(doc.id, buffer);
        self.focused = Some(doc.id);
        doc.id
    }

    /// Drop windows the registry no longer knows about.
    fn sync_windows(&mut self) {
        let gone: Vec<DocumentId> = self
            .windows
            .keys()
            .copied()
            .filter(|id| self.core.registry().get(*id).is_none())
            .collect();
        for id in gone {
            self.bridge.disconnect(id);
            self.windows.remove(&id);
        }
        if self.focused.is_none_or(|id| !self.windows.contains_key(&id)) {
            self.focused = self.windows.keys().next_back().copied();
        }
    }

    fn channel(&self, id: DocumentId) -> Option<WindowChannel> {
        self.bridge.channel(id)
    }

    fn focused_buffer(&mut self) -> Option<SharedBuffer> {
        let buffer = self.focused.and_then(|id| self.windows.get(&id).cloned());
        if buffer.is_none() {
            let _ = writeln!(self.out, "no focused window");
        }
        buffer
    }

    fn focused_geometry(&self) -> Option<Geometry> {
        let id = self.focused?;
        self.core.registry().get(id).map(|doc| doc.geometry)
    }

    async fn set_geometry(&mut self, geometry: Geometry) {
        if let Some(id) = self.focused {
            self.core.update_geometry(id, geometry).await;
        }
    }

    fn default_geometry(&self) -> Geometry {
        Geometry {
            width: self.config.window.default_width,
            height: self.config.window.default_height,
            ..Geometry::default()
        }
    }

    /// Cascade from the focused window.
    fn next_geometry(&self) -> Geometry {
        match self.focused_geometry() {
            Some(geometry) => geometry.cascaded(self.config.window.cascade_offset),
            None => self.default_geometry(),
        }
    }

    fn title(&self, id: DocumentId) -> String {
        self.windows
            .get(&id)
            .map(|buffer| lock(buffer).title.clone())
            .unwrap_or_default()
    }

    fn print_windows(&mut self) -> Result<()> {
        for (id, buffer) in &self.windows {
            let buf = lock(buffer);
            let marker = if Some(*id) == self.focused { '*' } else { ' ' };
            let dirty = if buf.dirty { " [edited]" } else { "" };
            let path = buf
                .path
                .as_ref()
                .map(|p| format!("  {}", p.display()))
                .unwrap_or_default();
            writeln!(
                self.out,
                "{marker}{id:>3}  {}{dirty} ({} lines){path}",
                buf.title,
                buf.line_count()
            )?;
        }
        Ok(())
    }

    // ── Flows ───────────────────────────────────────────────────

    async fn open(&mut self, path: Option<PathBuf>) -> Result<()> {
        // Match the paths notify reports.
        let path = path.map(absolute_path);
        let focused = self.focused.and_then(|id| self.channel(id));
        let outcome = self.core.open_document(path, focused.as_ref()).await;

        match outcome {
            Ok(OpenOutcome::AlreadyOpen(id)) => {
                self.focused = Some(id);
                writeln!(self.out, "already open in window {id}")?;
            }
            Ok(OpenOutcome::Reuse(id)) => {
                self.focused = Some(id);
                writeln!(self.out, "window {id}: {}", self.title(id))?;
            }
            Ok(OpenOutcome::NewWindow { path, content }) => {
                let geometry = self.next_geometry();
                let title = window_title(&path);
                let id = self.create_window(Some(path), content, None, geometry).await;
                writeln!(self.out, "window {id}: {title}")?;
            }
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    async fn save(&mut self, mode: SaveMode) -> Result<()> {
        let Some(window) = self.focused.and_then(|id| self.channel(id)) else {
            writeln!(self.out, "no focused window")?;
            return Ok(());
        };
        match self.core.save_document(&window, mode).await {
            Ok(path) => writeln!(self.out, "saved {}", path.display())?,
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    async fn close(&mut self, id: DocumentId) -> Result<()> {
        let Some(window) = self.channel(id) else {
            writeln!(self.out, "no window {id}")?;
            return Ok(());
        };
        let cancel = CancellationToken::new();
        match self.core.close_document(&window, false, &cancel).await {
            Ok(CloseOutcome::Closed) => {
                self.sync_windows();
                writeln!(self.out, "closed window {id}")?;
                if self.windows.is_empty() {
                    self.should_quit = true;
                }
            }
            Ok(CloseOutcome::Cancelled) => writeln!(self.out, "close cancelled")?,
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    /// Close everything, keeping the session for the next launch.
    async fn quit(&mut self) -> Result<bool> {
        let bridge = self.bridge.clone();
        let closed = self.core.quit_all(|id| bridge.channel(id)).await;
        self.sync_windows();
        Ok(closed)
    }

    async fn handle_file_changed(&mut self, event: WatchEvent) -> Result<()> {
        let Some(id) = self
            .core
            .registry()
            .find_by_path(&event.path)
            .map(|doc| doc.id)
        else {
            return Ok(());
        };
        let Some(window) = self.channel(id) else {
            return Ok(());
        };

        match self
            .core
            .on_file_event(&window, &event.path, event.event)
            .await
        {
            Ok(MergeOutcome::Reloaded) => writeln!(self.out, "window {id} reloaded from disk")?,
            Ok(MergeOutcome::Orphaned) => writeln!(
                self.out,
                "{} was deleted; window {id} kept its content",
                event.path.display()
            )?,
            Ok(outcome) => tracing::debug!("window {id}: {outcome:?}"),
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    fn report(&mut self, err: FlowError) -> Result<()> {
        if err.is_cancelled() {
            writeln!(self.out, "cancelled")?;
        } else {
            tracing::error!("{err}");
            writeln!(self.out, "error: {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshell::dialog::TerminalDialogs;
    use docshell::reconcile::watch::NoopWatcher;
    use docshell::reconcile::{DocumentKind, ScratchDir};
    use docshell::session::SessionStore;
    use docshell::store::MemoryStore;

    type TestApp = App<MemoryStore, TerminalDialogs, Vec<u8>>;

    struct Harness {
        dir: tempfile::TempDir,
        answers: mpsc::UnboundedSender<String>,
        app: TestApp,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = AppConfig::defaults().unwrap();
            config.general.data_dir = dir.path().display().to_string();

            let (answers, answer_rx) = mpsc::unbounded_channel();
            let dialogs = TerminalDialogs::new(Arc::new(tokio::sync::Mutex::new(answer_rx)));
            let core = Reconciler::new(
                SessionStore::new(MemoryStore::new(), config.session.max_recent),
                dialogs,
                Box::new(NoopWatcher),
                ScratchDir::new(config.scratch_dir()),
                DocumentKind::new(&config.general.doc_extension, &config.general.doc_filter_name),
            );
            let app = App::new(core, config, Vec::new());
            Self { dir, answers, app }
        }

        async fn run(&mut self, line: &str) {
            self.app.update(Msg::Line(line.to_string())).await.unwrap();
        }

        fn answer(&self, line: &str) {
            self.answers.send(line.to_string()).unwrap();
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.app.out).into_owned()
        }
    }

    #[tokio::test]
    async fn fresh_start_opens_one_untitled_window() {
        let mut h = Harness::new();
        h.app.start().await.unwrap();
        assert_eq!(h.app.windows.len(), 1);
        assert!(h.output().contains("Untitled 1 (0 lines)"));

        h.run("new").await;
        assert_eq!(h.app.focused, Some(DocumentId(2)));
        assert!(h.output().contains("window 2: Untitled 2"));
        let second = h.app.core().registry().get(DocumentId(2)).unwrap().geometry;
        assert_eq!((second.x, second.y), (20, 20));
    }

    #[tokio::test]
    async fn type_save_as_then_close_records_recent() {
        let mut h = Harness::new();
        h.app.start().await.unwrap();
        let target = h.dir.path().join("notes");

        h.run("type hello").await;
        h.answer(&target.display().to_string());
        h.run("save").await;
        let saved = h.dir.path().join("notes.md");
        assert_eq!(std::fs::read_to_string(&saved).unwrap(), "hello\n");
        assert!(!lock(&h.app.windows[&DocumentId(1)]).dirty);

        h.run("close").await;
        assert!(h.app.windows.is_empty());
        assert!(h.app.should_quit);
        let recent = h.app.core().session().load_recent_docs().await.unwrap();
        assert_eq!(recent_paths(&recent), vec![saved]);
    }

    #[tokio::test]
    async fn cancelled_close_keeps_window() {
        let mut h = Harness::new();
        h.app.start().await.unwrap();
        h.run("type draft").await;

        h.answer("Cancel");
        h.run("close").await;
        assert_eq!(h.app.windows.len(), 1);
        assert!(h.output().contains("close cancelled"));
        assert!(!h.app.should_quit);
    }

    #[tokio::test]
    async fn open_reuses_blank_window_and_focuses_duplicates() {
        let mut h = Harness::new();
        h.app.start().await.unwrap();
        let path = h.dir.path().join("a.md");
        std::fs::write(&path, "from disk").unwrap();

        h.run(&format!("open {}", path.display())).await;
        assert_eq!(h.app.windows.len(), 1);
        assert_eq!(lock(&h.app.windows[&DocumentId(1)]).content, "from disk");

        h.run("new").await;
        h.run(&format!("open {}", path.display())).await;
        assert_eq!(h.app.focused, Some(DocumentId(1)));
        assert!(h.output().contains("already open in window 1"));
    }

    #[tokio::test]
    async fn quit_keeps_untitled_work_for_next_launch() {
        let mut h = Harness::new();
        h.app.start().await.unwrap();
        h.run("type unsaved idea").await;
        h.run("move 5 6").await;

        h.run("quit").await;
        assert!(h.app.should_quit);
        let current = h.app.core().session().load_current_docs().await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!((current[0].x, current[0].y), (5, 6));

        let restored = h.app.core().restore_session().await;
        assert_eq!(restored[0].content, "unsaved idea\n");
    }

    #[tokio::test]
    async fn external_change_reloads_clean_window() {
        let mut h = Harness::new();
        h.app.start().await.unwrap();
        let path = h.dir.path().join("a.md");
        std::fs::write(&path, "v1").unwrap();
        h.run(&format!("open {}", path.display())).await;

        std::fs::write(&path, "v2").unwrap();
        h.app
            .update(Msg::FileChanged(WatchEvent {
                path: path.clone(),
                event: docshell::reconcile::FileEvent::Changed,
            }))
            .await
            .unwrap();
        assert_eq!(lock(&h.app.windows[&DocumentId(1)]).content, "v2");
        assert!(h.output().contains("reloaded from disk"));
    }
}
