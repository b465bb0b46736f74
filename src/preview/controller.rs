//! Preview controller
//!
//! Owns the source text, render options and the last good render, and
//! drives the debounce scheduler and the renderer. All state lives in a
//! single actor task; the shell talks to it through a cloneable
//! [`PreviewHandle`] and receives output through a [`DisplaySurface`].
//!
//! Renders run on tokio's blocking pool. Completed renders are checked
//! against the current revision and sanitize flag before they are
//! cached or shown, so a slow render of old text can never overwrite a
//! newer one.

use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use super::scheduler::{DebounceScheduler, TokioTimer};
use crate::config::{RenderOptions, ZoomChange, ZoomLevel};
use crate::error::{PreviewError, RenderError, RenderOutcome};
use crate::markdown::render::{MarkdownRenderer, RenderBackend, RenderResult};

/// Receiver of rendered output
pub trait DisplaySurface: Send + Sync + 'static {
    /// Show rendered HTML at the given zoom
    fn render_ready(&self, html: &str, zoom: ZoomLevel);

    /// A render failed; the previous output stays on screen
    fn render_failed(&self, error: &RenderError) {
        log::warn!("Preview render failed: {}", error);
    }
}

/// Source text with its revision counter
#[derive(Debug, Clone)]
pub struct SourceText {
    text: Arc<str>,
    revision: u64,
}

impl Default for SourceText {
    fn default() -> Self {
        Self {
            text: Arc::from(""),
            revision: 0,
        }
    }
}

impl SourceText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn replace(&mut self, text: String) -> u64 {
        self.text = Arc::from(text);
        self.revision += 1;
        self.revision
    }
}

/// Identifies one render dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTicket {
    id: u64,
    revision: u64,
    sanitize: bool,
}

impl RenderTicket {
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Everything a worker needs to render, detached from the controller
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub ticket: RenderTicket,
    pub text: Arc<str>,
    pub options: RenderOptions,
}

/// What to do with a finished render
#[derive(Debug, Clone, PartialEq)]
pub enum RenderVerdict {
    /// Cached and ready to display
    Accepted,
    /// Produced for an outdated revision or sanitize setting
    Stale,
    /// The render failed; the cache is untouched
    Failed(RenderError),
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewSnapshot {
    pub revision: u64,
    pub zoom: ZoomLevel,
    pub sanitize: bool,
    /// Number of renders dispatched so far
    pub render_count: u64,
    /// Revision of the cached render, if any
    pub displayed_revision: Option<u64>,
    /// Cached HTML, if any
    pub html: Option<String>,
    /// A debounce timer is waiting to fire
    pub pending: bool,
    pub last_error: Option<String>,
}

/// Synchronous controller state: revisions, options and the cache
#[derive(Debug, Default)]
pub struct PreviewState {
    source: SourceText,
    options: RenderOptions,
    cached: Option<RenderResult>,
    render_count: u64,
    last_ticket: u64,
    last_accepted_ticket: u64,
    last_error: Option<RenderError>,
}

impl PreviewState {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn revision(&self) -> u64 {
        self.source.revision()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn zoom(&self) -> ZoomLevel {
        self.options.zoom
    }

    pub fn cached(&self) -> Option<&RenderResult> {
        self.cached.as_ref()
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Replace the text; returns the new revision
    pub fn set_text(&mut self, text: String) -> u64 {
        self.source.replace(text)
    }

    /// Returns true when the value changed
    pub fn set_sanitize(&mut self, sanitize: bool) -> bool {
        if self.options.sanitize == sanitize {
            return false;
        }
        self.options = self.options.with_sanitize(sanitize);
        true
    }

    /// Apply a zoom change and return the new level
    pub fn apply_zoom(&mut self, change: ZoomChange) -> ZoomLevel {
        self.options.zoom = self.options.zoom.apply(change);
        self.options.zoom
    }

    /// Snapshot the current text and options for a render
    pub fn begin_render(&mut self) -> RenderJob {
        self.render_count += 1;
        self.last_ticket += 1;
        RenderJob {
            ticket: RenderTicket {
                id: self.last_ticket,
                revision: self.source.revision(),
                sanitize: self.options.sanitize,
            },
            text: Arc::clone(&self.source.text),
            options: self.options,
        }
    }

    fn is_current(&self, ticket: &RenderTicket) -> bool {
        ticket.revision == self.source.revision()
            && ticket.sanitize == self.options.sanitize
            && ticket.id > self.last_accepted_ticket
    }

    /// Apply a finished render
    pub fn complete(
        &mut self,
        ticket: RenderTicket,
        outcome: RenderOutcome<RenderResult>,
    ) -> RenderVerdict {
        if !self.is_current(&ticket) {
            return RenderVerdict::Stale;
        }
        match outcome {
            Ok(result) if result.source_revision == ticket.revision => {
                self.last_accepted_ticket = ticket.id;
                self.last_error = None;
                self.cached = Some(result);
                RenderVerdict::Accepted
            }
            Ok(result) => {
                log::warn!(
                    "Renderer returned revision {} for request {}",
                    result.source_revision,
                    ticket.revision
                );
                RenderVerdict::Stale
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                RenderVerdict::Failed(e)
            }
        }
    }

    pub fn snapshot(&self, pending: bool) -> PreviewSnapshot {
        PreviewSnapshot {
            revision: self.source.revision(),
            zoom: self.options.zoom,
            sanitize: self.options.sanitize,
            render_count: self.render_count,
            displayed_revision: self.cached.as_ref().map(|r| r.source_revision),
            html: self.cached.as_ref().map(|r| r.html.clone()),
            pending,
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }
}

/// Requests from the shell
enum Command {
    TextChanged(String),
    Refresh,
    SetSanitize(bool),
    Zoom(ZoomChange),
    Snapshot(oneshot::Sender<PreviewSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Events produced by the controller's own timers and workers
enum Internal {
    TimerFired(u64),
    RenderFinished {
        ticket: RenderTicket,
        outcome: RenderOutcome<RenderResult>,
    },
}

/// Cloneable input side of a running controller
#[derive(Clone)]
pub struct PreviewHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl PreviewHandle {
    fn send(&self, command: Command) -> Result<(), PreviewError> {
        self.commands.send(command).map_err(|_| PreviewError::Closed)
    }

    /// The source text changed
    pub fn text_changed(&self, text: impl Into<String>) -> Result<(), PreviewError> {
        self.send(Command::TextChanged(text.into()))
    }

    /// Render now instead of waiting for the quiet period
    pub fn refresh(&self) -> Result<(), PreviewError> {
        self.send(Command::Refresh)
    }

    /// Toggle sanitization; re-renders immediately if it changed
    pub fn set_sanitize(&self, sanitize: bool) -> Result<(), PreviewError> {
        self.send(Command::SetSanitize(sanitize))
    }

    /// Set an absolute zoom in percent (clamped)
    pub fn set_zoom(&self, percent: u16) -> Result<(), PreviewError> {
        self.zoom(ZoomChange::Set(percent))
    }

    /// Zoom in, out, reset, to a level or by a delta
    pub fn zoom(&self, change: ZoomChange) -> Result<(), PreviewError> {
        self.send(Command::Zoom(change))
    }

    /// Query the controller state
    pub async fn snapshot(&self) -> Result<PreviewSnapshot, PreviewError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| PreviewError::Closed)
    }

    /// Stop the controller, cancelling any pending render
    pub async fn shutdown(&self) -> Result<(), PreviewError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await.map_err(|_| PreviewError::Closed)
    }

    /// Whether the controller is still running
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Starts preview controllers
pub struct PreviewController;

impl PreviewController {
    /// Spawn a controller with the Markdown renderer
    pub fn spawn(
        options: RenderOptions,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<PreviewHandle, PreviewError> {
        Self::spawn_with_backend(options, Arc::new(MarkdownRenderer::new()), surface)
    }

    /// Spawn a controller on the current tokio runtime
    pub fn spawn_with_backend(
        options: RenderOptions,
        backend: Arc<dyn RenderBackend>,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<PreviewHandle, PreviewError> {
        let runtime = Handle::try_current().map_err(|e| PreviewError::NoRuntime(e.to_string()))?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let timer_tx = internal_tx.clone();
        let scheduler = DebounceScheduler::new(
            TokioTimer::new(runtime.clone()),
            options.quiet_period(),
            move |revision| {
                let _ = timer_tx.send(Internal::TimerFired(revision));
            },
        );

        let actor = PreviewActor {
            state: PreviewState::new(options),
            scheduler,
            backend,
            surface,
            internal_tx,
        };
        runtime.spawn(actor.run(commands_rx, internal_rx));
        log::debug!("Preview controller started");

        Ok(PreviewHandle {
            commands: commands_tx,
        })
    }
}

struct PreviewActor {
    state: PreviewState,
    scheduler: DebounceScheduler<TokioTimer>,
    backend: Arc<dyn RenderBackend>,
    surface: Arc<dyn DisplaySurface>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl PreviewActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => {
                        self.scheduler.cancel();
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = internal.recv() => self.handle_internal(event),
            }
        }
        log::debug!("Preview controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::TextChanged(text) => {
                let revision = self.state.set_text(text);
                self.scheduler.notify(revision);
            }
            Command::Refresh => {
                if !self.scheduler.flush() {
                    self.start_render();
                }
            }
            Command::SetSanitize(sanitize) => {
                if self.state.set_sanitize(sanitize) {
                    log::debug!("Sanitization {}", if sanitize { "enabled" } else { "disabled" });
                    self.scheduler.cancel();
                    self.start_render();
                }
            }
            Command::Zoom(change) => {
                let zoom = self.state.apply_zoom(change);
                if let Some(cached) = self.state.cached() {
                    self.surface.render_ready(&cached.html, zoom);
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.state.snapshot(self.scheduler.is_pending()));
            }
            Command::Shutdown(_) => {}
        }
    }

    fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::TimerFired(revision) => {
                if revision == self.state.revision() {
                    self.start_render();
                }
            }
            Internal::RenderFinished { ticket, outcome } => {
                match self.state.complete(ticket, outcome) {
                    RenderVerdict::Accepted => {
                        if let Some(cached) = self.state.cached() {
                            self.surface.render_ready(&cached.html, self.state.zoom());
                        }
                    }
                    RenderVerdict::Stale => {
                        log::debug!(
                            "Discarding render of revision {} (current {})",
                            ticket.revision(),
                            self.state.revision()
                        );
                    }
                    RenderVerdict::Failed(e) => {
                        log::error!("Render of revision {} failed: {}", ticket.revision(), e);
                        self.surface.render_failed(&e);
                    }
                }
            }
        }
    }

    fn start_render(&mut self) {
        let job = self.state.begin_render();
        let ticket = job.ticket;
        let backend = Arc::clone(&self.backend);
        let done = self.internal_tx.clone();

        tokio::spawn(async move {
            let worker = tokio::task::spawn_blocking(move || {
                backend.render(&job.text, &job.options, job.ticket.revision())
            });
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(e) => Err(RenderError::WorkerFailed(e.to_string())),
            };
            let _ = done.send(Internal::RenderFinished { ticket, outcome });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    fn result_for(revision: u64, html: &str) -> RenderResult {
        RenderResult {
            html: html.to_string(),
            source_revision: revision,
            highlighted_block_count: 0,
            sanitized: false,
            outline: Vec::new(),
            degradations: Vec::new(),
        }
    }

    #[test]
    fn test_stale_render_discarded() {
        let mut state = PreviewState::new(RenderOptions::default());
        state.set_text("first".to_string());
        let job = state.begin_render();
        state.set_text("second".to_string());

        let verdict = state.complete(job.ticket, Ok(result_for(1, "<p>first</p>")));
        assert_eq!(verdict, RenderVerdict::Stale);
        assert!(state.cached().is_none());
    }

    #[test]
    fn test_current_render_accepted() {
        let mut state = PreviewState::new(RenderOptions::default());
        state.set_text("text".to_string());
        let job = state.begin_render();
        assert_eq!(&*job.text, "text");
        let verdict = state.complete(job.ticket, Ok(result_for(1, "<p>text</p>")));
        assert_eq!(verdict, RenderVerdict::Accepted);
        assert_eq!(state.cached().map(|r| r.html.as_str()), Some("<p>text</p>"));
    }

    #[test]
    fn test_older_ticket_for_same_revision_discarded() {
        let mut state = PreviewState::new(RenderOptions::default());
        state.set_text("text".to_string());
        let older = state.begin_render();
        let newer = state.begin_render();
        assert_eq!(
            state.complete(newer.ticket, Ok(result_for(1, "new"))),
            RenderVerdict::Accepted
        );
        assert_eq!(
            state.complete(older.ticket, Ok(result_for(1, "old"))),
            RenderVerdict::Stale
        );
        assert_eq!(state.cached().map(|r| r.html.as_str()), Some("new"));
    }

    #[test]
    fn test_render_for_other_sanitize_setting_discarded() {
        let mut state = PreviewState::new(RenderOptions::default());
        state.set_text("text".to_string());
        let job = state.begin_render();
        assert!(state.set_sanitize(true));
        assert!(!state.set_sanitize(true));
        assert_eq!(
            state.complete(job.ticket, Ok(result_for(1, "unsafe"))),
            RenderVerdict::Stale
        );
    }

    #[test]
    fn test_failure_keeps_last_good_result() {
        let mut state = PreviewState::new(RenderOptions::default());
        state.set_text("a".to_string());
        let job = state.begin_render();
        state.complete(job.ticket, Ok(result_for(1, "good")));

        state.set_text("b".to_string());
        let job = state.begin_render();
        let error = RenderError::Internal("boom".to_string());
        assert_eq!(
            state.complete(job.ticket, Err(error.clone())),
            RenderVerdict::Failed(error)
        );
        assert_eq!(state.cached().map(|r| r.html.as_str()), Some("good"));
        assert_eq!(state.snapshot(false).last_error.as_deref(), Some("Renderer failed: boom"));
    }

    #[test]
    fn test_zoom_state() {
        let mut state = PreviewState::new(RenderOptions::default());
        assert_eq!(state.apply_zoom(ZoomChange::Set(150)).percent(), 150);
        assert_eq!(state.apply_zoom(ZoomChange::In).percent(), 160);
        assert_eq!(state.apply_zoom(ZoomChange::Set(2)).percent(), 25);
        assert_eq!(state.apply_zoom(ZoomChange::Reset).percent(), 100);
        assert_eq!(state.apply_zoom(ZoomChange::By(-30)).percent(), 70);
        assert_eq!(state.render_count(), 0);
    }

    /// Surface forwarding everything it receives to a channel
    struct ChannelSurface {
        ready: mpsc::UnboundedSender<(String, ZoomLevel)>,
        failed: mpsc::UnboundedSender<RenderError>,
    }

    impl DisplaySurface for ChannelSurface {
        fn render_ready(&self, html: &str, zoom: ZoomLevel) {
            let _ = self.ready.send((html.to_string(), zoom));
        }

        fn render_failed(&self, error: &RenderError) {
            let _ = self.failed.send(error.clone());
        }
    }

    struct Harness {
        handle: PreviewHandle,
        ready: mpsc::UnboundedReceiver<(String, ZoomLevel)>,
        failed: mpsc::UnboundedReceiver<RenderError>,
    }

    impl Harness {
        async fn next_ready(&mut self) -> (String, ZoomLevel) {
            timeout(Duration::from_secs(5), self.ready.recv())
                .await
                .expect("render_ready not called")
                .expect("surface channel closed")
        }
    }

    fn start(backend: Arc<dyn RenderBackend>, quiet_ms: u64) -> Harness {
        let (ready_tx, ready) = mpsc::unbounded_channel();
        let (failed_tx, failed) = mpsc::unbounded_channel();
        let surface = Arc::new(ChannelSurface {
            ready: ready_tx,
            failed: failed_tx,
        });
        let options = RenderOptions::new(false, 100, quiet_ms).unwrap();
        let handle = PreviewController::spawn_with_backend(options, backend, surface).unwrap();
        Harness {
            handle,
            ready,
            failed,
        }
    }

    /// Markdown renderer that counts invocations
    #[derive(Default)]
    struct CountingBackend {
        renderer: MarkdownRenderer,
        calls: AtomicUsize,
    }

    impl RenderBackend for CountingBackend {
        fn render(
            &self,
            text: &str,
            options: &RenderOptions,
            revision: u64,
        ) -> RenderOutcome<RenderResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.renderer.render(text, options, revision)
        }
    }

    #[tokio::test]
    async fn test_burst_of_edits_renders_once() {
        let backend = Arc::new(CountingBackend::default());
        let mut harness = start(backend.clone(), 30);

        for i in 1..=5 {
            harness.handle.text_changed(format!("# Draft {}", i)).unwrap();
        }
        let (html, _) = harness.next_ready().await;
        assert!(html.contains("Draft 5"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.revision, 5);
        assert_eq!(snapshot.displayed_revision, Some(5));
        assert_eq!(snapshot.render_count, 1);
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_end_to_end_render() {
        let mut harness = start(Arc::new(MarkdownRenderer::new()), 20);
        harness
            .handle
            .text_changed("# Title\n\n```python\nprint(1)\n```")
            .unwrap();
        harness.handle.refresh().unwrap();

        let (html, zoom) = harness.next_ready().await;
        assert!(html.contains("<h1 id=\"title\">Title</h1>"));
        assert!(html.contains("class=\"codehilite\""));
        assert_eq!(zoom.percent(), 100);
    }

    #[tokio::test]
    async fn test_zoom_reuses_cached_html() {
        let backend = Arc::new(CountingBackend::default());
        let mut harness = start(backend.clone(), 20);
        harness.handle.text_changed("hello").unwrap();
        harness.handle.refresh().unwrap();
        let (first_html, _) = harness.next_ready().await;

        harness.handle.set_zoom(150).unwrap();
        let (html, zoom) = harness.next_ready().await;
        assert_eq!(html, first_html);
        assert_eq!(zoom.percent(), 150);

        harness.handle.zoom(ZoomChange::In).unwrap();
        let (_, zoom) = harness.next_ready().await;
        assert_eq!(zoom.percent(), 160);

        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.render_count, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zoom_before_first_render_is_silent() {
        let mut harness = start(Arc::new(MarkdownRenderer::new()), 20);
        harness.handle.set_zoom(200).unwrap();
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.zoom.percent(), 200);
        assert!(harness.ready.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sanitize_toggle_rerenders_immediately() {
        let mut harness = start(Arc::new(MarkdownRenderer::new()), 10_000);
        harness
            .handle
            .text_changed("hi <script>alert(1)</script>")
            .unwrap();
        harness.handle.refresh().unwrap();
        let (html, _) = harness.next_ready().await;
        assert!(html.contains("<script>"));

        harness.handle.set_sanitize(true).unwrap();
        let (html, _) = harness.next_ready().await;
        assert!(!html.contains("<script"));
        assert!(!html.contains("alert"));

        // unchanged value does not render again
        harness.handle.set_sanitize(true).unwrap();
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.render_count, 2);
        assert!(snapshot.sanitize);
    }

    #[tokio::test]
    async fn test_sanitize_toggle_cancels_pending_debounce() {
        let backend = Arc::new(CountingBackend::default());
        let mut harness = start(backend.clone(), 10_000);
        harness.handle.text_changed("text").unwrap();
        assert!(harness.handle.snapshot().await.unwrap().pending);

        harness.handle.set_sanitize(true).unwrap();
        harness.next_ready().await;
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert!(!snapshot.pending);
        assert_eq!(snapshot.render_count, 1);
    }

    /// Blocks renders of text containing "slow" until released, and
    /// reports when such a render has started
    struct GatedBackend {
        renderer: MarkdownRenderer,
        started: mpsc::UnboundedSender<u64>,
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl RenderBackend for GatedBackend {
        fn render(
            &self,
            text: &str,
            options: &RenderOptions,
            revision: u64,
        ) -> RenderOutcome<RenderResult> {
            if text.contains("slow") {
                let _ = self.started.send(revision);
                let _ = self.gate.lock().unwrap().recv();
            }
            self.renderer.render(text, options, revision)
        }
    }

    #[tokio::test]
    async fn test_slow_stale_render_never_displayed() {
        let (release, gate) = std::sync::mpsc::channel();
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let backend = Arc::new(GatedBackend {
            renderer: MarkdownRenderer::new(),
            started: started_tx,
            gate: Mutex::new(gate),
        });
        let mut harness = start(backend, 20);

        harness.handle.text_changed("slow first").unwrap();
        harness.handle.refresh().unwrap();
        let in_flight = timeout(Duration::from_secs(5), started.recv())
            .await
            .expect("slow render never started")
            .expect("backend dropped");
        assert_eq!(in_flight, 1);

        harness.handle.text_changed("fast second").unwrap();
        assert_eq!(harness.handle.snapshot().await.unwrap().revision, 2);
        release.send(()).unwrap();

        let (html, _) = harness.next_ready().await;
        assert!(html.contains("fast second"));
        assert!(!html.contains("slow first"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(harness.ready.try_recv().is_err());
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.displayed_revision, Some(2));
        assert_eq!(snapshot.render_count, 2);
    }

    struct PanickingBackend;

    impl RenderBackend for PanickingBackend {
        fn render(&self, _: &str, _: &RenderOptions, _: u64) -> RenderOutcome<RenderResult> {
            panic!("worker crashed");
        }
    }

    #[tokio::test]
    async fn test_worker_failure_reported() {
        let mut harness = start(Arc::new(PanickingBackend), 20);
        harness.handle.text_changed("x").unwrap();
        harness.handle.refresh().unwrap();

        let error = timeout(Duration::from_secs(5), harness.failed.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(error, RenderError::WorkerFailed(_)));
        let snapshot = harness.handle.snapshot().await.unwrap();
        assert!(snapshot.html.is_none());
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let backend = Arc::new(CountingBackend::default());
        let harness = start(backend.clone(), 20);
        harness.handle.text_changed("pending").unwrap();
        harness.handle.shutdown().await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.handle.text_changed("late"), Err(PreviewError::Closed));
        assert!(harness.handle.is_closed());
    }

    #[test]
    fn test_spawn_without_runtime() {
        let (ready, _) = mpsc::unbounded_channel();
        let (failed, _) = mpsc::unbounded_channel();
        let result = PreviewController::spawn(
            RenderOptions::default(),
            Arc::new(ChannelSurface { ready, failed }),
        );
        assert!(matches!(result, Err(PreviewError::NoRuntime(_))));
    }
}
