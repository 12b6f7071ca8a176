//! Debounced snippet editing.
//!
//! [`EditorState`] holds the bookkeeping; [`SnippetEditor`] drives it from a
//! background task that owns the debounce timer and publishes an
//! [`EditorSnapshot`] after every change.

mod state;

use std::future;
use std::time::Duration;

use snippets_cache::Lookup;
use snippets_core::{Snippet, SnippetKey};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

pub use state::{EditorState, EditorStatus, Flush};

use crate::error::{EditorClosed, WriteError};
use crate::snippets::SnippetRepository;

const COMMAND_BUFFER: usize = 32;

/// What the editor currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub key: SnippetKey,
    pub status: EditorStatus,
    pub content: String,
    /// Writes dispatched since the key was opened that have not completed.
    pub saving: usize,
    /// Edits accepted since the editor opened.  Lets callers tell "saved
    /// before my edit" from "saved after it".
    pub edits: u64,
    /// Message of the most recent failed write or load, cleared by the next
    /// success.
    pub last_error: Option<String>,
}

impl EditorSnapshot {
    /// Nothing pending and nothing in flight.
    pub fn is_settled(&self) -> bool {
        self.status == EditorStatus::Saved && self.saving == 0
    }
}

#[derive(Debug)]
enum Command {
    Edit(String),
    Open(SnippetKey),
    Reload,
    FlushNow,
    Close,
}

/// Results of spawned loads and writes, tagged with the session that
/// started them.
enum Event {
    Loaded {
        session: u64,
        lookup: Lookup<Snippet>,
    },
    Flushed {
        session: u64,
        flush: Flush,
        result: Result<(), WriteError>,
    },
}

/// Handle to a running editor task.
///
/// Dropping the handle (or calling [`close`](Self::close)) stops the task
/// and cancels any armed timer; unflushed edits are discarded.  Writes that
/// were already dispatched still complete and revalidate their key.
pub struct SnippetEditor {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<EditorSnapshot>,
    task: JoinHandle<()>,
}

impl SnippetEditor {
    /// Start editing `key`; the initial load begins immediately.
    pub fn open(repo: SnippetRepository, key: SnippetKey, debounce: Duration) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = EditorState::new(key);
        let (snapshots_tx, snapshots_rx) = watch::channel(EditorSnapshot {
            key,
            status: state.status(),
            content: String::new(),
            saving: 0,
            edits: 0,
            last_error: None,
        });

        let mut driver = Driver {
            repo,
            debounce,
            state,
            session: 0,
            deadline: None,
            saving: 0,
            edits: 0,
            last_error: None,
            commands: commands_rx,
            events: events_rx,
            events_tx,
            snapshots: snapshots_tx,
        };
        let task = tokio::spawn(async move {
            driver.start_load();
            driver.run().await;
        });

        Self {
            commands: commands_tx,
            snapshots: snapshots_rx,
            task,
        }
    }

    async fn send(&self, command: Command) -> Result<(), EditorClosed> {
        self.commands.send(command).await.map_err(|_| EditorClosed)
    }

    /// Replace the editor content.  (Re)arms the debounce timer.
    pub async fn edit(&self, content: impl Into<String>) -> Result<(), EditorClosed> {
        self.send(Command::Edit(content.into())).await
    }

    /// Switch to another week.  Unflushed edits of the current week are
    /// discarded.
    pub async fn switch_to(&self, key: SnippetKey) -> Result<(), EditorClosed> {
        self.send(Command::Open(key)).await
    }

    /// Retry a failed load.
    pub async fn reload(&self) -> Result<(), EditorClosed> {
        self.send(Command::Reload).await
    }

    /// Close the debounce window now instead of waiting for the timer.
    pub async fn flush_now(&self) -> Result<(), EditorClosed> {
        self.send(Command::FlushNow).await
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the first snapshot matching `done`.
    pub async fn wait_for(&self, done: impl FnMut(&EditorSnapshot) -> bool) -> Result<EditorSnapshot, EditorClosed> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots.wait_for(done).await.map_err(|_| EditorClosed)?;
        Ok(snapshot.clone())
    }

    pub async fn close(self) {
        let _ = self.commands.send(Command::Close).await;
        if let Err(err) = self.task.await {
            warn!(error = %err, "editor task ended abnormally");
        }
    }
}

struct Driver {
    repo: SnippetRepository,
    debounce: Duration,
    state: EditorState,
    /// Bumped on every switch, so results from an earlier visit to the same
    /// key are told apart from the current one.
    session: u64,
    deadline: Option<Instant>,
    saving: usize,
    edits: u64,
    last_error: Option<String>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<Event>,
    events_tx: mpsc::UnboundedSender<Event>,
    snapshots: watch::Sender<EditorSnapshot>,
}

impl Driver {
    async fn run(&mut self) {
        loop {
            let deadline = self.deadline;
            let timer = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => future::pending().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(Command::Close) => break,
                    Some(command) => self.on_command(command),
                },
                Some(event) = self.events.recv() => self.on_event(event),
                () = timer => {
                    self.deadline = None;
                    self.flush();
                }
            }
            self.publish();
        }

        if self.state.has_pending() {
            debug!(key = %self.state.key(), "editor closed with unflushed edits");
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Edit(content) => {
                if self.state.on_edit(content) {
                    self.edits += 1;
                    self.deadline = Some(Instant::now() + self.debounce);
                } else {
                    debug!(key = %self.state.key(), "edit before load ignored");
                }
            }
            Command::Open(key) => {
                if key == self.state.key() {
                    return;
                }
                if self.state.has_pending() {
                    debug!(from = %self.state.key(), to = %key, "discarding unflushed edits");
                }
                info!(%key, "editor switched week");
                self.session += 1;
                self.deadline = None;
                self.saving = 0;
                self.last_error = None;
                self.state = EditorState::new(key);
                self.start_load();
            }
            Command::Reload => {
                if self.state.load_error().is_some() {
                    self.repo.reload(self.state.key());
                    self.start_load();
                }
            }
            Command::FlushNow => {
                self.deadline = None;
                self.flush();
            }
            Command::Close => {}
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Loaded { session, lookup } => {
                if session != self.session {
                    return;
                }
                match lookup {
                    Lookup::Ready(snippet) => {
                        self.last_error = None;
                        self.state.on_loaded(snippet.content);
                    }
                    Lookup::Failed(err) => {
                        self.last_error = Some(err.to_string());
                        self.state.on_load_failed(err);
                    }
                    Lookup::Unresolved | Lookup::Pending => {}
                }
            }
            Event::Flushed { session, flush, result } => {
                if session != self.session {
                    if let Err(err) = result {
                        warn!(key = %flush.key, error = %err, "write from a closed session failed");
                    }
                    return;
                }
                self.saving = self.saving.saturating_sub(1);
                match result {
                    Ok(()) => self.last_error = None,
                    Err(err) => {
                        warn!(key = %flush.key, error = %err, "snippet write failed; retrying after the next window");
                        self.last_error = Some(err.to_string());
                        self.state.on_flush_failed(flush);
                        self.deadline = Some(Instant::now() + self.debounce);
                    }
                }
            }
        }
    }

    fn start_load(&self) {
        let key = self.state.key();
        let session = self.session;
        let repo = self.repo.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let lookup = repo.snippet(key).await;
            let _ = events.send(Event::Loaded { session, lookup });
        });
    }

    fn flush(&mut self) {
        let Some(flush) = self.state.take_flush() else {
            return;
        };
        debug!(key = %flush.key, bytes = flush.content.len(), "flushing snippet");
        self.saving += 1;
        let session = self.session;
        let repo = self.repo.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = repo.save(flush.key, &flush.content).await;
            let _ = events.send(Event::Flushed { session, flush, result });
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(EditorSnapshot {
            key: self.state.key(),
            status: self.state.status(),
            content: self.state.content().to_string(),
            saving: self.saving,
            edits: self.edits,
            last_error: self.last_error.clone(),
        });
    }
}
