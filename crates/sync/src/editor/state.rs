use snippets_cache::FetchError;
use snippets_core::SnippetKey;

/// What a view shows next to the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorStatus {
    Loading,
    Saved,
    Pending,
    LoadFailed,
}

impl EditorStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::Saved => "Saved",
            Self::Pending => "Pending",
            Self::LoadFailed => "Load failed",
        }
    }
}

/// A write taken out of the editor when the debounce window closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub key: SnippetKey,
    pub content: String,
    previous: String,
}

#[derive(Debug, Clone)]
enum Phase {
    Unloaded,
    LoadFailed(FetchError),
    Loaded {
        /// Content believed to be persisted.
        saved: String,
        /// Latest local edit not yet flushed.
        pending: Option<String>,
    },
}

/// Editor state for a single snippet key, free of any timers or I/O.
///
/// Switching weeks means building a fresh `EditorState`; nothing carries
/// over from the previous key.
#[derive(Debug, Clone)]
pub struct EditorState {
    key: SnippetKey,
    phase: Phase,
}

impl EditorState {
    pub fn new(key: SnippetKey) -> Self {
        Self {
            key,
            phase: Phase::Unloaded,
        }
    }

    pub fn key(&self) -> SnippetKey {
        self.key
    }

    /// First successful load wins.  Later revalidations of the same key do
    /// not replace what the user is looking at.
    pub fn on_loaded(&mut self, content: String) {
        match self.phase {
            Phase::Unloaded | Phase::LoadFailed(_) => {
                self.phase = Phase::Loaded {
                    saved: content,
                    pending: None,
                };
            }
            Phase::Loaded { .. } => {}
        }
    }

    pub fn on_load_failed(&mut self, err: FetchError) {
        if !matches!(self.phase, Phase::Loaded { .. }) {
            self.phase = Phase::LoadFailed(err);
        }
    }

    /// Record a local edit.  Returns `false` when there is nothing loaded to
    /// edit yet, in which case the edit is dropped.
    pub fn on_edit(&mut self, content: String) -> bool {
        match &mut self.phase {
            Phase::Loaded { pending, .. } => {
                *pending = Some(content);
                true
            }
            _ => false,
        }
    }

    /// Close the debounce window.  Yields the write to perform, or `None`
    /// when the pending content already matches what is saved.
    pub fn take_flush(&mut self) -> Option<Flush> {
        let Phase::Loaded { saved, pending } = &mut self.phase else {
            return None;
        };
        let content = pending.take()?;
        if content == *saved {
            return None;
        }
        let previous = std::mem::replace(saved, content.clone());
        Some(Flush {
            key: self.key,
            content,
            previous,
        })
    }

    /// Undo the optimistic bookkeeping of a failed flush so the content is
    /// pending again.  Edits made since the flush are kept.
    pub fn on_flush_failed(&mut self, flush: Flush) {
        if flush.key != self.key {
            return;
        }
        let Phase::Loaded { saved, pending } = &mut self.phase else {
            return;
        };
        if *saved == flush.content {
            *saved = flush.previous;
        }
        if pending.is_none() {
            *pending = Some(flush.content);
        }
    }

    pub fn status(&self) -> EditorStatus {
        match &self.phase {
            Phase::Unloaded => EditorStatus::Loading,
            Phase::LoadFailed(_) => EditorStatus::LoadFailed,
            Phase::Loaded { pending: Some(_), .. } => EditorStatus::Pending,
            Phase::Loaded { pending: None, .. } => EditorStatus::Saved,
        }
    }

    /// What the view should display: the pending edit if any, else the
    /// saved content.
    pub fn content(&self) -> &str {
        match &self.phase {
            Phase::Loaded {
                pending: Some(pending),
                ..
            } => pending,
            Phase::Loaded { saved, .. } => saved,
            _ => "",
        }
    }

    pub fn saved(&self) -> Option<&str> {
        match &self.phase {
            Phase::Loaded { saved, .. } => Some(saved),
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.phase, Phase::Loaded { pending: Some(_), .. })
    }

    pub fn load_error(&self) -> Option<&FetchError> {
        match &self.phase {
            Phase::LoadFailed(err) => Some(err),
            _ => None,
        }
    }
}
