use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::probe::ProbeError;
use crate::voice::Voice;
use crate::{SpeechSynthesis, VoicesChanged};

struct State {
    supported: bool,
    notifications: bool,
    voices: Option<Vec<Voice>>,
    listeners: HashMap<u64, VoicesChanged>,
    next_listener: u64,
    voice_queries: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            supported: true,
            notifications: true,
            voices: None,
            listeners: HashMap::new(),
            next_listener: 0,
            voice_queries: 0,
        }
    }
}

/// An in-process speech-synthesis facility.
///
/// Clones share the same state, so one handle can be given to a probe while
/// another loads voices later with [`set_voices`](Self::set_voices), which
/// notifies every registered listener.
///
/// ```rust
/// use voice_probe::{hosts::memory::InMemorySynthesis, SpeechSynthesis};
///
/// let host = InMemorySynthesis::from_json(r#"[{"name": "Alex", "lang": "en-US"}]"#)?;
/// assert_eq!(host.voices().map(|v| v.len()), Some(1));
/// # Ok::<(), voice_probe::ProbeError>(())
/// ```
#[derive(Clone, Default)]
pub struct InMemorySynthesis {
    state: Arc<Mutex<State>>,
}

impl InMemorySynthesis {
    /// A supported facility whose voices have not been loaded yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A supported facility whose voices are available synchronously.
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let host = Self::new();
        host.lock().voices = Some(voices);
        host
    }

    /// A host without any speech-synthesis facility.
    pub fn unsupported() -> Self {
        let host = Self::new();
        host.lock().supported = false;
        host
    }

    /// Load a synchronous voice list from a JSON array of voices.
    pub fn from_json(json: &str) -> Result<Self, ProbeError> {
        let voices: Vec<Voice> = serde_json::from_str(json)?;
        Ok(Self::with_voices(voices))
    }

    /// Disable "voices changed" notifications on this host.
    pub fn without_notifications(self) -> Self {
        self.lock().notifications = false;
        self
    }

    /// Replace the voice list and notify every registered listener.
    pub fn set_voices(&self, voices: Vec<Voice>) {
        let listeners: Vec<VoicesChanged> = {
            let mut state = self.lock();
            state.voices = Some(voices);
            state
                .listeners
                .values()
                .filter(|listener| !listener.is_settled())
                .cloned()
                .collect()
        };

        log::debug!("Voice list replaced, notifying {} listeners", listeners.len());
        for listener in listeners {
            listener.notify();
        }
    }

    /// Number of currently registered "voices changed" listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Number of times the voice list has been read.
    pub fn voice_queries(&self) -> usize {
        self.lock().voice_queries
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpeechSynthesis for InMemorySynthesis {
    type Listener = MemoryListener;

    fn is_supported(&self) -> bool {
        self.lock().supported
    }

    fn voices(&self) -> Option<Vec<Voice>> {
        let mut state = self.lock();
        state.voice_queries += 1;
        state.voices.clone()
    }

    fn listen_voices_changed(&self, notify: VoicesChanged) -> Option<MemoryListener> {
        let mut state = self.lock();
        if !state.notifications {
            return None;
        }

        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.insert(id, notify);

        Some(MemoryListener {
            id,
            state: Arc::downgrade(&self.state),
        })
    }
}

/// Registration of a listener on an [`InMemorySynthesis`]; removed on drop.
pub struct MemoryListener {
    id: u64,
    state: Weak<Mutex<State>>,
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.listeners.remove(&self.id);
        }
    }
}
