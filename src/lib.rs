//! # voice-probe
//!
//! A small Rust library that asks a speech-synthesis host whether it exposes
//! at least one voice for a language, before any speech is attempted.
//!
//! ## Features
//!
//! - **Injected hosts**: the facility is a [`SpeechSynthesis`] implementation,
//!   not ambient global state
//! - **Sync and async voice loading**: voices that arrive through a
//!   "voices changed" notification race a fallback timer
//! - **Browser support**: the `web` feature wraps `window.speechSynthesis`
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! voice-probe = "2026.2"
//! ```
//!
//! ```rust,no_run
//! use voice_probe::{hosts::memory::InMemorySynthesis, timer::TokioTimer, Voice, VoiceProbe};
//!
//! # async fn run() {
//! let host = InMemorySynthesis::with_voices(vec![Voice::new("Thomas", "fr-FR")]);
//! let probe = VoiceProbe::new(host, TokioTimer);
//!
//! assert!(probe.is_available(Some("fr")).await);
//! assert!(!probe.is_available(None).await);
//! # }
//! ```

pub mod hosts;
pub mod probe;
pub mod timer;
pub mod voice;

use std::future::Future;
use std::time::Duration;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

pub use probe::{
    is_at_least_one_voice_available, ProbeError, ProbeOptions, ProbeOptionsBuilder, VoiceProbe,
    DEFAULT_LANGUAGE,
};
pub use voice::{find_voice, language_prefix, Voice};

/// A host's speech-synthesis facility, as seen by the probe.
///
/// Implementations decide how voices are enumerated and how asynchronous
/// loading is reported. The probe only reads from the facility.
pub trait SpeechSynthesis {
    /// Handle for a registered "voices changed" listener.
    ///
    /// Dropping the handle must deregister the listener.
    type Listener;

    /// Whether the facility exists at all on this host.
    fn is_supported(&self) -> bool;

    /// The voice list as it stands right now.
    ///
    /// `None` means the host has not produced a list (yet). An empty list is
    /// treated the same way by the probe.
    fn voices(&self) -> Option<Vec<Voice>>;

    /// Register `notify` to be called whenever the voice list changes.
    ///
    /// Returns `None` when the host has no asynchronous loading mechanism.
    fn listen_voices_changed(&self, notify: VoicesChanged) -> Option<Self::Listener>;
}

/// A source of one-shot delays used for the fallback timer.
pub trait Timer {
    type Delay: Future<Output = ()>;

    /// A future completing after `duration`. Dropping it cancels the timer.
    fn delay(&self, duration: Duration) -> Self::Delay;
}

/// Notifier handed to a [`SpeechSynthesis`] host for one probe.
///
/// Hosts may call [`notify`](Self::notify) any number of times; once the probe
/// has settled every call is a no-op.
#[derive(Debug, Clone)]
pub struct VoicesChanged {
    tx: UnboundedSender<()>,
}

impl VoicesChanged {
    pub(crate) fn channel() -> (Self, UnboundedReceiver<()>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    /// Signal that the host's voice list changed.
    pub fn notify(&self) {
        // The receiver is gone once the probe settled.
        let _ = self.tx.unbounded_send(());
    }

    /// True once the probe that created this notifier has settled.
    pub fn is_settled(&self) -> bool {
        self.tx.is_closed()
    }
}
