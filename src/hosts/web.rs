//! Browser host backed by `window.speechSynthesis`.
//!
//! Provides the JavaScript entry point `isAtLeastOneVoiceAvailable(languageCode?)`,
//! which resolves to a boolean.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{SpeechSynthesis as WebSpeechSynthesis, SpeechSynthesisVoice};

use crate::voice::Voice;
use crate::{SpeechSynthesis, Timer, VoicesChanged};

const VOICES_CHANGED: &str = "voiceschanged";

/// Check the browser for a voice in `languageCode` (defaults to `"en"`).
#[wasm_bindgen(js_name = "isAtLeastOneVoiceAvailable")]
pub async fn is_at_least_one_voice_available(language_code: Option<String>) -> bool {
    crate::is_at_least_one_voice_available(
        BrowserSynthesis::from_window(),
        BrowserTimer,
        language_code.as_deref(),
    )
    .await
}

/// The page's speech-synthesis facility, if the browser has one.
#[derive(Clone)]
pub struct BrowserSynthesis {
    synth: Option<WebSpeechSynthesis>,
}

impl BrowserSynthesis {
    pub fn from_window() -> Self {
        let synth = web_sys::window()
            .and_then(|window| js_sys::Reflect::get(&window, &"speechSynthesis".into()).ok())
            .filter(|value| !value.is_undefined() && !value.is_null())
            .and_then(|value| value.dyn_into::<WebSpeechSynthesis>().ok());
        if synth.is_none() {
            log::warn!("window.speechSynthesis is not available");
        }
        Self { synth }
    }
}

impl SpeechSynthesis for BrowserSynthesis {
    type Listener = BrowserListener;

    fn is_supported(&self) -> bool {
        self.synth.is_some()
    }

    fn voices(&self) -> Option<Vec<Voice>> {
        let synth = self.synth.as_ref()?;
        let voices = synth
            .get_voices()
            .iter()
            .filter_map(|value| value.dyn_into::<SpeechSynthesisVoice>().ok())
            .map(|voice| Voice {
                name: voice.name(),
                lang: voice.lang(),
                default: voice.default(),
            })
            .collect();
        Some(voices)
    }

    fn listen_voices_changed(&self, notify: VoicesChanged) -> Option<BrowserListener> {
        let synth = self.synth.as_ref()?;
        let has_slot = js_sys::Reflect::has(synth, &"onvoiceschanged".into()).unwrap_or(false);
        if !has_slot {
            return None;
        }

        let callback = Closure::<dyn FnMut()>::new(move || {
            if !notify.is_settled() {
                notify.notify();
            }
        });
        synth
            .add_event_listener_with_callback(VOICES_CHANGED, callback.as_ref().unchecked_ref())
            .ok()?;

        Some(BrowserListener {
            synth: synth.clone(),
            callback,
        })
    }
}

/// A `voiceschanged` event listener; removed from the facility on drop.
pub struct BrowserListener {
    synth: WebSpeechSynthesis,
    callback: Closure<dyn FnMut()>,
}

impl Drop for BrowserListener {
    fn drop(&mut self) {
        let _ = self.synth.remove_event_listener_with_callback(
            VOICES_CHANGED,
            self.callback.as_ref().unchecked_ref(),
        );
    }
}

/// Timer backed by `window.setTimeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    type Delay = BrowserDelay;

    fn delay(&self, duration: Duration) -> BrowserDelay {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let callback = Closure::<dyn FnMut()>::new(move || {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
        });

        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let handle = web_sys::window().and_then(|window| {
            window
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    callback.as_ref().unchecked_ref(),
                    millis,
                )
                .ok()
        });
        if handle.is_none() {
            log::warn!("setTimeout unavailable, fallback timer fires immediately");
        }

        BrowserDelay {
            rx,
            handle,
            _callback: callback,
        }
    }
}

/// Pending `setTimeout`; cleared if dropped before it fires.
pub struct BrowserDelay {
    rx: oneshot::Receiver<()>,
    handle: Option<i32>,
    _callback: Closure<dyn FnMut()>,
}

impl Future for BrowserDelay {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(_) => {
                self.handle = None;
                Poll::Ready(())
            }
            Poll::Pending if self.handle.is_none() => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for BrowserDelay {
    fn drop(&mut self) {
        if let (Some(handle), Some(window)) = (self.handle.take(), web_sys::window()) {
            window.clear_timeout_with_handle(handle);
        }
    }
}
