use std::pin::pin;
use std::time::Duration;

use derive_builder::Builder;
use futures::future::{select, Either};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::voice::{find_voice, Voice};
use crate::{SpeechSynthesis, Timer, VoicesChanged};

/// Language used when the caller passes none (or an empty code).
pub const DEFAULT_LANGUAGE: &str = "en";

/// How long to wait for asynchronous voice loading before scanning anyway.
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("Speech synthesis is not supported by this host")]
    FacilityUnavailable,
    #[error("No voice available for language '{language}'")]
    NoMatchingVoice { language: String },
    #[error("Invalid voice list: {0}")]
    VoiceList(#[from] serde_json::Error),
}

/// Parameters for configuring a probe.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct ProbeOptions {
    /// Language code used when a check is given none (e.g. `"en"`, `"fr"`).
    #[builder(setter(into))]
    pub language: String,
    /// Upper bound on the wait for a "voices changed" notification.
    #[serde(rename = "fallback_timeout_ms", with = "duration_ms")]
    pub fallback_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

/// Checks a [`SpeechSynthesis`] host for voices in a given language.
///
/// Each check is independent: it reads the host's voice list, and when the
/// list is not populated yet, waits for the first of
///
/// - a "voices changed" notification that brings a populated list, or
/// - the fallback timer, after which whatever list exists is scanned.
///
/// The listener and the timer are dropped as soon as the check settles.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use voice_probe::{hosts::memory::InMemorySynthesis, timer::TokioTimer};
/// use voice_probe::{ProbeOptionsBuilder, VoiceProbe};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ProbeOptionsBuilder::default()
///     .language("de")
///     .fallback_timeout(Duration::from_millis(500))
///     .build()?;
/// let probe = VoiceProbe::with_options(InMemorySynthesis::new(), TokioTimer, options);
///
/// if !probe.is_available(None).await {
///     println!("German speech output would be silent");
/// }
/// # Ok(())
/// # }
/// ```
pub struct VoiceProbe<S, T> {
    synthesis: S,
    timer: T,
    options: ProbeOptions,
}

impl<S, T> VoiceProbe<S, T>
where
    S: SpeechSynthesis,
    T: Timer,
{
    pub fn new(synthesis: S, timer: T) -> Self {
        Self::with_options(synthesis, timer, ProbeOptions::default())
    }

    pub fn with_options(synthesis: S, timer: T, options: ProbeOptions) -> Self {
        Self {
            synthesis,
            timer,
            options,
        }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// True if at least one voice matches `language`.
    ///
    /// Every negative outcome, including a missing facility, is `false`.
    pub async fn is_available(&self, language: Option<&str>) -> bool {
        match self.find(language).await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{e}");
                false
            }
        }
    }

    /// Like [`is_available`](Self::is_available), but keeps a missing facility
    /// distinguishable from a missing voice.
    pub async fn check(&self, language: Option<&str>) -> Result<bool, ProbeError> {
        match self.find(language).await {
            Ok(_) => Ok(true),
            Err(ProbeError::NoMatchingVoice { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns the first voice whose language prefix equals `language`.
    pub async fn find(&self, language: Option<&str>) -> Result<Voice, ProbeError> {
        let language = self.resolve_language(language);

        if !self.synthesis.is_supported() {
            return Err(ProbeError::FacilityUnavailable);
        }

        match self.synthesis.voices() {
            Some(voices) if !voices.is_empty() => settle(&voices, language),
            _ => self.wait_for_voices(language).await,
        }
    }

    fn resolve_language<'a>(&'a self, language: Option<&'a str>) -> &'a str {
        match language {
            Some(code) if !code.is_empty() => code,
            _ if !self.options.language.is_empty() => &self.options.language,
            _ => DEFAULT_LANGUAGE,
        }
    }

    async fn wait_for_voices(&self, language: &str) -> Result<Voice, ProbeError> {
        let (notify, mut changes) = VoicesChanged::channel();
        let listener = self.synthesis.listen_voices_changed(notify);
        if listener.is_none() {
            log::debug!("Host has no voices-changed notification, relying on fallback timer");
        }

        // Voices may have landed between the first read and the registration.
        if let Some(voices) = self.synthesis.voices().filter(|v| !v.is_empty()) {
            drop(listener);
            return settle(&voices, language);
        }

        let mut delay = pin!(self.timer.delay(self.options.fallback_timeout));

        let result = loop {
            match select(changes.next(), delay.as_mut()).await {
                Either::Left((Some(()), _)) => match self.synthesis.voices() {
                    Some(voices) if !voices.is_empty() => break settle(&voices, language),
                    _ => log::debug!("Voices changed but the list is still empty"),
                },
                Either::Left((None, pending)) => {
                    // Every notifier is gone; only the timer can settle now.
                    pending.await;
                    break self.scan_now(language);
                }
                Either::Right(((), _)) => {
                    log::debug!(
                        "Fallback timer elapsed after {:?}",
                        self.options.fallback_timeout
                    );
                    break self.scan_now(language);
                }
            }
        };

        drop(listener);
        result
    }

    fn scan_now(&self, language: &str) -> Result<Voice, ProbeError> {
        settle(&self.synthesis.voices().unwrap_or_default(), language)
    }
}

fn settle(voices: &[Voice], language: &str) -> Result<Voice, ProbeError> {
    match find_voice(voices, language) {
        Some(voice) => {
            log::info!("Found voice '{}' ({}) for '{language}'", voice.name, voice.lang);
            Ok(voice.clone())
        }
        None => {
            log::info!("None of {} voices match '{language}'", voices.len());
            Err(ProbeError::NoMatchingVoice {
                language: language.to_string(),
            })
        }
    }
}

/// One-off check with default options.
///
/// `language` defaults to `"en"` when `None` or empty.
pub async fn is_at_least_one_voice_available<S, T>(
    synthesis: S,
    timer: T,
    language: Option<&str>,
) -> bool
where
    S: SpeechSynthesis,
    T: Timer,
{
    VoiceProbe::new(synthesis, timer)
        .is_available(language)
        .await
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{ProbeError, ProbeOptions, ProbeOptionsBuilder, VoiceProbe};
    use crate::hosts::memory::{InMemorySynthesis, MemoryListener};
    use crate::timer::TokioTimer;
    use crate::{SpeechSynthesis, Voice, VoicesChanged};

    /// Loads its voices while the listener is being registered, before the
    /// listener exists, so the change notification goes nowhere.
    #[derive(Clone)]
    struct LoadsBeforeListening {
        inner: InMemorySynthesis,
        voices: Vec<Voice>,
    }

    impl SpeechSynthesis for LoadsBeforeListening {
        type Listener = MemoryListener;

        fn is_supported(&self) -> bool {
            self.inner.is_supported()
        }

        fn voices(&self) -> Option<Vec<Voice>> {
            self.inner.voices()
        }

        fn listen_voices_changed(&self, notify: VoicesChanged) -> Option<MemoryListener> {
            self.inner.set_voices(self.voices.clone());
            self.inner.listen_voices_changed(notify)
        }
    }

    fn french() -> Vec<Voice> {
        vec![
            Voice::new("Thomas", "fr-FR"),
            Voice::new("Amélie", "fr-CA"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn missing_language_defaults_to_english() {
        let host = InMemorySynthesis::with_voices(vec![Voice::new("Daniel", "en-GB")]);
        let probe = VoiceProbe::new(host, TokioTimer);

        assert!(probe.is_available(None).await);
        assert!(probe.is_available(Some("")).await);
        assert_eq!(
            probe.is_available(None).await,
            probe.is_available(Some("en")).await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn synchronous_list_settles_without_waiting() {
        let host = InMemorySynthesis::with_voices(french());
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let start = Instant::now();
        let voice = probe.find(Some("fr")).await.unwrap();

        assert_eq!(voice.name, "Thomas");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn synchronous_list_without_match_is_negative() {
        let host = InMemorySynthesis::with_voices(vec![Voice::new("Anna", "de-DE")]);
        let probe = VoiceProbe::new(host, TokioTimer);

        let start = Instant::now();
        assert!(!probe.is_available(Some("fr")).await);
        assert!(!probe.check(Some("fr")).await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            probe.find(Some("fr")).await,
            Err(ProbeError::NoMatchingVoice { language }) if language == "fr"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_facility_skips_scan_and_timer() {
        let host = InMemorySynthesis::unsupported();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let start = Instant::now();
        assert!(!probe.is_available(Some("en")).await);
        assert!(matches!(
            probe.check(Some("en")).await,
            Err(ProbeError::FacilityUnavailable)
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(host.voice_queries(), 0);
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_notification_wins_the_race() {
        let host = InMemorySynthesis::new();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let loader = host.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            loader.set_voices(french());
        });

        let start = Instant::now();
        assert!(probe.is_available(Some("fr")).await);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn notification_with_other_languages_settles_negative() {
        let host = InMemorySynthesis::new();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let loader = host.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            loader.set_voices(vec![Voice::new("Anna", "de-DE")]);
        });

        let start = Instant::now();
        assert!(!probe.is_available(Some("fr")).await);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_notification_keeps_waiting_for_timer() {
        let host = InMemorySynthesis::new();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let loader = host.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            loader.set_voices(Vec::new());
        });

        let start = Instant::now();
        assert!(!probe.is_available(Some("fr")).await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_settles_negative_after_fallback() {
        let host = InMemorySynthesis::new();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let start = Instant::now();
        assert!(!probe.is_available(Some("fr")).await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_timer_scans_list_without_notification_support() {
        let host = InMemorySynthesis::new().without_notifications();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let loader = host.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            loader.set_voices(french());
        });

        let start = Instant::now();
        assert!(probe.is_available(Some("fr")).await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn host_without_voices_or_notifications_settles_negative_after_fallback() {
        let host = InMemorySynthesis::new().without_notifications();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let start = Instant::now();
        assert!(!probe.is_available(Some("en")).await);
        assert!(!probe.check(Some("en")).await.unwrap());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn voices_loaded_before_registration_settle_immediately() {
        let host = LoadsBeforeListening {
            inner: InMemorySynthesis::new(),
            voices: french(),
        };
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let start = Instant::now();
        assert_eq!(probe.find(Some("fr")).await.unwrap().name, "Thomas");
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(host.inner.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_fallback_timeout_is_honored() {
        let options = ProbeOptionsBuilder::default()
            .language("fr")
            .fallback_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        let probe = VoiceProbe::with_options(InMemorySynthesis::new(), TokioTimer, options);

        let start = Instant::now();
        assert!(!probe.is_available(None).await);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_language_replaces_english_default() {
        let options = ProbeOptionsBuilder::default().language("fr").build().unwrap();
        let probe =
            VoiceProbe::with_options(InMemorySynthesis::with_voices(french()), TokioTimer, options);

        assert!(probe.is_available(None).await);
        assert!(!probe.is_available(Some("en")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn notifications_after_settlement_are_ignored() {
        let host = InMemorySynthesis::new();
        let probe = VoiceProbe::new(host.clone(), TokioTimer);

        let loader = host.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            loader.set_voices(french());
        });

        assert!(probe.is_available(Some("fr")).await);
        host.set_voices(vec![Voice::new("Anna", "de-DE")]);
        host.set_voices(Vec::new());
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_probes_are_independent() {
        let host = InMemorySynthesis::new();
        let fr = VoiceProbe::new(host.clone(), TokioTimer);
        let de = VoiceProbe::new(host.clone(), TokioTimer);

        let loader = host.clone();
        let loading = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let listening = loader.listener_count();
            loader.set_voices(french());
            listening
        });

        let (fr, de) = tokio::join!(fr.is_available(Some("fr")), de.is_available(Some("de")));
        assert_eq!(loading.await.unwrap(), 2);
        assert!(fr);
        assert!(!de);
        assert_eq!(host.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn free_function_uses_defaults() {
        let host = InMemorySynthesis::with_voices(vec![Voice::new("Karen", "en-AU")]);
        assert!(super::is_at_least_one_voice_available(host.clone(), TokioTimer, None).await);
        assert!(!super::is_at_least_one_voice_available(host, TokioTimer, Some("fr")).await);
    }

    #[test]
    fn oversized_timeout_serializes_saturated() {
        let options = ProbeOptionsBuilder::default()
            .fallback_timeout(Duration::MAX)
            .build()
            .unwrap();
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["fallback_timeout_ms"], serde_json::json!(u64::MAX));
    }

    #[test]
    fn options_deserialize_with_millisecond_timeout() {
        let options: ProbeOptions =
            serde_json::from_str(r#"{"language": "es", "fallback_timeout_ms": 1500}"#).unwrap();
        assert_eq!(options.language, "es");
        assert_eq!(options.fallback_timeout, Duration::from_millis(1500));

        let defaults: ProbeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.language, "en");
        assert_eq!(defaults.fallback_timeout, Duration::from_secs(1));
    }
}
