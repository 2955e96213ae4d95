//! Fallback timers.
//!
//! Enable via Cargo features:
//! - `tokio` (default) - [`TokioTimer`], backed by `tokio::time`
//! - `web` - `hosts::web::BrowserTimer`, backed by `setTimeout`

#[cfg(feature = "tokio")]
pub use self::tokio_timer::TokioTimer;

#[cfg(feature = "tokio")]
mod tokio_timer {
    use std::time::Duration;

    use crate::Timer;

    /// Timer driven by the ambient tokio runtime.
    ///
    /// The runtime must have its time driver enabled.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TokioTimer;

    impl Timer for TokioTimer {
        type Delay = tokio::time::Sleep;

        fn delay(&self, duration: Duration) -> Self::Delay {
            tokio::time::sleep(duration)
        }
    }
}
