//! Speech-synthesis hosts.
//!
//! This module contains implementations of [`SpeechSynthesis`](crate::SpeechSynthesis).
//!
//! # Available Hosts
//!
//! - `memory` - an in-process facility, always available
//! - `web` - the browser's `window.speechSynthesis` (feature `web`, wasm32 only)

pub mod memory;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;
