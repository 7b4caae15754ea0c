#![forbid(unsafe_code)]

//! Monotonic page clock and the single re-armed wake-up timer.
//!
//! The engine keeps its own deadline queue; the page only needs one
//! `setTimeout` pending at a time, armed for the earliest deadline.

use core::time::Duration;

/// Delay to pass to `setTimeout` so it fires at `deadline`.
///
/// Rounded up so the wake-up never lands before the deadline, and clamped to
/// the range browsers accept.
#[must_use]
pub fn timeout_delay_ms(deadline: Duration, now: Duration) -> i32 {
    let remaining = deadline.saturating_sub(now);
    let ms = remaining.as_micros().div_ceil(1000);
    i32::try_from(ms).unwrap_or(i32::MAX)
}

#[cfg(target_arch = "wasm32")]
pub use wasm::{Clock, WakeTimer};

#[cfg(target_arch = "wasm32")]
mod wasm {
    use core::time::Duration;

    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_time::Instant;

    /// Offsets since the binding started.
    #[derive(Debug, Clone, Copy)]
    pub struct Clock {
        origin: Instant,
    }

    impl Clock {
        pub fn start() -> Self {
            Self {
                origin: Instant::now(),
            }
        }

        pub fn now(&self) -> Duration {
            self.origin.elapsed()
        }
    }

    /// One `setTimeout` handle, replaced on every re-arm.
    pub struct WakeTimer {
        callback: Closure<dyn FnMut()>,
        handle: Option<i32>,
    }

    impl WakeTimer {
        pub fn new(callback: Closure<dyn FnMut()>) -> Self {
            Self {
                callback,
                handle: None,
            }
        }

        /// Cancel any pending wake-up and, if `deadline` is set, arm a new one.
        pub fn rearm(&mut self, deadline: Option<Duration>, now: Duration) {
            self.cancel();
            let Some(deadline) = deadline else {
                return;
            };
            let Some(window) = web_sys::window() else {
                return;
            };
            let delay = super::timeout_delay_ms(deadline, now);
            match window.set_timeout_with_callback_and_timeout_and_arguments_0(
                self.callback.as_ref().unchecked_ref(),
                delay,
            ) {
                Ok(handle) => self.handle = Some(handle),
                Err(err) => tracing::warn!(?err, "setTimeout failed"),
            }
        }

        pub fn cancel(&mut self) {
            if let (Some(handle), Some(window)) = (self.handle.take(), web_sys::window()) {
                window.clear_timeout_with_handle(handle);
            }
        }
    }
}
