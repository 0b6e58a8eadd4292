//! Signal-driven skip and abort.
//!
//! A listener thread turns SIGINT/SIGTERM into two sticky flags the
//! driver loop polls. While inputs are being opened the signals are
//! swallowed entirely, so interrupting a recording pipe mid-open cannot
//! kill it. In session, a lone SIGINT skips the current input when the
//! combine mode plays inputs one at a time and the progress display is
//! up; a second SIGINT within a second, or SIGTERM, aborts the pipeline.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// Window within which a repeated SIGINT means "abort".
const REPEAT_WINDOW_MS: u64 = 1000;

/// Shared state between the listener thread and the driver loop.
pub struct Interrupt {
    abort: AtomicBool,
    skip: AtomicBool,
    in_session: AtomicBool,
    skippable: AtomicBool,
    last_interrupt_ms: AtomicU64,
    started: Instant,
}

impl Interrupt {
    /// Install the handlers and spawn the listener thread.
    pub fn install() -> io::Result<Arc<Self>> {
        let state = Arc::new(Interrupt {
            abort: AtomicBool::new(false),
            skip: AtomicBool::new(false),
            in_session: AtomicBool::new(false),
            skippable: AtomicBool::new(false),
            last_interrupt_ms: AtomicU64::new(u64::MAX),
            started: Instant::now(),
        });

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let listener = Arc::clone(&state);
        thread::spawn(move || {
            for signal in signals.forever() {
                listener.on_signal(signal);
            }
        });
        Ok(state)
    }

    fn on_signal(&self, signal: i32) {
        if !self.in_session.load(Ordering::Acquire) {
            // Opening phase: ignore, so subprocess pipes stay alive.
            return;
        }
        let now = self.started.elapsed().as_millis() as u64;
        let previous = self.last_interrupt_ms.swap(now, Ordering::AcqRel);
        let lone = previous == u64::MAX || now.saturating_sub(previous) > REPEAT_WINDOW_MS;

        if signal == SIGINT && lone && self.skippable.load(Ordering::Acquire) {
            self.skip.store(true, Ordering::Release);
        } else {
            self.abort.store(true, Ordering::Release);
        }
    }

    /// Start honoring signals. `skippable` is whether a lone SIGINT
    /// skips the current input rather than aborting.
    pub fn enter_session(&self, skippable: bool) {
        self.skippable.store(skippable, Ordering::Release);
        self.in_session.store(true, Ordering::Release);
    }

    /// Back to the opening phase: signals are ignored again.
    pub fn leave_session(&self) {
        self.in_session.store(false, Ordering::Release);
    }

    /// Whether an abort has been requested. Sticky.
    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Take the skip request, clearing it.
    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::AcqRel)
    }

    /// The raw abort flag, for the scheduler's write loop.
    pub fn abort_flag(&self) -> &AtomicBool {
        &self.abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare() -> Interrupt {
        Interrupt {
            abort: AtomicBool::new(false),
            skip: AtomicBool::new(false),
            in_session: AtomicBool::new(false),
            skippable: AtomicBool::new(false),
            last_interrupt_ms: AtomicU64::new(u64::MAX),
            started: Instant::now(),
        }
    }

    #[test]
    fn signals_are_ignored_outside_a_session() {
        let interrupt = bare();
        interrupt.on_signal(SIGINT);
        assert!(!interrupt.aborted());
        assert!(!interrupt.take_skip());
    }

    #[test]
    fn lone_sigint_skips_when_skippable() {
        let interrupt = bare();
        interrupt.enter_session(true);
        interrupt.on_signal(SIGINT);
        assert!(interrupt.take_skip());
        assert!(!interrupt.aborted());
        // The flag is cleared by taking it.
        assert!(!interrupt.take_skip());
    }

    #[test]
    fn repeated_sigint_aborts() {
        let interrupt = bare();
        interrupt.enter_session(true);
        interrupt.on_signal(SIGINT);
        assert!(interrupt.take_skip());
        // Second interrupt lands within the window.
        interrupt.on_signal(SIGINT);
        assert!(interrupt.aborted());
    }

    #[test]
    fn sigint_aborts_when_not_skippable() {
        let interrupt = bare();
        interrupt.enter_session(false);
        interrupt.on_signal(SIGINT);
        assert!(interrupt.aborted());
        assert!(!interrupt.take_skip());
    }

    #[test]
    fn sigterm_always_aborts() {
        let interrupt = bare();
        interrupt.enter_session(true);
        interrupt.on_signal(SIGTERM);
        assert!(interrupt.aborted());
        assert!(!interrupt.take_skip());
    }
}
