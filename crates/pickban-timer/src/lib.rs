//! Phase countdown timer for pickban.
//!
//! A [`PhaseTimer`] counts one draft phase down to zero. It has no task or
//! thread of its own: the session actor that owns it asks for
//! [`PhaseTimer::next_wakeup`], sleeps until then inside its
//! `tokio::select!` loop, and calls [`PhaseTimer::poll`] to collect the
//! resulting [`TimerSignal`].
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = mailbox.recv() => { /* handle commands */ }
//!         _ = pickban_timer::sleep_until(timer.next_wakeup()) => {
//!             while let Some(signal) = timer.poll(Instant::now()) {
//!                 /* broadcast tick, auto-resolve on expiry */
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! # Duration contract
//!
//! [`PhaseTimer::start`] always counts down from the value last given to
//! [`PhaseTimer::set_duration`]. Pausing records the remainder of the
//! current run only; it never leaks into the duration of the next `start`.

use std::time::Duration;

pub use tokio::time::Instant;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tick cadence and buffer-period settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerConfig {
    /// Interval between [`TimerSignal::Tick`] signals while running.
    pub tick_interval: Duration,
    /// Trailing fraction of the window flagged as the buffer period
    /// (0.0–1.0). Default: 1/6, the last 5 s of a 30 s phase.
    pub buffer_fraction: f64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            buffer_fraction: 1.0 / 6.0,
        }
    }
}

impl TimerConfig {
    /// Smallest accepted tick interval.
    pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(50);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`PhaseTimer::new`].
    pub fn validated(mut self) -> Self {
        if self.tick_interval < Self::MIN_TICK_INTERVAL {
            warn!(
                tick_ms = self.tick_interval.as_millis() as u64,
                min_ms = Self::MIN_TICK_INTERVAL.as_millis() as u64,
                "tick_interval below minimum, clamping"
            );
            self.tick_interval = Self::MIN_TICK_INTERVAL;
        }
        if !self.buffer_fraction.is_finite() {
            self.buffer_fraction = 0.0;
        }
        self.buffer_fraction = self.buffer_fraction.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Signals and state
// ---------------------------------------------------------------------------

/// What a poll of the timer produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// Periodic progress report while running.
    Tick {
        remaining: Duration,
        /// `true` once the run has entered its trailing buffer window.
        is_buffer_period: bool,
    },
    /// The run reached zero. Emitted exactly once per `start`.
    Expired,
}

/// Observable lifecycle of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Expired,
}

#[derive(Debug, Clone, Copy)]
enum Run {
    Idle,
    Running {
        deadline: Instant,
        window: Duration,
        next_tick: Instant,
    },
    Paused {
        remaining: Duration,
        window: Duration,
    },
    Expired,
}

// ---------------------------------------------------------------------------
// PhaseTimer
// ---------------------------------------------------------------------------

/// Countdown for a single phase, driven by its owner's event loop.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    config: TimerConfig,
    duration: Duration,
    run: Run,
    runs: u64,
}

impl PhaseTimer {
    /// Create an idle timer whose first `start` counts down from `duration`.
    pub fn new(duration: Duration, config: TimerConfig) -> Self {
        Self {
            config: config.validated(),
            duration,
            run: Run::Idle,
            runs: 0,
        }
    }

    /// Create an idle timer with default tick settings.
    pub fn with_duration(duration: Duration) -> Self {
        Self::new(duration, TimerConfig::default())
    }

    /// Set the duration used by the next [`start`](Self::start).
    ///
    /// A run already in progress (or paused) keeps its own deadline.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
        trace!(duration_ms = duration.as_millis() as u64, "timer duration set");
    }

    /// Begin a fresh run from the configured duration.
    ///
    /// Any previous run (running, paused, or expired) is discarded.
    pub fn start(&mut self, now: Instant) {
        let window = self.duration;
        self.run = Run::Running {
            deadline: now + window,
            window,
            next_tick: now + self.config.tick_interval,
        };
        self.runs += 1;
        debug!(
            run = self.runs,
            duration_ms = window.as_millis() as u64,
            "timer started"
        );
    }

    /// Freeze the current run and return the time it had left.
    ///
    /// Idempotent: pausing a paused timer returns the frozen value again.
    /// An idle or expired timer reports zero.
    pub fn pause(&mut self, now: Instant) -> Duration {
        match self.run {
            Run::Running {
                deadline, window, ..
            } => {
                let remaining = deadline.saturating_duration_since(now);
                self.run = Run::Paused { remaining, window };
                debug!(
                    remaining_ms = remaining.as_millis() as u64,
                    "timer paused"
                );
                remaining
            }
            Run::Paused { remaining, .. } => remaining,
            Run::Idle | Run::Expired => Duration::ZERO,
        }
    }

    /// Continue a paused run from its frozen remainder.
    ///
    /// No-op unless paused.
    pub fn resume(&mut self, now: Instant) {
        if let Run::Paused { remaining, window } = self.run {
            self.run = Run::Running {
                deadline: now + remaining,
                window,
                next_tick: now + self.config.tick_interval,
            };
            debug!(
                remaining_ms = remaining.as_millis() as u64,
                "timer resumed"
            );
        }
    }

    /// Stop and forget the current run. The duration setting is kept.
    pub fn reset(&mut self) {
        self.run = Run::Idle;
        trace!("timer reset");
    }

    /// Advance the timer to `now` and report at most one signal.
    ///
    /// Call repeatedly until it returns `None`. Expiry wins over a tick
    /// that is due at the same instant.
    pub fn poll(&mut self, now: Instant) -> Option<TimerSignal> {
        let Run::Running {
            deadline,
            window,
            next_tick,
        } = self.run
        else {
            return None;
        };

        if now >= deadline {
            self.run = Run::Expired;
            debug!(run = self.runs, "timer expired");
            return Some(TimerSignal::Expired);
        }
        if now < next_tick {
            return None;
        }

        // Late polls skip missed ticks and schedule from now.
        self.run = Run::Running {
            deadline,
            window,
            next_tick: now + self.config.tick_interval,
        };
        let remaining = deadline - now;
        let is_buffer_period =
            remaining <= window.mul_f64(self.config.buffer_fraction);
        trace!(
            remaining_ms = remaining.as_millis() as u64,
            is_buffer_period,
            "timer tick"
        );
        Some(TimerSignal::Tick {
            remaining,
            is_buffer_period,
        })
    }

    /// When the owner should next call [`poll`](Self::poll).
    ///
    /// `None` while idle, paused, or expired.
    pub fn next_wakeup(&self) -> Option<Instant> {
        match self.run {
            Run::Running {
                deadline,
                next_tick,
                ..
            } => Some(deadline.min(next_tick)),
            _ => None,
        }
    }

    /// Time left in the current run (frozen value while paused).
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.run {
            Run::Running { deadline, .. } => {
                deadline.saturating_duration_since(now)
            }
            Run::Paused { remaining, .. } => remaining,
            Run::Idle | Run::Expired => Duration::ZERO,
        }
    }

    /// The duration the next `start` will use.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Length of the current run, if one is running or paused.
    pub fn window(&self) -> Option<Duration> {
        match self.run {
            Run::Running { window, .. } | Run::Paused { window, .. } => {
                Some(window)
            }
            Run::Idle | Run::Expired => None,
        }
    }

    pub fn state(&self) -> TimerState {
        match self.run {
            Run::Idle => TimerState::Idle,
            Run::Running { .. } => TimerState::Running,
            Run::Paused { .. } => TimerState::Paused,
            Run::Expired => TimerState::Expired,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.run, Run::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.run, Run::Paused { .. })
    }

    /// Number of times `start` has been called.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }
}

/// Sleep until `deadline`, or forever when there is none.
///
/// Meant as a `tokio::select!` branch: a `None` deadline never resolves,
/// so the other branches keep running.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
