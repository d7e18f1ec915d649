//! Debounced settlement of rapidly changing values.
//!
//! A [`Debouncer`] turns a burst of changes into a single settled value:
//! every change cancels the pending [`Timer`] and arms a new one, and the
//! latest value is released only once the timer expires without another
//! change arriving. Time comes from an injected [`Clock`], so the same state
//! machine runs against wall time, tokio's (pausable) clock, or a
//! [`ManualClock`] in tests.
//!
//! [`spawn_debouncer`] wraps the state machine in a tokio task for callers
//! that live on an async runtime.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace};

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall-clock time based on [`std::time::Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// tokio's clock; honours `tokio::time::pause` and `advance`
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }

    /// Convert a clock reading back into a tokio instant
    pub fn instant_at(&self, offset: Duration) -> tokio::time::Instant {
        self.origin + offset
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute reading; never moves backwards
    pub fn set(&self, at: Duration) {
        self.now_ms.fetch_max(at.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Single-shot cancellable timer.
///
/// Re-arming replaces the previous deadline; a timer fires at most once
/// per arm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Duration>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Duration, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Disarm; returns whether a deadline was pending
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Fire if the deadline has passed. Disarms on firing.
    pub fn fire(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

/// Coalesces a changing value into settled values after a quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    clock: Arc<dyn Clock>,
    timer: Timer,
    pending: Option<T>,
    torn_down: bool,
    settled_count: u64,
}

impl<T: Debug> Debouncer<T> {
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            clock,
            timer: Timer::new(),
            pending: None,
            torn_down: false,
            settled_count: 0,
        }
    }

    /// Record a new value and restart the quiet period.
    ///
    /// With a zero delay the value settles immediately and is returned.
    pub fn observe(&mut self, value: T) -> Option<T> {
        if self.torn_down {
            trace!(?value, "Ignoring value observed after teardown");
            return None;
        }

        if self.delay.is_zero() {
            self.timer.cancel();
            self.pending = None;
            self.settled_count += 1;
            return Some(value);
        }

        if self.timer.cancel() {
            trace!("Debounce timer restarted");
        }
        self.timer.arm(self.clock.now(), self.delay);
        self.pending = Some(value);
        None
    }

    /// Release the pending value if its quiet period has elapsed.
    pub fn poll(&mut self) -> Option<T> {
        if self.torn_down {
            return None;
        }
        if !self.timer.fire(self.clock.now()) {
            return None;
        }
        let value = self.pending.take()?;
        self.settled_count += 1;
        debug!(?value, settled = self.settled_count, "Value settled");
        Some(value)
    }

    /// Settle the pending value now, skipping the rest of the quiet period.
    pub fn flush(&mut self) -> Option<T> {
        if self.torn_down {
            return None;
        }
        self.timer.cancel();
        let value = self.pending.take()?;
        self.settled_count += 1;
        Some(value)
    }

    /// Drop the pending value without settling it
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.pending = None;
    }

    /// Cancel any pending timer and refuse all further input.
    ///
    /// A timer expiring after this point is stale and never emits.
    pub fn teardown(&mut self) {
        if self.timer.cancel() {
            debug!(pending = ?self.pending, "Discarding stale settlement on teardown");
        }
        self.pending = None;
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Clock reading at which the pending value settles
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timer.deadline()
    }

    /// Time left until the pending value settles
    pub fn time_until_settled(&self) -> Option<Duration> {
        self.timer
            .deadline()
            .map(|deadline| deadline.saturating_sub(self.clock.now()))
    }

    /// Number of settlements emitted so far
    pub fn settled_count(&self) -> u64 {
        self.settled_count
    }
}

/// Input side of a debouncer running on a tokio task.
///
/// Dropping the handle (or calling [`shutdown`](DebounceHandle::shutdown))
/// tears the debouncer down: a pending value is discarded, not emitted.
#[derive(Debug)]
pub struct DebounceHandle<T> {
    input: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T> DebounceHandle<T> {
    /// Feed a new value; returns false once the task has stopped
    pub fn send(&self, value: T) -> bool {
        self.input.send(value).is_ok()
    }

    /// Tear down and wait for the task to finish
    pub async fn shutdown(self) {
        drop(self.input);
        if let Err(e) = self.task.await {
            debug!("Debounce task ended abnormally: {}", e);
        }
    }
}

/// Spawn a debouncer on the current tokio runtime.
///
/// Returns the input handle and a stream of settled values. The stream ends
/// after the handle is dropped or shut down.
pub fn spawn_debouncer<T>(delay: Duration) -> (DebounceHandle<T>, UnboundedReceiverStream<T>)
where
    T: Debug + Send + 'static,
{
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<T>();
    let (output_tx, output_rx) = mpsc::unbounded_channel::<T>();

    let task = tokio::spawn(async move {
        let clock = TokioClock::new();
        let mut debouncer = Debouncer::new(delay, Arc::new(clock.clone()));

        loop {
            let deadline = debouncer.next_deadline().map(|d| clock.instant_at(d));
            let timer = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                value = input_rx.recv() => match value {
                    Some(value) => {
                        if let Some(settled) = debouncer.observe(value) {
                            if output_tx.send(settled).is_err() {
                                break;
                            }
                        }
                    }
                    None => {
                        debouncer.teardown();
                        break;
                    }
                },

                _ = timer => {
                    if let Some(settled) = debouncer.poll() {
                        if output_tx.send(settled).is_err() {
                            break;
                        }
                    }
                }
            }
        }

        debug!("Debounce task stopped");
    });

    (
        DebounceHandle {
            input: input_tx,
            task,
        },
        UnboundedReceiverStream::new(output_rx),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn manual(delay_ms: u64) -> (ManualClock, Debouncer<String>) {
        let clock = ManualClock::new();
        let debouncer = Debouncer::new(Duration::from_millis(delay_ms), Arc::new(clock.clone()));
        (clock, debouncer)
    }

    fn at(clock: &ManualClock, ms: u64) {
        clock.set(Duration::from_millis(ms));
    }

    #[test]
    fn test_timer_arm_cancel_fire() {
        let mut timer = Timer::new();
        assert!(!timer.fire(Duration::ZERO));

        timer.arm(Duration::from_millis(10), Duration::from_millis(5));
        assert!(!timer.fire(Duration::from_millis(14)));
        assert!(timer.fire(Duration::from_millis(15)));
        assert!(!timer.fire(Duration::from_millis(16)), "fires once per arm");

        timer.arm(Duration::ZERO, Duration::from_millis(5));
        assert!(timer.cancel());
        assert!(!timer.fire(Duration::from_millis(100)));
        assert!(!timer.cancel());
    }

    #[test]
    fn test_burst_settles_once_with_last_value() {
        let (clock, mut debouncer) = manual(300);

        for (t, value) in [(0, "s"), (50, "ss"), (120, "ssh"), (400, "ssh-")] {
            at(&clock, t);
            assert_eq!(debouncer.observe(value.to_string()), None);
            assert_eq!(debouncer.poll(), None);
        }

        at(&clock, 699);
        assert_eq!(debouncer.poll(), None);
        assert_eq!(debouncer.next_deadline(), Some(Duration::from_millis(700)));

        at(&clock, 700);
        assert_eq!(debouncer.poll().as_deref(), Some("ssh-"));
        assert_eq!(debouncer.settled_count(), 1);

        at(&clock, 5_000);
        assert_eq!(debouncer.poll(), None);
    }

    #[test]
    fn test_separate_bursts_settle_in_order() {
        let (clock, mut debouncer) = manual(100);

        debouncer.observe("a".to_string());
        at(&clock, 100);
        assert_eq!(debouncer.poll().as_deref(), Some("a"));

        at(&clock, 150);
        debouncer.observe("b".to_string());
        at(&clock, 260);
        assert_eq!(debouncer.poll().as_deref(), Some("b"));
        assert_eq!(debouncer.settled_count(), 2);
    }

    #[test]
    fn test_zero_delay_settles_immediately() {
        let (_clock, mut debouncer) = manual(0);
        assert_eq!(debouncer.observe("x".to_string()).as_deref(), Some("x"));
        assert_eq!(debouncer.observe("xy".to_string()).as_deref(), Some("xy"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(), None);
    }

    #[test]
    fn test_teardown_discards_pending() {
        let (clock, mut debouncer) = manual(300);
        debouncer.observe("pending".to_string());
        debouncer.teardown();

        at(&clock, 1_000);
        assert_eq!(debouncer.poll(), None);
        assert_eq!(debouncer.observe("late".to_string()), None);
        assert_eq!(debouncer.flush(), None);
        assert!(debouncer.is_torn_down());
    }

    #[test]
    fn test_flush_and_cancel() {
        let (clock, mut debouncer) = manual(300);
        debouncer.observe("enter".to_string());
        assert_eq!(debouncer.flush().as_deref(), Some("enter"));
        at(&clock, 400);
        assert_eq!(debouncer.poll(), None);

        debouncer.observe("typo".to_string());
        debouncer.cancel();
        at(&clock, 1_000);
        assert_eq!(debouncer.poll(), None);
    }

    #[test]
    fn test_time_until_settled() {
        let (clock, mut debouncer) = manual(300);
        assert_eq!(debouncer.time_until_settled(), None);
        debouncer.observe("a".to_string());
        at(&clock, 120);
        assert_eq!(debouncer.time_until_settled(), Some(Duration::from_millis(180)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_debouncer_coalesces_burst() {
        let start = tokio::time::Instant::now();
        let (handle, mut settled) = spawn_debouncer::<String>(Duration::from_millis(300));

        handle.send("s".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.send("ss".to_string());
        tokio::time::sleep(Duration::from_millis(70)).await;
        handle.send("ssh".to_string());
        tokio::time::sleep(Duration::from_millis(280)).await;
        handle.send("ssh-".to_string());

        assert_eq!(settled.next().await.as_deref(), Some("ssh-"));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "settled at {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(710), "settled at {:?}", elapsed);

        let nothing_more = tokio::time::timeout(Duration::from_secs(5), settled.next()).await;
        assert!(nothing_more.is_err());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_debouncer_shutdown_drops_pending() {
        let (handle, mut settled) = spawn_debouncer::<u32>(Duration::from_millis(300));
        handle.send(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.shutdown().await;

        assert_eq!(settled.next().await, None);
    }
}
