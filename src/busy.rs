//! Busy indicator shown while launch checks run.
//!
//! The indicator is a small state machine around a [`Surface`]:
//!
//! ```text
//! Uninitialized --init--> Active <--start/stop--> Stopped
//!                           \                      /
//!                            `-------remove-------'--> Removed
//! ```
//!
//! While active, a timer task calls [`BusyIndicator::tick`], which rotates
//! the spinner by a fixed increment. If the surface has gone away by the time
//! a tick fires, the indicator removes itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default redraw interval.
pub const DEFAULT_SPEED: Duration = Duration::from_millis(8);
/// Default rotation per redraw, in degrees.
pub const DEFAULT_INCREMENT: u16 = 2;

/// Something the indicator can draw on.
pub trait Surface: Send + 'static {
    /// Create the visual elements.
    fn attach(&mut self);
    fn show(&mut self);
    fn hide(&mut self);
    /// Redraw the spinner at `degrees`.
    fn draw(&mut self, degrees: u16);
    /// Destroy the visual elements.
    fn detach(&mut self);
    /// Whether the target is still present.
    fn is_attached(&self) -> bool;
}

/// Redraw timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyConfig {
    pub speed: Duration,
    pub increment: u16,
}

impl Default for BusyConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            increment: DEFAULT_INCREMENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Active,
    Stopped,
    Removed,
}

struct Inner<S> {
    phase: Phase,
    surface: Option<S>,
    degrees: u16,
    timer: Option<JoinHandle<()>>,
    config: BusyConfig,
}

impl<S: Surface> Inner<S> {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn remove(&mut self) {
        self.cancel_timer();
        if let Some(mut surface) = self.surface.take() {
            surface.detach();
        }
        self.phase = Phase::Removed;
    }

    /// Returns false once the timer should stop.
    fn tick(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        let attached = self.surface.as_ref().is_some_and(|s| s.is_attached());
        if !attached {
            debug!("Busy indicator target is gone, removing");
            // Dropping the handle of the running task; no abort needed.
            self.timer = None;
            self.remove();
            return false;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.draw(self.degrees);
        }
        self.degrees = self.degrees.saturating_add(self.config.increment);
        if self.degrees > 359 {
            self.degrees = 1;
        }
        true
    }
}

/// Spinner overlay attached to a surface.
pub struct BusyIndicator<S: Surface> {
    inner: Arc<Mutex<Inner<S>>>,
}

impl<S: Surface> BusyIndicator<S> {
    pub fn new(surface: S, config: BusyConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Uninitialized,
                surface: Some(surface),
                degrees: 1,
                timer: None,
                config,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Current rotation in degrees.
    pub fn degrees(&self) -> u16 {
        self.lock().degrees
    }

    /// Attach the surface and start spinning. No-op unless uninitialized.
    pub fn init(&self) {
        {
            let mut inner = self.lock();
            if inner.phase != Phase::Uninitialized {
                return;
            }
            if let Some(surface) = inner.surface.as_mut() {
                surface.attach();
            }
            inner.phase = Phase::Stopped;
        }
        self.start();
    }

    /// Show the surface and (re)start the timer.
    pub fn start(&self) {
        let mut inner = self.lock();
        if matches!(inner.phase, Phase::Uninitialized | Phase::Removed) {
            return;
        }
        if let Some(surface) = inner.surface.as_mut() {
            surface.show();
        }
        inner.cancel_timer();
        inner.phase = Phase::Active;
        inner.timer = self.spawn_timer(inner.config.speed);
    }

    /// Hide the surface and cancel the timer, keeping it attached.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if matches!(inner.phase, Phase::Uninitialized | Phase::Removed) {
            return;
        }
        inner.cancel_timer();
        if let Some(surface) = inner.surface.as_mut() {
            surface.hide();
        }
        inner.phase = Phase::Stopped;
    }

    /// Cancel the timer and detach the surface for good.
    pub fn remove(&self) {
        let mut inner = self.lock();
        if matches!(inner.phase, Phase::Uninitialized | Phase::Removed) {
            return;
        }
        inner.remove();
    }

    /// Initialize on first use, otherwise restart.
    pub fn activate(&self) {
        if self.phase() == Phase::Uninitialized {
            self.init();
        } else {
            self.start();
        }
    }

    /// Advance one frame. Called by the timer task.
    pub fn tick(&self) -> bool {
        self.lock().tick()
    }

    fn spawn_timer(&self, speed: Duration) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, busy indicator will not animate");
            return None;
        };
        let inner = Arc::clone(&self.inner);
        Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(speed);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let keep_going = inner.lock().unwrap_or_else(PoisonError::into_inner).tick();
                if !keep_going {
                    break;
                }
            }
        }))
    }
}

const SPINNER_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Terminal spinner rendered with indicatif.
pub struct TerminalSurface {
    message: String,
    bar: Option<ProgressBar>,
}

impl TerminalSurface {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            bar: None,
        }
    }
}

impl Surface for TerminalSurface {
    fn attach(&mut self) {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        if let Ok(style) = ProgressStyle::with_template("{prefix:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(self.message.clone());
        self.bar = Some(bar);
    }

    fn show(&mut self) {
        if let Some(ref bar) = self.bar {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }
    }

    fn hide(&mut self) {
        if let Some(ref bar) = self.bar {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
    }

    fn draw(&mut self, degrees: u16) {
        if let Some(ref bar) = self.bar {
            let frame = usize::from(degrees) * SPINNER_FRAMES.len() / 360;
            bar.set_prefix(SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]);
            bar.tick();
        }
    }

    fn detach(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn is_attached(&self) -> bool {
        self.bar.as_ref().is_some_and(|bar| !bar.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Calls {
        log: Mutex<Vec<String>>,
        gone: AtomicBool,
    }

    struct FakeSurface(Arc<Calls>);

    impl FakeSurface {
        fn push(&self, call: impl Into<String>) {
            self.0.log.lock().unwrap().push(call.into());
        }
    }

    impl Surface for FakeSurface {
        fn attach(&mut self) {
            self.push("attach");
        }
        fn show(&mut self) {
            self.push("show");
        }
        fn hide(&mut self) {
            self.push("hide");
        }
        fn draw(&mut self, degrees: u16) {
            self.push(format!("draw {degrees}"));
        }
        fn detach(&mut self) {
            self.push("detach");
        }
        fn is_attached(&self) -> bool {
            !self.0.gone.load(Ordering::SeqCst)
        }
    }

    fn indicator(increment: u16) -> (BusyIndicator<FakeSurface>, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let config = BusyConfig {
            speed: Duration::from_millis(8),
            increment,
        };
        (
            BusyIndicator::new(FakeSurface(Arc::clone(&calls)), config),
            calls,
        )
    }

    fn log(calls: &Calls) -> Vec<String> {
        calls.log.lock().unwrap().clone()
    }

    #[test]
    fn test_operations_before_init_are_ignored() {
        let (busy, calls) = indicator(2);
        busy.start();
        busy.stop();
        busy.remove();
        assert!(!busy.tick());
        assert_eq!(busy.phase(), Phase::Uninitialized);
        assert!(log(&calls).is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let (busy, calls) = indicator(2);
        busy.init();
        busy.init();
        assert_eq!(busy.phase(), Phase::Active);
        assert_eq!(log(&calls), vec!["attach", "show"]);
    }

    #[test]
    fn test_tick_rotates_and_wraps() {
        let (busy, calls) = indicator(120);
        busy.init();
        assert!(busy.tick());
        assert_eq!(busy.degrees(), 121);
        assert!(busy.tick());
        assert_eq!(busy.degrees(), 241);
        assert!(busy.tick());
        // 361 wraps back to 1
        assert_eq!(busy.degrees(), 1);
        assert!(log(&calls).ends_with(&[
            "draw 1".to_string(),
            "draw 121".to_string(),
            "draw 241".to_string()
        ]));
    }

    #[test]
    fn test_stop_hides_without_detaching() {
        let (busy, calls) = indicator(2);
        busy.init();
        busy.stop();
        assert_eq!(busy.phase(), Phase::Stopped);
        assert!(!busy.tick());
        busy.start();
        assert_eq!(busy.phase(), Phase::Active);
        assert_eq!(log(&calls), vec!["attach", "show", "hide", "show"]);
    }

    #[test]
    fn test_activate_inits_then_restarts() {
        let (busy, calls) = indicator(2);
        busy.activate();
        busy.stop();
        busy.activate();
        assert_eq!(log(&calls), vec!["attach", "show", "hide", "show"]);
    }

    #[test]
    fn test_tick_self_removes_when_target_is_gone() {
        let (busy, calls) = indicator(2);
        busy.init();
        calls.gone.store(true, Ordering::SeqCst);
        assert!(!busy.tick());
        assert_eq!(busy.phase(), Phase::Removed);
        assert_eq!(log(&calls).last().map(String::as_str), Some("detach"));
    }

    #[test]
    fn test_remove_is_terminal() {
        let (busy, calls) = indicator(2);
        busy.init();
        busy.remove();
        busy.init();
        busy.start();
        assert_eq!(busy.phase(), Phase::Removed);
        assert_eq!(log(&calls), vec!["attach", "show", "detach"]);
    }

    #[tokio::test]
    async fn test_timer_draws_while_active() {
        let (busy, calls) = indicator(2);
        busy.init();
        tokio::time::sleep(Duration::from_millis(60)).await;
        busy.stop();
        let draws = log(&calls).iter().filter(|c| c.starts_with("draw")).count();
        assert!(draws > 0);
        let after_stop = log(&calls).len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(log(&calls).len(), after_stop);
    }

    #[test]
    fn test_terminal_surface_lifecycle() {
        let mut surface = TerminalSurface::new("Checking");
        assert!(!surface.is_attached());
        surface.attach();
        assert!(surface.is_attached());
        surface.draw(180);
        surface.detach();
        assert!(!surface.is_attached());
    }
}
