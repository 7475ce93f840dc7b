//! One-shot visibility triggers
//!
//! The embedding host reports viewport and placeholder geometry; the tracker
//! fires each trigger at most once, the first time its placeholder becomes
//! visible enough, and then forgets it.

use crate::config::MediaConfig;
use crate::visibility::geometry::{intersection_ratio, Rect, RootMargin};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Threshold and margin for a single trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerOptions {
    /// Visible fraction that must be exceeded
    pub threshold: f64,
    pub margin: RootMargin,
}

impl TriggerOptions {
    pub fn new(threshold: f64, margin: RootMargin) -> Self {
        Self { threshold, margin }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.loading_threshold, config.root_margin)
    }

    /// Whether a placeholder at `bounds` should fire for `viewport`
    pub fn is_satisfied(&self, bounds: &Rect, viewport: &Rect) -> bool {
        let root = self.margin.expand(viewport);
        let ratio = intersection_ratio(bounds, &root);
        ratio > 0.0 && (ratio > self.threshold || ratio >= 1.0)
    }
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self::from_config(&MediaConfig::default())
    }
}

struct Registration {
    bounds: Rect,
    options: TriggerOptions,
    on_visible: Callback,
    should_load: Arc<AtomicBool>,
}

#[derive(Default)]
struct TrackerState {
    viewport: Option<Rect>,
    registrations: HashMap<u64, Registration>,
    next_id: u64,
}

struct TrackerShared {
    state: Mutex<TrackerState>,
    wake: Notify,
}

impl TrackerShared {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Source of "entered viewport" events for placeholders
#[derive(Clone)]
pub struct VisibilityTracker {
    shared: Arc<TrackerShared>,
}

impl Default for VisibilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                state: Mutex::new(TrackerState::default()),
                wake: Notify::new(),
            }),
        }
    }

    pub fn with_viewport(viewport: Rect) -> Self {
        let tracker = Self::new();
        tracker.set_viewport(viewport);
        tracker
    }

    /// Register a one-shot trigger for a placeholder at `bounds`
    ///
    /// Never fires synchronously; an already-visible placeholder fires on the
    /// next [`tick`](Self::tick).
    pub fn attach<F>(&self, bounds: Rect, options: TriggerOptions, on_visible: F) -> TriggerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let should_load = Arc::new(AtomicBool::new(false));
        let id = {
            let mut state = self.shared.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.registrations.insert(
                id,
                Registration {
                    bounds,
                    options,
                    on_visible: Box::new(on_visible),
                    should_load: Arc::clone(&should_load),
                },
            );
            id
        };
        debug!("Attached visibility trigger {}", id);
        self.shared.wake.notify_one();

        TriggerHandle {
            id,
            shared: Arc::downgrade(&self.shared),
            should_load,
        }
    }

    /// Record the current viewport; evaluation happens on the next tick
    pub fn set_viewport(&self, viewport: Rect) {
        self.shared.lock().viewport = Some(viewport);
        self.shared.wake.notify_one();
    }

    pub fn viewport(&self) -> Option<Rect> {
        self.shared.lock().viewport
    }

    /// Triggers still waiting to fire
    pub fn pending(&self) -> usize {
        self.shared.lock().registrations.len()
    }

    /// Evaluate every registration once, firing those now visible
    ///
    /// Callbacks run after the internal lock is released, so they may attach
    /// new triggers. Returns the number of triggers fired.
    pub fn tick(&self) -> usize {
        let fired: Vec<(u64, Registration)> = {
            let mut state = self.shared.lock();
            let Some(viewport) = state.viewport else {
                return 0;
            };

            let visible: Vec<u64> = state
                .registrations
                .iter()
                .filter(|(_, reg)| reg.options.is_satisfied(&reg.bounds, &viewport))
                .map(|(id, _)| *id)
                .collect();

            visible
                .into_iter()
                .filter_map(|id| state.registrations.remove(&id).map(|reg| (id, reg)))
                .collect()
        };

        let count = fired.len();
        for (id, registration) in fired {
            registration.should_load.store(true, Ordering::Release);
            debug!("Visibility trigger {} fired", id);
            (registration.on_visible)();
        }
        count
    }

    /// Drive the tracker from a stream of viewport updates
    ///
    /// Ticks after every viewport change and every attach. Stops when the
    /// sender side of `viewport_rx` is dropped.
    pub fn spawn_driver(&self, mut viewport_rx: watch::Receiver<Rect>) -> JoinHandle<()> {
        let tracker = self.clone();

        tokio::spawn(async move {
            loop {
                let viewport = *viewport_rx.borrow_and_update();
                tracker.shared.lock().viewport = Some(viewport);
                tracker.tick();

                tokio::select! {
                    changed = viewport_rx.changed() => {
                        if changed.is_err() {
                            debug!("Viewport source closed; stopping visibility driver");
                            break;
                        }
                    }
                    _ = tracker.shared.wake.notified() => {}
                }
            }
        })
    }
}

/// Owner-side handle for a registered trigger
///
/// Dropping the handle detaches the trigger, so a placeholder removed before
/// it became visible never fires.
pub struct TriggerHandle {
    id: u64,
    shared: Weak<TrackerShared>,
    should_load: Arc<AtomicBool>,
}

impl TriggerHandle {
    /// Monotonic: once true, stays true
    pub fn should_load(&self) -> bool {
        self.should_load.load(Ordering::Acquire)
    }

    pub fn is_attached(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.lock().registrations.contains_key(&self.id))
    }

    /// Report a new layout position for the placeholder
    pub fn set_bounds(&self, bounds: Rect) {
        if let Some(shared) = self.shared.upgrade() {
            let updated = match shared.lock().registrations.get_mut(&self.id) {
                Some(registration) => {
                    registration.bounds = bounds;
                    true
                }
                None => false,
            };
            if updated {
                shared.wake.notify_one();
            }
        }
    }

    /// Detach explicitly; equivalent to dropping the handle
    pub fn detach(self) {}
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            if shared.lock().registrations.remove(&self.id).is_some() {
                debug!("Detached visibility trigger {} before it fired", self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 800.0, 600.0)
    }

    #[test]
    fn test_threshold_rule() {
        let options = TriggerOptions::new(0.5, RootMargin::uniform_px(0.0));
        let vp = viewport();

        // 25% visible
        assert!(!options.is_satisfied(&Rect::new(-150.0, 0.0, 200.0, 100.0), &vp));
        // 75% visible
        assert!(options.is_satisfied(&Rect::new(-50.0, 0.0, 200.0, 100.0), &vp));

        let full = TriggerOptions::new(1.0, RootMargin::uniform_px(0.0));
        assert!(full.is_satisfied(&Rect::new(0.0, 0.0, 10.0, 10.0), &vp));
    }

    #[test]
    fn test_margin_extends_viewport() {
        let options = TriggerOptions::new(0.1, RootMargin::uniform_px(100.0));
        let below_fold = Rect::new(0.0, 650.0, 100.0, 100.0);
        assert!(options.is_satisfied(&below_fold, &viewport()));

        let far_below = Rect::new(0.0, 1000.0, 100.0, 100.0);
        assert!(!options.is_satisfied(&far_below, &viewport()));
    }

    #[test]
    fn test_visible_at_attach_fires_on_next_tick_once() {
        let tracker = VisibilityTracker::with_viewport(viewport());
        let (count, callback) = counter();

        let handle = tracker.attach(Rect::new(10.0, 10.0, 50.0, 50.0), TriggerOptions::default(), callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!handle.should_load());

        assert_eq!(tracker.tick(), 1);
        assert_eq!(tracker.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.should_load());
        assert!(!handle.is_attached());
    }

    #[test]
    fn test_dropped_handle_never_fires() {
        let tracker = VisibilityTracker::with_viewport(viewport());
        let (count, callback) = counter();

        let handle = tracker.attach(Rect::new(0.0, 5000.0, 50.0, 50.0), TriggerOptions::default(), callback);
        assert_eq!(tracker.tick(), 0);
        drop(handle);
        assert_eq!(tracker.pending(), 0);

        tracker.set_viewport(Rect::new(0.0, 4800.0, 800.0, 600.0));
        assert_eq!(tracker.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scrolling_into_view() {
        let tracker = VisibilityTracker::with_viewport(viewport());
        let (count, callback) = counter();

        let handle = tracker.attach(Rect::new(0.0, 2000.0, 100.0, 100.0), TriggerOptions::default(), callback);
        assert_eq!(tracker.tick(), 0);

        tracker.set_viewport(Rect::new(0.0, 1500.0, 800.0, 600.0));
        assert_eq!(tracker.tick(), 1);
        assert!(handle.should_load());

        tracker.set_viewport(viewport());
        tracker.set_viewport(Rect::new(0.0, 1500.0, 800.0, 600.0));
        assert_eq!(tracker.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.should_load());
    }

    #[test]
    fn test_no_viewport_no_fire() {
        let tracker = VisibilityTracker::new();
        let (count, callback) = counter();
        let _handle = tracker.attach(Rect::new(0.0, 0.0, 10.0, 10.0), TriggerOptions::default(), callback);

        assert_eq!(tracker.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_set_bounds_moves_placeholder() {
        let tracker = VisibilityTracker::with_viewport(viewport());
        let (count, callback) = counter();
        let handle = tracker.attach(Rect::new(0.0, 3000.0, 10.0, 10.0), TriggerOptions::default(), callback);

        assert_eq!(tracker.tick(), 0);
        handle.set_bounds(Rect::new(0.0, 100.0, 10.0, 10.0));
        assert_eq!(tracker.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
