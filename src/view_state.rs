// View-State Store
// Single owner of the camera pose and the chosen entry point.
//
// Write authority:
//   apply_gesture     - interactive map adapter, all viewport fields
//   set_entry_point   - interactive map adapter (click), entry point + eased re-centre
//   set               - generic partial merge
// Everything else only reads.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::geodesic::wrap_longitude;
use crate::models::{CameraPose, EntryPoint, ViewPatch, ViewState};

pub const DEFAULT_EASE: Duration = Duration::from_millis(600);

pub type Listener = Arc<dyn Fn(&ViewState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: (f64, f64),
    to: (f64, f64),
    started: Instant,
    duration: Duration,
}

impl Transition {
    /// Interpolated (lon, lat) at `now` and whether the transition has finished.
    /// Longitude takes the shorter way round, across the antimeridian if need be.
    fn sample(&self, now: Instant) -> ((f64, f64), bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let t = ease_in_out_cubic(elapsed.as_secs_f64() / self.duration.as_secs_f64());
        let delta_lon = wrap_longitude(self.to.0 - self.from.0);
        let lon = wrap_longitude(self.from.0 + delta_lon * t);
        let lat = self.from.1 + (self.to.1 - self.from.1) * t;
        ((lon, lat), false)
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

struct Inner {
    view: ViewState,
    entry: EntryPoint,
    transition: Option<Transition>,
}

pub struct ViewStateStore {
    inner: RwLock<Inner>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    ease_duration: Duration,
}

impl ViewStateStore {
    pub fn new(initial: ViewState, entry: EntryPoint) -> Self {
        Self::with_ease(initial, entry, DEFAULT_EASE)
    }

    pub fn with_ease(initial: ViewState, entry: EntryPoint, ease_duration: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                view: initial,
                entry,
                transition: None,
            }),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            ease_duration,
        }
    }

    pub fn view(&self) -> ViewState {
        self.inner.read().view
    }

    pub fn entry_point(&self) -> EntryPoint {
        self.inner.read().entry
    }

    pub fn ease_duration(&self) -> Duration {
        self.ease_duration
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner.read().transition.is_some()
    }

    /// Merge the `Some` fields of `patch` into the current view.
    pub fn set(&self, patch: ViewPatch) {
        let changed = {
            let mut inner = self.inner.write();
            let before = inner.view;
            inner.view.apply(&patch);
            (inner.view != before).then_some(inner.view)
        };
        if let Some(view) = changed {
            self.notify(&view);
        }
    }

    /// Live camera pose from a user gesture. Takes over from any running re-centre.
    pub fn apply_gesture(&self, pose: CameraPose) {
        let changed = {
            let mut inner = self.inner.write();
            if inner.transition.take().is_some() {
                tracing::debug!("gesture interrupted eased re-centre");
            }
            let before = inner.view;
            inner.view = pose;
            (inner.view != before).then_some(inner.view)
        };
        if let Some(view) = changed {
            self.notify(&view);
        }
    }

    /// Record a new entry point and start easing the camera towards it.
    pub fn set_entry_point(&self, entry: EntryPoint) {
        self.set_entry_point_at(entry, Instant::now());
    }

    pub fn set_entry_point_at(&self, entry: EntryPoint, now: Instant) {
        let mut inner = self.inner.write();
        inner.entry = entry;
        inner.transition = Some(Transition {
            from: (inner.view.longitude, inner.view.latitude),
            to: (entry.longitude, entry.latitude),
            started: now,
            duration: self.ease_duration,
        });
        tracing::debug!(
            lon = entry.longitude,
            lat = entry.latitude,
            "entry point set, easing view"
        );
    }

    /// Advance the eased re-centre. Returns true while a transition is still running.
    pub fn tick(&self, now: Instant) -> bool {
        let (changed, running) = {
            let mut inner = self.inner.write();
            let Some(transition) = inner.transition else {
                return false;
            };
            let ((lon, lat), done) = transition.sample(now);
            if done {
                inner.transition = None;
            }
            let before = inner.view;
            inner.view.longitude = lon;
            inner.view.latitude = lat;
            ((inner.view != before).then_some(inner.view), !done)
        };
        if let Some(view) = changed {
            self.notify(&view);
        }
        running
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ViewState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, view: &ViewState) {
        // Snapshot so listeners may subscribe/unsubscribe re-entrantly.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(view);
        }
    }
}
