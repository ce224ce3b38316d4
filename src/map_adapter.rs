// Interactive Map Adapter
// Owns the gesture-capable map widget and translates its events into store writes.
// Reads the store only once, at initialization.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::error::WidgetError;
use crate::geodesic::wrap_longitude;
use crate::models::{CameraPose, EntryPoint, ViewState};
use crate::view_state::ViewStateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveEvent {
    pub pose: CameraPose,
    /// False when the widget moves itself (e.g. animating a `recenter`).
    pub user_initiated: bool,
}

/// Receives the clicked point as (longitude, latitude) in degrees.
pub type ClickHandler = Arc<dyn Fn(f64, f64) + Send + Sync>;
pub type MoveHandler = Arc<dyn Fn(MoveEvent) + Send + Sync>;

/// Narrow surface over a third-party map widget.
pub trait MapWidget {
    fn initialize(&mut self, view: &ViewState) -> Result<(), WidgetError>;
    fn on_click(&mut self, handler: ClickHandler) -> Result<ListenerId, WidgetError>;
    fn on_move(&mut self, handler: MoveHandler) -> Result<ListenerId, WidgetError>;
    fn remove_listener(&mut self, id: ListenerId);
    fn recenter(&mut self, entry: EntryPoint, duration: Duration);
    fn dispose(&mut self) -> Result<(), WidgetError>;
}

pub struct InteractiveMap<W: MapWidget> {
    widget: W,
    listeners: Vec<ListenerId>,
    store: Arc<ViewStateStore>,
    pending_recenter: Arc<Mutex<Option<EntryPoint>>>,
    released: bool,
}

impl<W: MapWidget> InteractiveMap<W> {
    /// Initialize `widget` at the store's current view and attach listeners.
    /// On any failure the widget is released before the error is returned.
    pub fn new(widget: W, store: Arc<ViewStateStore>) -> Result<Self, WidgetError> {
        let mut map = Self {
            widget,
            listeners: Vec::new(),
            store,
            pending_recenter: Arc::new(Mutex::new(None)),
            released: false,
        };

        // `map` is dropped (and released) on every early return below.
        let initial = map.store.view();
        map.widget.initialize(&initial)?;

        let click: ClickHandler = {
            let store = map.store.clone();
            let pending = map.pending_recenter.clone();
            Arc::new(move |lon: f64, lat: f64| match EntryPoint::new(wrap_longitude(lon), lat) {
                Ok(entry) => {
                    store.set_entry_point(entry);
                    *pending.lock() = Some(entry);
                }
                Err(err) => tracing::warn!(lon, lat, %err, "ignoring click outside map domain"),
            })
        };
        let id = map.widget.on_click(click)?;
        map.listeners.push(id);

        let on_move: MoveHandler = {
            let store = map.store.clone();
            Arc::new(move |event: MoveEvent| {
                if event.user_initiated {
                    store.apply_gesture(event.pose);
                }
            })
        };
        let id = map.widget.on_move(on_move)?;
        map.listeners.push(id);

        tracing::info!(
            lon = initial.longitude,
            lat = initial.latitude,
            zoom = initial.zoom,
            "interactive map attached"
        );
        Ok(map)
    }

    /// Forward the latest clicked entry point to the widget's own camera animation.
    pub fn flush(&mut self) -> Option<EntryPoint> {
        let entry = self.pending_recenter.lock().take()?;
        self.widget.recenter(entry, self.store.ease_duration());
        Some(entry)
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    /// Detach listeners and dispose the widget, reporting disposal failure.
    pub fn close(mut self) -> Result<(), WidgetError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), WidgetError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        for id in self.listeners.drain(..) {
            self.widget.remove_listener(id);
        }
        self.widget.dispose()
    }
}

impl<W: MapWidget> Drop for InteractiveMap<W> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(%err, "map widget release failed");
        }
    }
}

// =============================================================================
// HEADLESS WIDGET
// =============================================================================

#[derive(Default)]
struct HeadlessInner {
    camera: Option<ViewState>,
    clicks: Vec<(ListenerId, ClickHandler)>,
    moves: Vec<(ListenerId, MoveHandler)>,
    next_id: u64,
    recenters: Vec<EntryPoint>,
    disposed: bool,
}

/// Map widget without a rendering surface. Used by the CLI shell and tests;
/// clones share the same widget, so a clone can drive clicks and drags.
#[derive(Clone, Default)]
pub struct HeadlessMap {
    inner: Arc<Mutex<HeadlessInner>>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click(&self, lon: f64, lat: f64) {
        let handlers: Vec<ClickHandler> = self
            .inner
            .lock()
            .clicks
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(lon, lat);
        }
    }

    /// Simulate a user pan/zoom/rotate/tilt ending at `pose`.
    pub fn drag_to(&self, pose: CameraPose) {
        self.emit_move(MoveEvent {
            pose,
            user_initiated: true,
        });
    }

    pub fn camera(&self) -> Option<ViewState> {
        self.inner.lock().camera
    }

    pub fn recenter_requests(&self) -> Vec<EntryPoint> {
        self.inner.lock().recenters.clone()
    }

    pub fn listener_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.clicks.len() + inner.moves.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    fn emit_move(&self, event: MoveEvent) {
        let handlers: Vec<MoveHandler> = {
            let mut inner = self.inner.lock();
            inner.camera = Some(event.pose);
            inner.moves.iter().map(|(_, h)| h.clone()).collect()
        };
        for handler in handlers {
            handler(event);
        }
    }

    fn next_listener(inner: &mut HeadlessInner) -> ListenerId {
        inner.next_id += 1;
        ListenerId(inner.next_id)
    }
}

impl MapWidget for HeadlessMap {
    fn initialize(&mut self, view: &ViewState) -> Result<(), WidgetError> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(WidgetError::Init("widget already disposed".into()));
        }
        inner.camera = Some(*view);
        Ok(())
    }

    fn on_click(&mut self, handler: ClickHandler) -> Result<ListenerId, WidgetError> {
        let mut inner = self.inner.lock();
        let id = Self::next_listener(&mut inner);
        inner.clicks.push((id, handler));
        Ok(id)
    }

    fn on_move(&mut self, handler: MoveHandler) -> Result<ListenerId, WidgetError> {
        let mut inner = self.inner.lock();
        let id = Self::next_listener(&mut inner);
        inner.moves.push((id, handler));
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        let mut inner = self.inner.lock();
        inner.clicks.retain(|(lid, _)| *lid != id);
        inner.moves.retain(|(lid, _)| *lid != id);
    }

    fn recenter(&mut self, entry: EntryPoint, _duration: Duration) {
        let pose = {
            let mut inner = self.inner.lock();
            inner.recenters.push(entry);
            let mut pose = inner
                .camera
                .unwrap_or_else(|| ViewState::centered_on(entry, 0.0));
            pose.longitude = entry.longitude;
            pose.latitude = entry.latitude;
            pose
        };
        // No animation frames here: jump straight to the end pose.
        self.emit_move(MoveEvent {
            pose,
            user_initiated: false,
        });
    }

    fn dispose(&mut self) -> Result<(), WidgetError> {
        let mut inner = self.inner.lock();
        inner.clicks.clear();
        inner.moves.clear();
        inner.disposed = true;
        Ok(())
    }
}
