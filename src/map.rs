use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::MapConfig;
use crate::models::{LatLng, ReviewId};

/// Events emitted by visitor input on the map
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Visitor clicked an empty part of the map
    LocationChosen { lat: f64, lng: f64 },
    /// Visitor clicked a marker
    MarkerSelected {
        id: ReviewId,
        lat: f64,
        lng: f64,
        content: String,
    },
}

/// Source of the visitor's current position
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<LatLng>;
}

/// Geolocation is unavailable in this environment
pub struct NoGeolocation;

#[async_trait]
impl Geolocator for NoGeolocation {
    async fn locate(&self) -> Result<LatLng> {
        anyhow::bail!("geolocation is not supported")
    }
}

/// Always reports the same position
pub struct FixedLocation(pub LatLng);

#[async_trait]
impl Geolocator for FixedLocation {
    async fn locate(&self) -> Result<LatLng> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
}

/// Visual marker for one review
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: LatLng,
    pub content: String,
}

/// Map viewport plus the review-id to marker table
pub struct MapSurface {
    config: MapConfig,
    viewport: Viewport,
    markers: HashMap<ReviewId, Marker>,
    open_popup: Option<ReviewId>,
    initialized: bool,
    events: UnboundedSender<MapEvent>,
}

impl MapSurface {
    /// Create the surface and the receiving end of its event stream
    pub fn new(config: MapConfig) -> (Self, UnboundedReceiver<MapEvent>) {
        let (events, receiver) = unbounded_channel();
        let viewport = Viewport {
            center: config.center,
            zoom: config.clamp_zoom(config.zoom),
        };

        let surface = Self {
            config,
            viewport,
            markers: HashMap::new(),
            open_popup: None,
            initialized: false,
            events,
        };

        (surface, receiver)
    }

    /// Set the default view, then try to recenter on the visitor
    pub async fn initialize(&mut self, geolocator: &dyn Geolocator) {
        self.set_view(self.config.center, self.config.zoom);

        let timeout = Duration::from_millis(self.config.geolocation_timeout_ms);
        match tokio::time::timeout(timeout, geolocator.locate()).await {
            Ok(Ok(position)) => {
                debug!(lat = position.lat, lng = position.lng, "Centering on visitor");
                self.set_view(position, self.config.zoom);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Geolocation failed, using default center");
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.geolocation_timeout_ms,
                    "Geolocation timed out, using default center"
                );
            }
        }

        self.initialized = true;
        info!(
            lat = self.viewport.center.lat,
            lng = self.viewport.center.lng,
            zoom = self.viewport.zoom,
            "Map initialized"
        );
    }

    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.viewport = Viewport {
            center,
            zoom: self.config.clamp_zoom(zoom),
        };
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Create or replace the marker for `id`
    pub fn place_marker(&mut self, id: ReviewId, lat: f64, lng: f64, content: String) {
        let marker = Marker {
            position: LatLng::new(lat, lng),
            content,
        };
        if self.markers.insert(id.clone(), marker).is_some() {
            debug!(%id, "Replaced marker");
        }
    }

    pub fn remove_marker(&mut self, id: &ReviewId) {
        if self.markers.remove(id).is_some() && self.open_popup.as_ref() == Some(id) {
            self.open_popup = None;
        }
    }

    /// Remove every marker
    pub fn clear_markers(&mut self) {
        self.markers.clear();
        self.open_popup = None;
    }

    pub fn update_marker_content(&mut self, id: &ReviewId, content: String) {
        if let Some(marker) = self.markers.get_mut(id) {
            marker.content = content;
        }
    }

    /// Recenter on a marker, keeping the current zoom
    pub fn focus_on(&mut self, id: &ReviewId) -> bool {
        match self.markers.get(id) {
            Some(marker) => {
                self.viewport.center = marker.position;
                true
            }
            None => false,
        }
    }

    pub fn reveal_popup(&mut self, id: &ReviewId) -> bool {
        if self.markers.contains_key(id) {
            self.open_popup = Some(id.clone());
            true
        } else {
            false
        }
    }

    pub fn open_popup(&self) -> Option<&ReviewId> {
        self.open_popup.as_ref()
    }

    pub fn marker(&self, id: &ReviewId) -> Option<&Marker> {
        self.markers.get(id)
    }

    pub fn marker_ids(&self) -> impl Iterator<Item = &ReviewId> {
        self.markers.keys()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Visitor clicked empty map area
    pub fn click(&self, lat: f64, lng: f64) {
        if !self.initialized {
            debug!("Ignoring click before map initialization");
            return;
        }
        self.emit(MapEvent::LocationChosen { lat, lng });
    }

    /// Visitor clicked the marker for `id`
    pub fn click_marker(&self, id: &ReviewId) {
        if !self.initialized {
            return;
        }
        if let Some(marker) = self.markers.get(id) {
            self.emit(MapEvent::MarkerSelected {
                id: id.clone(),
                lat: marker.position.lat,
                lng: marker.position.lng,
                content: marker.content.clone(),
            });
        }
    }

    fn emit(&self, event: MapEvent) {
        // Nobody listening is not an error
        if self.events.send(event).is_err() {
            debug!("Map event dropped, no receiver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct NeverAnswers;

    #[async_trait]
    impl Geolocator for NeverAnswers {
        async fn locate(&self) -> Result<LatLng> {
            std::future::pending().await
        }
    }

    fn surface() -> (MapSurface, UnboundedReceiver<MapEvent>) {
        MapSurface::new(MapConfig::default())
    }

    #[tokio::test]
    async fn test_initialize_uses_geolocation() {
        let (mut map, _rx) = surface();
        map.initialize(&FixedLocation(LatLng::new(48.85, 2.35))).await;

        assert_eq!(map.viewport().center, LatLng::new(48.85, 2.35));
        assert_eq!(map.viewport().zoom, 10.0);
    }

    #[tokio::test]
    async fn test_initialize_falls_back_when_unsupported() {
        let (mut map, _rx) = surface();
        map.initialize(&NoGeolocation).await;

        assert_eq!(map.viewport().center, MapConfig::default().center);
    }

    #[tokio::test]
    async fn test_initialize_falls_back_on_timeout() {
        let (mut map, _rx) = MapSurface::new(MapConfig {
            geolocation_timeout_ms: 10,
            ..MapConfig::default()
        });
        map.initialize(&NeverAnswers).await;

        assert_eq!(map.viewport().center, MapConfig::default().center);
    }

    #[tokio::test]
    async fn test_click_emits_location_after_initialize() {
        let (mut map, mut rx) = surface();

        map.click(1.0, 2.0);
        assert!(rx.try_recv().is_err());

        map.initialize(&NoGeolocation).await;
        map.click(1.0, 2.0);
        assert_eq!(
            rx.try_recv().unwrap(),
            MapEvent::LocationChosen { lat: 1.0, lng: 2.0 }
        );
    }

    #[tokio::test]
    async fn test_click_marker_emits_selection() {
        let (mut map, mut rx) = surface();
        map.initialize(&NoGeolocation).await;
        map.place_marker("r1".into(), 3.0, 4.0, "hello".to_string());

        map.click_marker(&"r1".into());
        map.click_marker(&"missing".into());

        assert_eq!(
            rx.try_recv().unwrap(),
            MapEvent::MarkerSelected {
                id: "r1".into(),
                lat: 3.0,
                lng: 4.0,
                content: "hello".to_string(),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_marker_set_tracks_place_and_remove() {
        let (mut map, _rx) = surface();
        let ops: &[(&str, bool)] = &[
            ("a", true),
            ("b", true),
            ("a", true),
            ("c", true),
            ("b", false),
            ("zz", false),
            ("b", false),
            ("d", true),
        ];

        let mut expected = HashSet::new();
        for (id, place) in ops {
            if *place {
                map.place_marker((*id).into(), 0.0, 0.0, String::new());
                expected.insert(id.to_string());
            } else {
                map.remove_marker(&(*id).into());
                expected.remove(*id);
            }
        }

        let actual: HashSet<String> = map.marker_ids().map(|id| id.to_string()).collect();
        assert_eq!(actual, expected);
        assert_eq!(map.marker_count(), 3);
    }

    #[test]
    fn test_place_marker_replaces() {
        let (mut map, _rx) = surface();
        map.place_marker("a".into(), 1.0, 1.0, "old".to_string());
        map.place_marker("a".into(), 2.0, 2.0, "new".to_string());

        let marker = map.marker(&"a".into()).unwrap();
        assert_eq!(marker.position, LatLng::new(2.0, 2.0));
        assert_eq!(marker.content, "new");
        assert_eq!(map.marker_count(), 1);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (mut map, _rx) = surface();
        let before = map.viewport();

        map.remove_marker(&"x".into());
        map.update_marker_content(&"x".into(), "c".to_string());
        assert!(!map.focus_on(&"x".into()));
        assert!(!map.reveal_popup(&"x".into()));

        assert_eq!(map.viewport(), before);
        assert!(map.open_popup().is_none());
        assert_eq!(map.marker_count(), 0);
    }

    #[test]
    fn test_focus_and_reveal() {
        let (mut map, _rx) = surface();
        map.set_view(LatLng::new(0.0, 0.0), 14.0);
        map.place_marker("a".into(), 10.0, 20.0, String::new());

        assert!(map.focus_on(&"a".into()));
        assert!(map.reveal_popup(&"a".into()));

        assert_eq!(map.viewport().center, LatLng::new(10.0, 20.0));
        assert_eq!(map.viewport().zoom, 14.0);
        assert_eq!(map.open_popup(), Some(&"a".into()));

        map.remove_marker(&"a".into());
        assert!(map.open_popup().is_none());
    }

    #[test]
    fn test_set_view_clamps_zoom() {
        let (mut map, _rx) = surface();
        map.set_view(LatLng::new(0.0, 0.0), 40.0);
        assert_eq!(map.viewport().zoom, 18.0);
    }
}
