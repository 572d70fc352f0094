use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::config::Config;
use crate::directory::ReviewDirectory;
use crate::error::DirectoryError;
use crate::map::{Geolocator, MapEvent, MapSurface};
use crate::models::{LatLng, PhotoFile, ReviewId};
use crate::store::RemoteStore;

/// Wires map events to the review directory for one visitor
pub struct Session<S: RemoteStore> {
    directory: ReviewDirectory<S>,
    events: UnboundedReceiver<MapEvent>,
    draft: Option<LatLng>,
    selected: Option<ReviewId>,
}

impl<S: RemoteStore> Session<S> {
    pub fn new(store: S, config: Config) -> Self {
        let (map, events) = MapSurface::new(config.map.clone());
        Self {
            directory: ReviewDirectory::new(store, map, config),
            events,
            draft: None,
            selected: None,
        }
    }

    /// Bring up the map, then load reviews
    pub async fn start(&mut self, geolocator: &dyn Geolocator) -> Result<usize, DirectoryError> {
        self.directory.map_mut().initialize(geolocator).await;
        self.directory.initialize().await
    }

    /// Dispatch every event queued since the last call
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    fn dispatch(&mut self, event: MapEvent) {
        match event {
            MapEvent::LocationChosen { lat, lng } => {
                debug!(lat, lng, "Opening review form");
                self.draft = Some(LatLng::new(lat, lng));
            }
            MapEvent::MarkerSelected { id, .. } => {
                debug!(%id, "Marker selected");
                self.directory.highlight(&id);
                self.selected = Some(id);
            }
        }
    }

    /// Submit the open draft; it stays open if the submission fails
    pub async fn submit(
        &mut self,
        text: &str,
        photo: Option<PhotoFile>,
    ) -> Result<Option<ReviewId>, DirectoryError> {
        let Some(location) = self.draft else {
            debug!("No open review form");
            return Ok(None);
        };

        let id = self
            .directory
            .submit_review(location.lat, location.lng, text, photo)
            .await?;

        self.draft = None;
        info!(%id, "Review form submitted");

        Ok(Some(id))
    }

    /// Close the form without submitting
    pub fn cancel(&mut self) {
        self.draft = None;
    }

    pub fn draft(&self) -> Option<LatLng> {
        self.draft
    }

    pub fn selected(&self) -> Option<&ReviewId> {
        self.selected.as_ref()
    }

    pub fn directory(&self) -> &ReviewDirectory<S> {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut ReviewDirectory<S> {
        &mut self.directory
    }
}
