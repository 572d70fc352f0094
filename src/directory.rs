use std::collections::HashMap;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{DirectoryError, ValidationError};
use crate::map::MapSurface;
use crate::models::{NewReview, PhotoFile, Review, ReviewId, SortMode};
use crate::render::{self, Projection};
use crate::store::RemoteStore;

/// Authoritative set of known reviews, mirrored into markers and list views
pub struct ReviewDirectory<S: RemoteStore> {
    store: S,
    map: MapSurface,
    config: Config,
    reviews: HashMap<ReviewId, Review>,
    sort_mode: SortMode,
    carousel_active: bool,
    active: Option<ReviewId>,
    projection: Projection,
}

impl<S: RemoteStore> ReviewDirectory<S> {
    pub fn new(store: S, map: MapSurface, config: Config) -> Self {
        let sort_mode = config.display.default_sort;
        Self {
            store,
            map,
            config,
            reviews: HashMap::new(),
            sort_mode,
            carousel_active: false,
            active: None,
            projection: Projection::default(),
        }
    }

    /// Replace the in-memory set with the store's contents
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<usize, DirectoryError> {
        let fetched = self.store.fetch_reviews().await;

        // Clear only once the fetch has resolved so no half-filled set is observable.
        self.reviews.clear();
        self.map.clear_markers();
        self.active = None;

        let stored = match fetched {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = ?e, "Failed to load reviews");
                self.render();
                return Err(DirectoryError::Load(e));
            }
        };

        for row in stored {
            let review = row.into_review();
            self.place(&review);
            self.reviews.insert(review.id.clone(), review);
        }

        self.render();

        info!(count = self.reviews.len(), "Loaded reviews");

        Ok(self.reviews.len())
    }

    /// Reject photos that are too large or of a disallowed type
    pub fn validate_photo(&self, photo: &PhotoFile) -> Result<(), ValidationError> {
        let max = self.config.uploads.max_file_size;
        if photo.size() > max {
            return Err(ValidationError::FileTooLarge {
                size: photo.size(),
                max,
            });
        }

        if !self.config.is_allowed_type(&photo.content_type) {
            return Err(ValidationError::UnsupportedType {
                content_type: photo.content_type.clone(),
                allowed: self.config.uploads.allowed_types.clone(),
            });
        }

        Ok(())
    }

    /// Upload the optional photo, create the review, then mirror it locally
    #[instrument(skip(self, text, photo), fields(has_photo = photo.is_some()))]
    pub async fn submit_review(
        &mut self,
        lat: f64,
        lng: f64,
        text: &str,
        photo: Option<PhotoFile>,
    ) -> Result<ReviewId, DirectoryError> {
        if let Some(photo) = &photo {
            self.validate_photo(photo)?;
        }

        let photo_path = match photo {
            Some(photo) => {
                let path = self.blob_path(&photo);
                self.store
                    .upload_blob(&path, &photo.content_type, photo.bytes)
                    .await
                    .map_err(|e| {
                        error!(error = ?e, path = %path, "Photo upload failed");
                        DirectoryError::Upload(e)
                    })?;
                Some(path)
            }
            None => None,
        };

        let new_review = NewReview {
            text: text.to_string(),
            photo_url: photo_path.clone(),
            latitude: lat,
            longitude: lng,
        };

        let stored = self.store.insert_review(&new_review).await.map_err(|e| {
            error!(error = ?e, "Review insert failed");
            if let Some(path) = &photo_path {
                warn!(path = %path, "Uploaded photo left without a review");
            }
            DirectoryError::Create(e)
        })?;

        let mut review = stored.into_review();
        review.likes = 0;
        let id = review.id.clone();

        self.place(&review);
        self.reviews.insert(id.clone(), review);
        self.render();

        info!(%id, "Review added");

        Ok(id)
    }

    /// Record a like and bump the local count by one.
    ///
    /// Returns the new local count, or `None` when the review is not loaded.
    #[instrument(skip(self))]
    pub async fn like(&mut self, id: &ReviewId) -> Result<Option<u64>, DirectoryError> {
        self.store.insert_like(id).await.map_err(|e| {
            error!(error = ?e, "Like insert failed");
            DirectoryError::Like(e)
        })?;

        let preview_chars = self.config.display.preview_chars;
        let Some(review) = self.reviews.get_mut(id) else {
            warn!("Liked a review that is not loaded locally");
            return Ok(None);
        };

        review.likes += 1;
        let likes = review.likes;
        let content = render::preview_html(review, preview_chars);
        self.map.update_marker_content(id, content);
        self.render();

        Ok(Some(likes))
    }

    /// Recompute every list projection from the in-memory set
    pub fn render(&mut self) -> &Projection {
        let store = &self.store;
        let list = render::cards(
            self.reviews.values(),
            self.sort_mode,
            self.active.as_ref(),
            |path| store.public_url(path),
        );
        let carousel = self.carousel_active.then(|| list.clone());

        self.projection = Projection { list, carousel };
        &self.projection
    }

    /// Handle a click on a displayed item
    pub fn select(&mut self, id: &ReviewId) -> bool {
        if !self.reviews.contains_key(id) {
            return false;
        }

        self.map.focus_on(id);
        self.map.reveal_popup(id);
        self.active = Some(id.clone());
        self.render();
        true
    }

    /// Mark a review as active without moving the map
    pub fn highlight(&mut self, id: &ReviewId) {
        if self.reviews.contains_key(id) {
            self.active = Some(id.clone());
            self.render();
        }
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.sort_mode = mode;
        self.render();
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn set_carousel_active(&mut self, active: bool) {
        self.carousel_active = active;
        self.render();
    }

    /// Last rendered projection
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn get(&self, id: &ReviewId) -> Option<&Review> {
        self.reviews.get(id)
    }

    pub fn reviews(&self) -> impl Iterator<Item = &Review> {
        self.reviews.values()
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn map(&self) -> &MapSurface {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapSurface {
        &mut self.map
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn place(&mut self, review: &Review) {
        let content = render::preview_html(review, self.config.display.preview_chars);
        self.map.place_marker(
            review.id.clone(),
            review.location.lat,
            review.location.lng,
            content,
        );
    }

    fn blob_path(&self, photo: &PhotoFile) -> String {
        format!(
            "{}/{}-{}.{}",
            self.config.uploads.path_prefix,
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            photo.extension()
        )
    }
}
