pub mod supabase;

pub use supabase::SupabaseStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{NewReview, ReviewId, StoredReview};

/// Remote record and blob storage backing the review directory
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every review with its like count, newest first
    async fn fetch_reviews(&self) -> Result<Vec<StoredReview>>;

    /// Create a review and return the stored record
    async fn insert_review(&self, review: &NewReview) -> Result<StoredReview>;

    /// Record one like for a review
    async fn insert_like(&self, review_id: &ReviewId) -> Result<()>;

    /// Store a blob under a caller-chosen path, failing if the path is taken
    async fn upload_blob(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetchable URL for a stored blob path
    fn public_url(&self, path: &str) -> String;
}
