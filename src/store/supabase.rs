use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info, instrument};

use super::RemoteStore;
use crate::config::{Config, TablesConfig, UploadConfig};
use crate::models::{NewLike, NewReview, ReviewId, StoredReview};

/// Client for a Supabase project: PostgREST tables plus the storage API
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
    tables: TablesConfig,
    bucket: String,
    cache_control_secs: u32,
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        tables: TablesConfig,
        uploads: &UploadConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            tables,
            bucket: uploads.bucket.clone(),
            cache_control_secs: uploads.cache_control_secs,
        }
    }

    /// Build a client from the `store` section of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = config
            .store
            .url
            .as_deref()
            .context("Store URL not configured (store.url or SUPABASE_URL)")?;
        let key = config
            .store
            .anon_key
            .as_deref()
            .context("Store key not configured (store.anon_key or SUPABASE_ANON_KEY)")?;

        Ok(Self::new(url, key, config.tables.clone(), &config.uploads))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} failed ({}): {}", what, status, error_text);
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    #[instrument(skip(self), fields(table = %self.tables.reviews))]
    async fn fetch_reviews(&self) -> Result<Vec<StoredReview>> {
        debug!("Fetching reviews");

        let response = self
            .authorized(self.client.get(self.table_url(&self.tables.reviews)))
            .query(&[
                ("select", format!("*,{}(count)", self.tables.likes)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await
            .context("Failed to send review query")?;

        let reviews: Vec<StoredReview> = Self::check(response, "Review query")
            .await?
            .json()
            .await
            .context("Failed to parse review rows")?;

        info!(count = reviews.len(), "Fetched reviews");

        Ok(reviews)
    }

    #[instrument(skip(self, review), fields(table = %self.tables.reviews))]
    async fn insert_review(&self, review: &NewReview) -> Result<StoredReview> {
        let response = self
            .authorized(self.client.post(self.table_url(&self.tables.reviews)))
            .header("Prefer", "return=representation")
            .json(&[review])
            .send()
            .await
            .context("Failed to send review insert")?;

        let rows: Vec<StoredReview> = Self::check(response, "Review insert")
            .await?
            .json()
            .await
            .context("Failed to parse inserted review")?;

        let stored = rows
            .into_iter()
            .next()
            .context("Review insert returned no rows")?;

        debug!(id = %stored.id, "Inserted review");

        Ok(stored)
    }

    #[instrument(skip(self), fields(table = %self.tables.likes))]
    async fn insert_like(&self, review_id: &ReviewId) -> Result<()> {
        let like = NewLike {
            review_id: review_id.clone(),
        };

        let response = self
            .authorized(self.client.post(self.table_url(&self.tables.likes)))
            .header("Prefer", "return=minimal")
            .json(&[like])
            .send()
            .await
            .context("Failed to send like insert")?;

        Self::check(response, "Like insert").await?;

        debug!("Inserted like");

        Ok(())
    }

    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()))]
    async fn upload_blob(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.object_url(path)))
            .header("Content-Type", content_type)
            .header("cache-control", format!("max-age={}", self.cache_control_secs))
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .context("Failed to send photo upload")?;

        Self::check(response, "Photo upload").await?;

        info!(path, "Uploaded photo");

        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> SupabaseStore {
        SupabaseStore::new(
            &server.uri(),
            "test-key",
            TablesConfig::default(),
            &UploadConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_fetch_reviews() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/reviews"))
            .and(query_param("select", "*,likes(count)"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "test-key"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "r1",
                    "text": "Great spot",
                    "photo_url": null,
                    "latitude": 55.75,
                    "longitude": 37.61,
                    "created_at": "2024-01-01T00:00:00Z",
                    "likes": [{"count": 3}]
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let reviews = store_for(&server).fetch_reviews().await.unwrap();

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, ReviewId::new("r1"));
        assert_eq!(reviews[0].like_count(), 3);
    }

    #[tokio::test]
    async fn test_fetch_reviews_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/reviews"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = store_for(&server).fetch_reviews().await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_insert_review_returns_stored_row() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/reviews"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!([{
                "text": "Nice",
                "photo_url": "public/a.png",
                "latitude": 55.0,
                "longitude": 37.0
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": 17,
                "text": "Nice",
                "photo_url": "public/a.png",
                "latitude": 55.0,
                "longitude": 37.0,
                "created_at": "2024-05-01T12:00:00Z"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let stored = store_for(&server)
            .insert_review(&NewReview {
                text: "Nice".to_string(),
                photo_url: Some("public/a.png".to_string()),
                latitude: 55.0,
                longitude: 37.0,
            })
            .await
            .unwrap();

        assert_eq!(stored.id.as_str(), "17");
        assert_eq!(stored.like_count(), 0);
    }

    #[tokio::test]
    async fn test_insert_review_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/reviews"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .insert_review(&NewReview {
                text: "Nice".to_string(),
                photo_url: None,
                latitude: 0.0,
                longitude: 0.0,
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_insert_like() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/likes"))
            .and(body_json(json!([{"review_id": "r1"}])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .insert_like(&ReviewId::new("r1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_blob_rejects_collision() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/reviews-photos/public/taken.png"))
            .and(header("x-upsert", "false"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Duplicate"))
            .expect(1)
            .mount(&server)
            .await;

        let result = store_for(&server)
            .upload_blob("public/taken.png", "image/png", vec![1, 2, 3])
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_upload_blob() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/storage/v1/object/reviews-photos/public/new.jpg"))
            .and(header("Content-Type", "image/jpeg"))
            .and(header("cache-control", "max-age=3600"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "reviews-photos/public/new.jpg"})))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .upload_blob("public/new.jpg", "image/jpeg", vec![0xff, 0xd8])
            .await
            .unwrap();
    }

    #[test]
    fn test_public_url() {
        let store = SupabaseStore::new(
            "https://demo.supabase.co/",
            "key",
            TablesConfig::default(),
            &UploadConfig::default(),
        );

        assert_eq!(
            store.public_url("public/a.png"),
            "https://demo.supabase.co/storage/v1/object/public/reviews-photos/public/a.png"
        );
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = Config::default();
        assert!(SupabaseStore::from_config(&config).is_err());
    }
}
