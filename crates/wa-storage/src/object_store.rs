//! S3-compatible object-store client (C1): the only component in this crate
//! that talks to the network. Everything above it deals in keys and bytes.

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use wa_core::{CoreError, CoreResult};

/// Connection settings for the object store, loaded from the four
/// environment variables the worker binary requires at startup.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub region: String,
    pub key_id: String,
    pub key_secret: String,
    pub bucket_name: String,
    /// Overrides the default AWS endpoint; set for S3-compatible providers
    /// (MinIO, R2, etc.). `None` uses the region's standard AWS endpoint.
    pub endpoint_url: Option<String>,
}

impl BucketConfig {
    /// Reads `BUCKET_REGION`, `BUCKET_KEY_ID`, `BUCKET_KEY_SECRET`, `BUCKET_NAME`.
    /// Fails fast — per spec — if any required variable is absent.
    pub fn from_env() -> CoreResult<Self> {
        dotenvy::dotenv().ok();

        let region = std::env::var("BUCKET_REGION")
            .map_err(|_| CoreError::configuration("BUCKET_REGION environment variable is required"))?;
        let key_id = std::env::var("BUCKET_KEY_ID")
            .map_err(|_| CoreError::configuration("BUCKET_KEY_ID environment variable is required"))?;
        let key_secret = std::env::var("BUCKET_KEY_SECRET")
            .map_err(|_| CoreError::configuration("BUCKET_KEY_SECRET environment variable is required"))?;
        let bucket_name = std::env::var("BUCKET_NAME")
            .map_err(|_| CoreError::configuration("BUCKET_NAME environment variable is required"))?;
        let endpoint_url = std::env::var("BUCKET_ENDPOINT_URL").ok();

        Ok(Self { region, key_id, key_secret, bucket_name, endpoint_url })
    }
}

/// A single object's key and the store's `LastModified` for it, normalized
/// to epoch seconds at this boundary (see open question (a): `LastModified`
/// arrives as a datetime from the SDK; callers downstream — notably the
/// user-directory lock — only ever want epoch seconds).
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified_epoch: f64,
}

pub enum PresignAction {
    Get,
    Put,
}

/// Thin wrapper over the AWS S3 SDK client, scoped to one bucket.
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    pub async fn connect(config: &BucketConfig) -> CoreResult<Self> {
        let credentials = Credentials::new(&config.key_id, &config.key_secret, None, None, "wa-storage");
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);
        Ok(Self { client, bucket: config.bucket_name.clone() })
    }

    /// Builds a client against real AWS endpoints with fake credentials.
    /// Safe for tests that only exercise key-layout logic or return before
    /// any request is sent; a test that actually calls `head`/`get`/`put`/
    /// `list_objects` through this client needs network access and real
    /// credentials, so mark it `#[ignore]` with a reason, same as any other
    /// test with an offline limitation.
    #[cfg(test)]
    pub fn for_testing(bucket: impl Into<String>) -> Self {
        let credentials = Credentials::new("test", "test", None, None, "wa-storage-test");
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .build();
        Self { client: Client::from_conf(config), bucket: bucket.into() }
    }

    /// Returns false on any access error, including "not found" — per
    /// contract this never surfaces an error to the caller.
    pub async fn head(&self, key: &str) -> bool {
        self.client.head_object().bucket(&self.bucket).key(key).send().await.is_ok()
    }

    pub async fn get(&self, key: &str) -> CoreResult<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| CoreError::storage(format!("get_object {key}: {e}")))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| CoreError::storage(format!("reading body for {key}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, mime: &str) -> CoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(mime)
            .send()
            .await
            .map_err(|e| CoreError::storage(format!("put_object {key}: {e}")))?;
        Ok(())
    }

    /// Writes `obj` as stable, UTF-8 JSON.
    pub async fn put_json<T: serde::Serialize>(&self, key: &str, obj: &T) -> CoreResult<()> {
        let bytes = serde_json::to_vec(obj).map_err(CoreError::Serialization)?;
        self.put(key, bytes, "application/json").await
    }

    pub async fn delete(&self, key: &str) -> CoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| CoreError::storage(format!("delete_object {key}: {e}")))?;
        Ok(())
    }

    /// Paginates exhaustively via `continuation_token` until `is_truncated`
    /// is false, accumulating every object under `prefix`.
    pub async fn list_objects(&self, prefix: &str) -> CoreResult<Vec<ObjectSummary>> {
        let mut out = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .map_err(|e| CoreError::storage(format!("list_objects_v2 {prefix}: {e}")))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified_epoch = object
                    .last_modified()
                    .map(|dt| dt.as_secs_f64())
                    .unwrap_or(0.0);
                out.push(ObjectSummary { key: key.to_string(), last_modified_epoch });
            }
            if page.is_truncated().unwrap_or(false) {
                continuation_token = page.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// First path segment past `prefix`, using `/` as the delimiter. Excludes
    /// the prefix itself and any empty segment.
    pub async fn list_directories(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let normalized_prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        let mut out = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&normalized_prefix)
                .delimiter("/");
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .map_err(|e| CoreError::storage(format!("list_objects_v2 {normalized_prefix}: {e}")))?;
            for common_prefix in page.common_prefixes() {
                let Some(full) = common_prefix.prefix() else { continue };
                let tail = full.strip_prefix(&normalized_prefix).unwrap_or(full);
                let name = tail.trim_end_matches('/');
                if !name.is_empty() {
                    out.push(name.to_string());
                }
            }
            if page.is_truncated().unwrap_or(false) {
                continuation_token = page.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// Deletes every object under `prefix`, batching up to 1000 keys per
    /// `delete_objects` request (the S3 API limit).
    pub async fn clear_prefix(&self, prefix: &str) -> CoreResult<()> {
        let objects = self.list_objects(prefix).await?;
        for chunk in objects.chunks(1000) {
            let identifiers: Vec<_> = chunk
                .iter()
                .filter_map(|o| {
                    aws_sdk_s3::types::ObjectIdentifier::builder().key(o.key.clone()).build().ok()
                })
                .collect();
            if identifiers.is_empty() {
                continue;
            }
            let delete = aws_sdk_s3::types::Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|e| CoreError::storage(format!("building delete batch: {e}")))?;
            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| CoreError::storage(format!("delete_objects {prefix}: {e}")))?;
        }
        Ok(())
    }

    pub async fn presign(&self, action: PresignAction, key: &str, expires_seconds: u64) -> CoreResult<String> {
        let presign_config = PresigningConfig::expires_in(Duration::from_secs(expires_seconds))
            .map_err(|e| CoreError::storage(format!("invalid presign expiry: {e}")))?;
        let url = match action {
            PresignAction::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presign_config)
                .await
                .map_err(|e| CoreError::storage(format!("presigning get {key}: {e}")))?
                .uri()
                .to_string(),
            PresignAction::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presign_config)
                .await
                .map_err(|e| CoreError::storage(format!("presigning put {key}: {e}")))?
                .uri()
                .to_string(),
        };
        Ok(url)
    }
}
