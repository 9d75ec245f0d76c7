use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::{content_type_for, validate_key, validate_prefix, CacheStore};
use crate::error::StorageError;

/// S3-backed implementation of [`CacheStore`].
///
/// Keys are stored as object keys below an optional key prefix. A single
/// `PutObject` is the atomic publish: S3 never exposes a partially uploaded
/// object. Directories are implicit, so
/// [`ensure_directory`](CacheStore::ensure_directory) does nothing.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    identifier: String,
}

impl S3Store {
    /// Create a new S3Store for the given bucket.
    ///
    /// # Arguments
    /// * `client` - AWS S3 client to use for requests
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix all objects live under (e.g. `media`)
    pub fn new(client: Client, bucket: String, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        let identifier = match &prefix {
            Some(p) => format!("s3://{}/{}", bucket, p),
            None => format!("s3://{}", bucket),
        };
        Self {
            client,
            bucket,
            prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the key prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Map a store key to the S3 object key.
    fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{}/{}", p, key),
            None => key.to_string(),
        }
    }

    /// Map an S3 object key back to a store key.
    fn store_key<'a>(&self, object_key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(p) => object_key.strip_prefix(p.as_str())?.strip_prefix('/'),
            None => Some(object_key),
        }
    }
}

/// Classify an SDK error rendering that did not expose a typed not-found.
fn looks_not_found(message: &str) -> bool {
    message.contains("NotFound") || message.contains("NoSuchKey") || message.contains("404")
}

#[async_trait]
impl CacheStore for S3Store {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let is_not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                if is_not_found || status_is_404 {
                    return Ok(false);
                }

                let message = e.to_string();
                if looks_not_found(&message) {
                    Ok(false)
                } else {
                    Err(StorageError::S3(message))
                }
            }
        }
    }

    async fn open(&self, key: &str) -> Result<Bytes, StorageError> {
        validate_key(key)?;
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| {
                let is_no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);

                let message = e.to_string();
                if is_no_such_key || status_is_404 || looks_not_found(&message) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::S3(message)
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn ensure_directory(&self, prefix: &str) -> Result<(), StorageError> {
        validate_prefix(prefix)
    }

    async fn write_atomic(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        validate_key(key)?;
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .content_type(content_type_for(&data, key))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        debug!(key, bytes = len, bucket = %self.bucket, "Published object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // DeleteObject succeeds on missing keys, so check first to report NotFound.
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        if prefix.is_empty() {
            return Err(StorageError::InvalidKey(
                "refusing to delete the whole store".to_string(),
            ));
        }

        let keys = self.list(prefix).await?;
        for key in &keys {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(self.object_key(key))
                .send()
                .await
                .map_err(|e| StorageError::S3(e.to_string()))?;
        }
        Ok(keys.len())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        validate_prefix(prefix)?;

        let object_prefix = match &self.prefix {
            Some(p) => format!("{}/{}", p, prefix),
            None => prefix.to_string(),
        };

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .max_keys(1000);

            if !object_prefix.is_empty() {
                request = request.prefix(&object_prefix);
            }
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| StorageError::S3(e.to_string()))?;

            for obj in result.contents() {
                if let Some(key) = obj.key().and_then(|k| self.store_key(k)) {
                    keys.push(key.to_string());
                }
            }

            if result.is_truncated() == Some(true) {
                continuation_token = result.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        // One page of at most one key, whatever the bucket size
        let mut request = self.client.list_objects_v2().bucket(&self.bucket).max_keys(1);
        if let Some(prefix) = &self.prefix {
            request = request.prefix(format!("{}/", prefix));
        }
        request
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
