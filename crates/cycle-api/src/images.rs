//! Image hosting for product photos and avatars.
//!
//! [`CloudinaryClient`] talks to the Cloudinary upload and admin APIs. Upload
//! and destroy calls are signed with SHA-256 over the sorted parameters plus
//! the API secret, so the account must have SHA-256 signatures enabled.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use cycle_types::models::ImageRef;

use crate::config::CloudConfig;

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("image host request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image host rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Server-side resize applied on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// 1280x720, filled.
    ProductPhoto,
    /// 300x300 thumbnail centred on a face.
    Avatar,
}

impl Transform {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::ProductPhoto => "c_fill,h_720,w_1280",
            Self::Avatar => "c_thumb,g_face,h_300,w_300",
        }
    }
}

pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload, transform: Transform) -> Result<ImageRef, ImageHostError>;

    async fn destroy(&self, id: &str) -> Result<(), ImageHostError>;

    /// Batch delete. An empty slice is a no-op.
    async fn delete_resources(&self, ids: &[String]) -> Result<(), ImageHostError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

pub struct CloudinaryClient {
    http: Client,
    config: CloudConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            path
        )
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        signature(params, &self.config.api_secret)
    }
}

/// Hex SHA-256 of `k1=v1&k2=v2...` (keys sorted) followed by the secret.
pub(crate) fn signature(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ImageHostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ImageHostError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, image: ImageUpload, transform: Transform) -> Result<ImageRef, ImageHostError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.as_str()), ("transformation", transform.as_param())]);

        let file = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;

        let form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("transformation", transform.as_param())
            .text("signature", signature)
            .part("file", file);

        let response = self
            .http
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = check(response).await?.json().await?;

        debug!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(ImageRef {
            url: uploaded.secure_url,
            id: uploaded.public_id,
        })
    }

    async fn destroy(&self, id: &str) -> Result<(), ImageHostError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", id), ("timestamp", timestamp.as_str())]);

        let response = self
            .http
            .post(self.endpoint("image/destroy"))
            .form(&[
                ("public_id", id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;
        check(response).await?;

        debug!(public_id = %id, "Image destroyed");
        Ok(())
    }

    async fn delete_resources(&self, ids: &[String]) -> Result<(), ImageHostError> {
        if ids.is_empty() {
            return Ok(());
        }

        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("public_ids[]", id.as_str())).collect();

        let response = self
            .http
            .delete(self.endpoint("resources/image/upload"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&query)
            .send()
            .await?;
        check(response).await?;

        info!(count = ids.len(), "Deleted images");
        Ok(())
    }
}
