//! Buffered `multipart/form-data` bodies.
//!
//! Product and avatar uploads mix text fields with files, and validation needs
//! to see all the text fields before any file goes to the image host, so the
//! whole body is collected up front.

use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use bytes::Bytes;

use crate::error::{ApiError, ApiResult};
use crate::images::ImageUpload;

pub struct FormFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FormFile {
    pub fn is_image(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| ct.starts_with("image"))
    }

    pub fn into_upload(self) -> ImageUpload {
        ImageUpload {
            content_type: self.content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            file_name: self.file_name,
            bytes: self.bytes,
        }
    }
}

#[derive(Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<FormFile>,
}

impl UploadForm {
    pub async fn collect(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(format!("Failed to read file: {}", e)))?;
                    form.files.push(FormFile {
                        field: name,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(format!("Failed to read field: {}", e)))?;
                    // First occurrence wins.
                    form.fields.entry(name).or_insert(value);
                }
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Remove and return every file sent under `name`, in request order.
    pub fn take_files(&mut self, name: &str) -> Vec<FormFile> {
        let (taken, rest) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|file| file.field == name);
        self.files = rest;
        taken
    }
}

impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;

        Self::collect(multipart).await
    }
}
