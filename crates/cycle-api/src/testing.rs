//! Test doubles and a ready-made app backed by in-memory SQLite.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use cycle_db::Database;
use cycle_db::models::NewUser;
use cycle_types::api::SessionTokens;
use cycle_types::models::ImageRef;

use crate::config::{CloudConfig, Config, SmtpConfig};
use crate::images::{ImageHost, ImageHostError, ImageUpload, Transform};
use crate::mail::{Mail, Mailer};
use crate::routes;
use crate::session;
use crate::state::{AppState, AppStateInner};

pub const PASSWORD: &str = "Abc12345!";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, Mail)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, Mail)> {
        self.sent.lock().unwrap().clone()
    }

    /// `(id, token)` from the last link mailed to `to`.
    pub fn last_link_params(&self, to: &str) -> Option<(String, String)> {
        let sent = self.sent.lock().unwrap();
        let link = sent.iter().rev().find_map(|(recipient, mail)| match mail {
            Mail::Verification { link } | Mail::PasswordReset { link } if recipient == to => Some(link.clone()),
            _ => None,
        })?;

        let query = link.split_once('?')?.1;
        let mut id = None;
        let mut token = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("id", v)) => id = Some(v.to_string()),
                Some(("token", v)) => token = Some(v.to_string()),
                _ => {}
            }
        }
        Some((id?, token?))
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, mail: &Mail) -> Result<()> {
        self.sent.lock().unwrap().push((to.to_string(), mail.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeImageHost {
    counter: AtomicUsize,
    /// Uploads after this many successful ones are rejected, when set.
    fail_after: Mutex<Option<usize>>,
    failing: AtomicBool,
    uploads: Mutex<Vec<(String, Transform)>>,
    destroyed: Mutex<Vec<String>>,
}

impl FakeImageHost {
    /// Reject every upload from now on.
    pub fn fail_uploads(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Accept `n` more uploads, then reject the rest.
    pub fn fail_uploads_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn uploads(&self) -> Vec<(String, Transform)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, _image: ImageUpload, transform: Transform) -> Result<ImageRef, ImageHostError> {
        {
            let mut fail_after = self.fail_after.lock().unwrap();
            match fail_after.as_mut() {
                Some(0) => self.failing.store(true, Ordering::SeqCst),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ImageHostError::Rejected {
                status: 500,
                body: "upload failed".into(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("img{n}");
        self.uploads.lock().unwrap().push((id.clone(), transform));
        Ok(ImageRef {
            url: format!("https://cdn.test/{id}.jpg"),
            id,
        })
    }

    async fn destroy(&self, id: &str) -> Result<(), ImageHostError> {
        self.destroyed.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn delete_resources(&self, ids: &[String]) -> Result<(), ImageHostError> {
        self.destroyed.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        jwt_secret: "test-secret".into(),
        db_path: ":memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        public_dir: "public".into(),
        verification_link: "http://localhost:8000/verify/".into(),
        password_reset_link: "http://localhost:8000/reset-password/".into(),
        smtp: SmtpConfig {
            host: None,
            port: 2525,
            username: None,
            password: None,
            tls: false,
            from_address: "Cycle Market <no-reply@cycle-market.local>".into(),
        },
        cloud: CloudConfig {
            cloud_name: "test".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            api_base: "http://localhost:1".into(),
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub images: Arc<FakeImageHost>,
}

impl TestApp {
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let images = Arc::new(FakeImageHost::default());
        let state = AppStateInner::new(
            Database::open_in_memory().unwrap(),
            test_config(),
            mailer.clone(),
            images.clone(),
        );
        Self { state, mailer, images }
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Create a user directly in the store.
    pub fn user(&self, name: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let created = self
            .state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                name,
                email,
                password: PASSWORD,
            })
            .unwrap();
        assert!(created);
        id
    }

    pub fn signed_in_user(&self, name: &str, email: &str) -> (Uuid, SessionTokens) {
        let id = self.user(name, email);
        let tokens = session::issue_session(&self.state.db, &self.state.keys, id).unwrap();
        (id, tokens)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()))
        };
        (status, json)
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn multipart(&self, method: &str, uri: &str, token: &str, form: Multipart) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", Multipart::BOUNDARY),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    const BOUNDARY: &'static str = "cycle-market-test-boundary";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                Self::BOUNDARY
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                Self::BOUNDARY
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());
        self.body
    }
}
