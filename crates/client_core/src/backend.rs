//! Seam between the engine and the blog backend's REST surface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ContentItem, PostId},
    error::ApiErrorBody,
    protocol::{
        AuthPayload, Envelope, LoginRequest, NewPost, PostListPayload, PostPatch, PostPayload,
        RegisterRequest, WhoamiPayload,
    },
};
use tracing::debug;
use url::Url;

use crate::{config::ClientSettings, error::BackendError};

/// Calls that need a credential take the current token; the backend attaches
/// it as a bearer header.
#[async_trait]
pub trait BlogBackend: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> Result<AuthPayload, BackendError>;
    async fn login(&self, request: LoginRequest) -> Result<AuthPayload, BackendError>;
    async fn logout(&self, token: Option<&str>) -> Result<(), BackendError>;
    async fn whoami(&self, token: &str) -> Result<WhoamiPayload, BackendError>;
    async fn list_posts(&self, token: Option<&str>) -> Result<Vec<ContentItem>, BackendError>;
    async fn fetch_post(
        &self,
        token: Option<&str>,
        id: &PostId,
    ) -> Result<ContentItem, BackendError>;
    async fn create_post(
        &self,
        token: Option<&str>,
        post: NewPost,
    ) -> Result<ContentItem, BackendError>;
    async fn update_post(
        &self,
        token: Option<&str>,
        id: &PostId,
        patch: PostPatch,
    ) -> Result<ContentItem, BackendError>;
    async fn delete_post(&self, token: Option<&str>, id: &PostId) -> Result<(), BackendError>;
}

pub struct MissingBackend;

fn unavailable<T>() -> Result<T, BackendError> {
    Err(BackendError::Transport(
        "blog backend is unavailable".to_string(),
    ))
}

#[async_trait]
impl BlogBackend for MissingBackend {
    async fn register(&self, _request: RegisterRequest) -> Result<AuthPayload, BackendError> {
        unavailable()
    }

    async fn login(&self, _request: LoginRequest) -> Result<AuthPayload, BackendError> {
        unavailable()
    }

    async fn logout(&self, _token: Option<&str>) -> Result<(), BackendError> {
        unavailable()
    }

    async fn whoami(&self, _token: &str) -> Result<WhoamiPayload, BackendError> {
        unavailable()
    }

    async fn list_posts(&self, _token: Option<&str>) -> Result<Vec<ContentItem>, BackendError> {
        unavailable()
    }

    async fn fetch_post(
        &self,
        _token: Option<&str>,
        _id: &PostId,
    ) -> Result<ContentItem, BackendError> {
        unavailable()
    }

    async fn create_post(
        &self,
        _token: Option<&str>,
        _post: NewPost,
    ) -> Result<ContentItem, BackendError> {
        unavailable()
    }

    async fn update_post(
        &self,
        _token: Option<&str>,
        _id: &PostId,
        _patch: PostPatch,
    ) -> Result<ContentItem, BackendError> {
        unavailable()
    }

    async fn delete_post(&self, _token: Option<&str>, _id: &PostId) -> Result<(), BackendError> {
        unavailable()
    }
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(settings: &ClientSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Self::with_client(http, &settings.api_base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> anyhow::Result<Self> {
        Url::parse(base_url)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: Option<&str>,
    ) -> Result<T, BackendError> {
        let response = self.send(request, token).await?;
        let body: Envelope<T> = response
            .json()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(body.data)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        token: Option<&str>,
    ) -> Result<reqwest::Response, BackendError> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        debug!(status = status.as_u16(), "backend returned non-success status");
        if status == StatusCode::UNAUTHORIZED {
            Err(BackendError::Unauthorized {
                message: body.message,
            })
        } else {
            Err(BackendError::Rejected {
                status: status.as_u16(),
                message: body.message,
            })
        }
    }
}

#[async_trait]
impl BlogBackend for HttpBackend {
    async fn register(&self, request: RegisterRequest) -> Result<AuthPayload, BackendError> {
        self.send_data(self.http.post(self.url("/auth/register")).json(&request), None)
            .await
    }

    async fn login(&self, request: LoginRequest) -> Result<AuthPayload, BackendError> {
        self.send_data(self.http.post(self.url("/auth/login")).json(&request), None)
            .await
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), BackendError> {
        self.send(self.http.post(self.url("/auth/logout")), token)
            .await
            .map(|_| ())
    }

    async fn whoami(&self, token: &str) -> Result<WhoamiPayload, BackendError> {
        self.send_data(self.http.get(self.url("/users/me")), Some(token))
            .await
    }

    async fn list_posts(&self, token: Option<&str>) -> Result<Vec<ContentItem>, BackendError> {
        let payload: PostListPayload = self
            .send_data(self.http.get(self.url("/blogs")), token)
            .await?;
        Ok(payload.blogs)
    }

    async fn fetch_post(
        &self,
        token: Option<&str>,
        id: &PostId,
    ) -> Result<ContentItem, BackendError> {
        let payload: PostPayload = self
            .send_data(self.http.get(self.url(&format!("/blogs/{id}"))), token)
            .await?;
        Ok(payload.blog)
    }

    async fn create_post(
        &self,
        token: Option<&str>,
        post: NewPost,
    ) -> Result<ContentItem, BackendError> {
        let payload: PostPayload = self
            .send_data(self.http.post(self.url("/blogs")).json(&post), token)
            .await?;
        Ok(payload.blog)
    }

    async fn update_post(
        &self,
        token: Option<&str>,
        id: &PostId,
        patch: PostPatch,
    ) -> Result<ContentItem, BackendError> {
        let payload: PostPayload = self
            .send_data(
                self.http.put(self.url(&format!("/blogs/{id}"))).json(&patch),
                token,
            )
            .await?;
        Ok(payload.blog)
    }

    async fn delete_post(&self, token: Option<&str>, id: &PostId) -> Result<(), BackendError> {
        self.send(self.http.delete(self.url(&format!("/blogs/{id}"))), token)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
