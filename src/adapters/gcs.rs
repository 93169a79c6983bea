use bytes::Bytes;
use futures::stream::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, ObjectStream, Result, Storage, validate_name};

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com/";

/// Connection parameters for a GCS-compatible object store.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct GcsOptions {
    pub bucket: String,
    /// OAuth2 bearer token; refresh is external to this adapter.
    pub token: SecretString,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// How the adapter obtains its OAuth2 access token.
#[derive(Clone)]
pub enum TokenProvider {
    /// A fixed bearer token.
    Static(SecretString),
    /// A user-provided async token callback.
    Callback(std::sync::Arc<dyn Fn() -> TokenFuture + Send + Sync>),
}

type TokenFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send>>;

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenProvider::Static(_) => f.debug_tuple("Static").field(&"<redacted>").finish(),
            TokenProvider::Callback(_) => f.debug_tuple("Callback").finish(),
        }
    }
}

/// Google Cloud Storage adapter speaking the GCS JSON API.
///
/// ## Auth
/// Expects an OAuth2 access token via [`TokenProvider`]; token refresh is
/// handled externally.
///
/// ## Name normalization
/// `save` returns the object resource name reported by the API response, not
/// the input name.
#[derive(Clone, Debug)]
pub struct GcsStorage {
    client: Client,
    base_url: Url,
    bucket: String,
    token_provider: TokenProvider,
}

/// The subset of the GCS object resource we consume from upload responses.
#[derive(serde::Deserialize)]
struct ObjectResource {
    name: String,
}

impl GcsStorage {
    /// Create a new `GcsStorage` given a reqwest client, bucket, and token provider.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        token_provider: TokenProvider,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(DEFAULT_BASE_URL)
                .map_err(|e| Error::Configuration(format!("invalid gcs base url: {e}")))?,
            bucket: bucket.into(),
            token_provider,
        })
    }

    /// Build a client from connection options.
    pub fn from_options(options: &GcsOptions) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("gcs http client: {e}")))?;
        let mut storage = Self::new(
            client,
            &options.bucket,
            TokenProvider::Static(options.token.clone()),
        )?;
        if let Some(endpoint) = &options.endpoint {
            storage.base_url = Url::parse(endpoint)
                .map_err(|e| Error::Configuration(format!("invalid gcs endpoint: {e}")))?;
        }
        Ok(storage)
    }

    /// Override the base URL (useful for tests/mocks).
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_token(&self) -> Result<String> {
        match &self.token_provider {
            TokenProvider::Static(tok) => Ok(tok.expose_secret().to_string()),
            TokenProvider::Callback(f) => f().await,
        }
    }

    async fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self.get_token().await?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::transport("gcs bearer token header", e))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn object_url(&self, name: &str) -> Result<Url> {
        self.base_url
            .join(&format!(
                "storage/v1/b/{}/o/{}",
                self.bucket,
                urlencoding::encode(name)
            ))
            .map_err(|e| Error::transport("gcs object url", e))
    }

    fn download_url(&self, name: &str) -> Result<Url> {
        let mut url = self.object_url(name)?;
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn upload_url(&self, name: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("upload/storage/v1/b/{}/o", self.bucket))
            .map_err(|e| Error::transport("gcs upload url", e))?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", name);
        Ok(url)
    }

    // Auth failures (401/403) fold into Transport: the closed taxonomy only
    // distinguishes "object absent" from "backend unusable".
    async fn status_error(resp: reqwest::Response, context: &str) -> Error {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let snippet: String = text.chars().take(200).collect();
        Error::transport_msg(format!("{context}: {status} ({snippet})"))
    }
}

impl Storage for GcsStorage {
    async fn open(&self, name: &str) -> Result<ObjectStream> {
        validate_name(name)?;
        let url = self.download_url(name)?;
        let headers = self.auth_headers().await?;

        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::transport("gcs open", e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(name.to_string()));
        }
        if !resp.status().is_success() {
            return Err(Self::status_error(resp, "gcs open failed").await);
        }

        let size = resp.content_length();
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::transport("gcs read body", e)))
            .boxed();

        Ok(ObjectStream::new(name, size, body))
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        validate_name(name)?;
        let url = self.upload_url(name)?;
        let headers = self.auth_headers().await?;

        let resp = self
            .client
            .post(url)
            .headers(headers)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await
            .map_err(|e| Error::transport("gcs save", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp, "gcs save failed").await);
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::transport("gcs save response", e))?;
        let resource: ObjectResource = serde_json::from_slice(&body)
            .map_err(|e| Error::transport("gcs save response body", e))?;

        Ok(resource.name)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let url = self.object_url(name)?;
        let headers = self.auth_headers().await?;

        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::transport("gcs exists", e))?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::status_error(resp, "gcs exists failed").await),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let url = self.object_url(name)?;
        let headers = self.auth_headers().await?;

        let resp = self
            .client
            .delete(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::transport("gcs delete", e))?;

        match resp.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Ok(()), // idempotent
            _ => Err(Self::status_error(resp, "gcs delete failed").await),
        }
    }
}
