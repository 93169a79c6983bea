use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    primitives::ByteStream,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, ObjectStream, Result, Storage, validate_name};

/// Connection parameters for an S3-compatible object store.
///
/// When `access_key`/`secret_key` are absent the default AWS provider chain
/// (environment, profile, IMDS) supplies credentials. `endpoint` overrides the
/// service URL for S3-compatible stores and forces path-style addressing.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<SecretString>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// AWS S3 storage adapter using object keys as names.
#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Wrap a caller-supplied SDK client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from connection options.
    pub async fn from_options(options: &S3Options) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(options.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&options.access_key, &options.secret_key) {
            let credentials = Credentials::new(
                access_key.clone(),
                secret_key.expose_secret().to_string(),
                None,
                None,
                "dualstore-static",
            );
            loader = loader.credentials_provider(credentials);
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self::new(Client::from_conf(builder.build()), &options.bucket))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn map_sdk_err<E>(context: &str, e: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::transport(format!("s3 {context}"), e)
    }

    // The SDK surfaces missing objects through several shapes depending on the
    // operation; match on the rendered error rather than each modeled variant.
    fn is_not_found<E: std::fmt::Debug + std::fmt::Display>(e: &E) -> bool {
        let msg = e.to_string();
        let meta = format!("{e:?}");
        msg.contains("NotFound")
            || msg.contains("NoSuchKey")
            || msg.contains("404")
            || msg.contains("StatusCode(404)")
            || meta.contains("NotFound")
            || meta.contains("NoSuchKey")
    }
}

impl Storage for S3Storage {
    async fn open(&self, name: &str) -> Result<ObjectStream> {
        validate_name(name)?;

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;

        let out = match resp {
            Ok(out) => out,
            Err(e) if Self::is_not_found(&e) => return Err(Error::NotFound(name.to_string())),
            Err(e) => return Err(Self::map_sdk_err("open", e)),
        };

        let size = out.content_length().and_then(|len| u64::try_from(len).ok());

        // The SDK body is not a futures Stream; drive its inherent `next`.
        let body = stream::unfold(Some(out.body), |state| async move {
            let mut body = state?;
            match body.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), Some(body))),
                Some(Err(e)) => Some((Err(Self::map_sdk_err("read body", e)), None)),
                None => None,
            }
        })
        .boxed();

        Ok(ObjectStream::new(name, size, body))
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        validate_name(name)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| Self::map_sdk_err("save", e))?;

        Ok(name.to_string())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;

        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;

        match resp {
            Ok(_) => Ok(true),
            Err(e) if Self::is_not_found(&e) => Ok(false),
            Err(e) => Err(Self::map_sdk_err("exists", e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        let resp = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await;

        match resp {
            Ok(_) => Ok(()),
            // Delete is idempotent.
            Err(e) if Self::is_not_found(&e) => Ok(()),
            Err(e) => Err(Self::map_sdk_err("delete", e)),
        }
    }
}
