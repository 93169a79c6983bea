//! Configuration surface for [`DualStorage`](crate::DualStorage).

use crate::BackendKey;
use crate::adapters::{gcs::GcsOptions, s3::S3Options};

/// Full configuration for a dual-backend façade.
///
/// Both priority orders name backends by their lowercase keys; every named
/// backend must carry connection options or construction fails with a
/// configuration error. Credentials deserialize into [`secrecy`] wrappers and
/// never appear in debug output.
///
/// ```
/// # use dualstore::DualConfig;
/// let config: DualConfig = serde_json::from_str(
///     r#"{
///         "read_order": ["s3", "gcs"],
///         "write_order": ["s3", "gcs"],
///         "s3": { "bucket": "objects", "region": "us-east-1" },
///         "gcs": { "bucket": "objects-replica", "token": "ya29.token" }
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(config.read_order.len(), 2);
/// ```
#[derive(Clone, Debug, serde::Deserialize)]
pub struct DualConfig {
    pub read_order: Vec<BackendKey>,
    pub write_order: Vec<BackendKey>,
    #[serde(default)]
    pub s3: Option<S3Options>,
    #[serde(default)]
    pub gcs: Option<GcsOptions>,
}
