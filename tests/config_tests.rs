//! Configuration surface tests: key deserialization, priority list
//! validation, and credential redaction.

use dualstore::{BackendKey, PriorityList};

#[test]
fn backend_keys_deserialize_from_lowercase_names() {
    let keys: Vec<BackendKey> = serde_json::from_str(r#"["s3", "gcs"]"#).unwrap();
    assert_eq!(keys, vec![BackendKey::S3, BackendKey::Gcs]);

    assert!(serde_json::from_str::<BackendKey>(r#""azure""#).is_err());
}

#[test]
fn backend_keys_display_as_lowercase_names() {
    assert_eq!(BackendKey::S3.to_string(), "s3");
    assert_eq!(BackendKey::Gcs.to_string(), "gcs");
}

#[test]
fn priority_list_caps_at_two_entries() {
    // The key set only has two members, so a third entry is necessarily a
    // duplicate; both diagnostics are configuration errors.
    let err = PriorityList::new(&[BackendKey::S3, BackendKey::Gcs, BackendKey::S3]).unwrap_err();
    assert!(matches!(err, dualstore::Error::Configuration(_)));
}

#[cfg(all(feature = "s3", feature = "gcs"))]
mod dual_config {
    use dualstore::DualConfig;

    const CONFIG: &str = r#"{
        "read_order": ["gcs", "s3"],
        "write_order": ["s3", "gcs"],
        "s3": {
            "bucket": "objects",
            "region": "us-east-1",
            "access_key": "AKIAEXAMPLE",
            "secret_key": "wJalrXUtnFEMI",
            "endpoint": "http://localhost:9000"
        },
        "gcs": {
            "bucket": "objects-replica",
            "token": "ya29.secret-token"
        }
    }"#;

    #[test]
    fn full_config_deserializes() {
        let config: DualConfig = serde_json::from_str(CONFIG).unwrap();

        assert_eq!(
            config.read_order,
            vec![dualstore::BackendKey::Gcs, dualstore::BackendKey::S3]
        );
        let s3 = config.s3.as_ref().unwrap();
        assert_eq!(s3.bucket, "objects");
        assert_eq!(s3.endpoint.as_deref(), Some("http://localhost:9000"));
        let gcs = config.gcs.as_ref().unwrap();
        assert_eq!(gcs.bucket, "objects-replica");
        assert_eq!(gcs.endpoint, None);
    }

    #[test]
    fn backend_sections_are_optional() {
        let config: DualConfig = serde_json::from_str(
            r#"{ "read_order": ["s3"], "write_order": ["s3"] }"#,
        )
        .unwrap();
        assert!(config.s3.is_none());
        assert!(config.gcs.is_none());
    }

    #[tokio::test]
    async fn construction_rejects_order_with_no_configured_backend() {
        // gcs is named in the read order but carries no connection options.
        let config: DualConfig = serde_json::from_str(
            r#"{
                "read_order": ["gcs", "s3"],
                "write_order": ["s3"],
                "s3": { "bucket": "objects", "region": "us-east-1" }
            }"#,
        )
        .unwrap();

        let err = dualstore::DualStorage::new(config).await.unwrap_err();
        assert!(matches!(err, dualstore::Error::Configuration(_)));
    }

    #[test]
    fn credentials_are_redacted_in_debug_output() {
        let config: DualConfig = serde_json::from_str(CONFIG).unwrap();
        let rendered = format!("{config:?}");

        assert!(!rendered.contains("wJalrXUtnFEMI"));
        assert!(!rendered.contains("ya29.secret-token"));
        // Non-secret fields stay visible for diagnostics.
        assert!(rendered.contains("objects"));
    }
}
