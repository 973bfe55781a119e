//! S3-compatible object store.
//!
//! Stores document bytes in an S3 bucket using the REST API with AWS
//! Signature V4 authentication. Works against AWS and S3-compatible
//! services (MinIO, Supabase storage) through `endpoint_url`, which
//! switches to path-style addressing.
//!
//! Signing uses only pure-Rust dependencies (`hmac`, `sha2`).
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! backend = "s3"
//!
//! [storage.s3]
//! bucket = "plant-documents"
//! region = "us-east-1"
//! prefix = "catalog/"
//! # endpoint_url = "http://localhost:9000"   # MinIO
//! ```
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use tracing::debug;

use doccat_core::error::{CatalogError, Result};
use doccat_core::store::ObjectStore;

use crate::config::S3StorageConfig;

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: &str, secret_access_key: &str, session_token: Option<&str>) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
        }
    }

    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    pub fn from_env() -> anyhow::Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

pub struct S3ObjectStore {
    config: S3StorageConfig,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3ObjectStore {
    pub fn new(config: S3StorageConfig, creds: AwsCredentials) -> Self {
        Self {
            config,
            creds,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env(config: S3StorageConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config, AwsCredentials::from_env()?))
    }

    fn object_key(&self, path: &str) -> String {
        format!("{}{}", self.config.prefix, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<(&[u8], &str)>,
    ) -> Result<reqwest::Response> {
        let key = self.object_key(path);
        let target = object_target(&self.config, &key);
        let payload = body.map(|(bytes, _)| bytes).unwrap_or(b"");
        let signed = sign_request(
            method.as_str(),
            &target,
            &hex_sha256(payload),
            &self.config.region,
            &self.creds,
            Utc::now(),
        )
        .map_err(CatalogError::Backend)?;

        let mut req = self
            .client
            .request(method.clone(), &target.url)
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("x-amz-date", &signed.amz_date);
        if let Some(ref token) = self.creds.session_token {
            req = req.header("x-amz-security-token", token);
        }
        if let Some((bytes, content_type)) = body {
            req = req
                .header("Content-Type", content_type)
                .body(bytes.to_vec());
        }

        debug!(method = %method, key = %key, "s3 request");
        req.send().await.map_err(|e| {
            CatalogError::Backend(anyhow!(
                "S3 {} s3://{}/{} failed: {}",
                method,
                self.config.bucket,
                key,
                e
            ))
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let resp = self.send(Method::PUT, path, Some((bytes, content_type))).await?;
        check_status(resp, "PutObject", path).await.map(|_| ())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self.send(Method::GET, path, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::ObjectNotFound(path.to_string()));
        }
        let resp = check_status(resp, "GetObject", path).await?;
        let bytes = resp.bytes().await.map_err(CatalogError::backend)?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.send(Method::DELETE, path, None).await?;
        // S3 answers 204 for missing keys too; some compatibles answer 404.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp, "DeleteObject", path).await.map(|_| ())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let resp = self.send(Method::HEAD, path, None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(CatalogError::Backend(anyhow!(
                "S3 HeadObject failed (HTTP {}) for '{}'",
                s,
                path
            ))),
        }
    }
}

async fn check_status(resp: reqwest::Response, op: &str, path: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let code = extract_xml_value(&body, "Code").unwrap_or_default();
    Err(CatalogError::Backend(anyhow!(
        "S3 {} failed (HTTP {} {}) for '{}'",
        op,
        status,
        code,
        path
    )))
}

// ============ Request Targets ============

/// URL, host header, and canonical URI of one object request.
#[derive(Debug, PartialEq)]
struct ObjectTarget {
    url: String,
    host: String,
    canonical_uri: String,
}

/// Virtual-hosted style on AWS, path style on custom endpoints.
fn object_target(config: &S3StorageConfig, key: &str) -> ObjectTarget {
    let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
    match config.endpoint_url {
        Some(ref endpoint) => {
            let endpoint = endpoint.trim_end_matches('/');
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .to_string();
            let canonical_uri = format!("/{}/{}", uri_encode(&config.bucket), encoded_key);
            ObjectTarget {
                url: format!("{}{}", endpoint, canonical_uri),
                host,
                canonical_uri,
            }
        }
        None => {
            let host = format!("{}.s3.{}.amazonaws.com", config.bucket, config.region);
            let canonical_uri = format!("/{}", encoded_key);
            ObjectTarget {
                url: format!("https://{}{}", host, canonical_uri),
                host,
                canonical_uri,
            }
        }
    }
}

// ============ AWS SigV4 Helpers ============

struct SignedHeaders {
    authorization: String,
    amz_date: String,
    payload_hash: String,
}

fn sign_request(
    method: &str,
    target: &ObjectTarget,
    payload_hash: &str,
    region: &str,
    creds: &AwsCredentials,
    now: DateTime<Utc>,
) -> anyhow::Result<SignedHeaders> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut headers = vec![
        ("host".to_string(), target.host.clone()),
        ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, target.canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3")?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        ),
        amz_date,
        payload_hash: payload_hash.to_string(),
    })
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| anyhow!("HMAC key: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> anyhow::Result<Vec<u8>> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding; leaves `A-Z a-z 0-9 - _ . ~` untouched.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(endpoint: Option<&str>) -> S3StorageConfig {
        S3StorageConfig {
            bucket: "plant-docs".to_string(),
            region: "eu-west-1".to_string(),
            prefix: "catalog/".to_string(),
            endpoint_url: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn signing_key_matches_aws_reference() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn uri_encode_escapes_reserved() {
        assert_eq!(uri_encode("a b/c~d"), "a%20b%2Fc~d");
        assert_eq!(uri_encode("ção"), "%C3%A7%C3%A3o");
    }

    #[test]
    fn aws_target_is_virtual_hosted() {
        let target = object_target(&config(None), "catalog/alice/x y.pdf");
        assert_eq!(target.host, "plant-docs.s3.eu-west-1.amazonaws.com");
        assert_eq!(target.canonical_uri, "/catalog/alice/x%20y.pdf");
        assert_eq!(
            target.url,
            "https://plant-docs.s3.eu-west-1.amazonaws.com/catalog/alice/x%20y.pdf"
        );
    }

    #[test]
    fn custom_endpoint_is_path_style() {
        let target = object_target(&config(Some("http://localhost:9000/")), "k.pdf");
        assert_eq!(target.host, "localhost:9000");
        assert_eq!(target.canonical_uri, "/plant-docs/k.pdf");
        assert_eq!(target.url, "http://localhost:9000/plant-docs/k.pdf");
    }

    #[test]
    fn signature_is_deterministic_and_scoped() {
        let creds = AwsCredentials::new("AKIDEXAMPLE", "secret", Some("token"));
        let target = object_target(&config(None), "catalog/a.pdf");
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let a = sign_request("PUT", &target, &hex_sha256(b"abc"), "eu-west-1", &creds, now).unwrap();
        let b = sign_request("PUT", &target, &hex_sha256(b"abc"), "eu-west-1", &creds, now).unwrap();
        assert_eq!(a.authorization, b.authorization);
        assert_eq!(a.amz_date, "20240301T120000Z");
        assert!(a
            .authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240301/eu-west-1/s3/aws4_request"));
        assert!(a
            .authorization
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"));

        let other = sign_request("GET", &target, &hex_sha256(b"abc"), "eu-west-1", &creds, now).unwrap();
        assert_ne!(a.authorization, other.authorization);
    }

    #[test]
    fn error_code_extraction() {
        let xml = "<Error><Code>NoSuchKey</Code><Message>gone</Message></Error>";
        assert_eq!(extract_xml_value(xml, "Code").as_deref(), Some("NoSuchKey"));
        assert_eq!(extract_xml_value(xml, "Missing"), None);
    }
}
