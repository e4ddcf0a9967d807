//! S3-compatible object storage client
//!
//! Path-style requests (`<endpoint>/<bucket>/<key>`) signed with AWS
//! Signature Version 4. Only the three calls the pipeline needs are
//! implemented:
//!
//! - `HEAD /<bucket>`: does the bucket exist
//! - `PUT /<bucket>`: create it
//! - `PUT /<bucket>/<key>`: upload an object
//!
//! Payloads are hashed and signed in full (`x-amz-content-sha256` carries the
//! real digest, not `UNSIGNED-PAYLOAD`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use sharedvm_core::{BackupConfig, Error, Result};
use tracing::info;

use crate::store::{Bucket, ObjectStore};

type HmacSha256 = Hmac<Sha256>;

/// Overall timeout for a single HTTP exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const SERVICE: &str = "s3";

/// S3-compatible object storage client
#[derive(Clone)]
pub struct S3Client {
    endpoint: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Create a client for `endpoint` (e.g. `https://s3.amazonaws.com`)
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        S3Client {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Client for the endpoint and credentials in `config`
    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(
            &config.endpoint_url,
            &config.s3_region,
            &config.access_key_id,
            &config.secret_access_key,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn signed_headers(&self, method: &str, path: &str, payload: &[u8]) -> Vec<(String, String)> {
        let signer = Signer {
            access_key_id: &self.access_key_id,
            secret_access_key: &self.secret_access_key,
            region: &self.region,
            host: host_of(&self.endpoint),
        };
        signer.sign(method, path, payload, Utc::now())
    }

    fn head_bucket(&self, path: &str) -> std::result::Result<bool, ureq::Error> {
        let mut request = self.agent.head(&self.url(path));
        for (name, value) in self.signed_headers("HEAD", path, b"") {
            request = request.header(name.as_str(), value.as_str());
        }
        match request.call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::StatusCode(404)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn put(&self, path: &str, payload: &[u8]) -> std::result::Result<(), ureq::Error> {
        let mut request = self.agent.put(&self.url(path));
        for (name, value) in self.signed_headers("PUT", path, payload) {
            request = request.header(name.as_str(), value.as_str());
        }
        request.send(payload).map(drop)
    }

    fn create_bucket_body(&self) -> Vec<u8> {
        // us-east-1 rejects an explicit location constraint
        if self.region == "us-east-1" {
            Vec::new()
        } else {
            format!(
                "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                self.region
            )
            .into_bytes()
        }
    }
}

impl ObjectStore for S3Client {
    type Bucket = S3Bucket;

    fn get_or_create(&self, bucket_name: &str) -> Result<S3Bucket> {
        let provision_error = |e: ureq::Error| Error::BucketProvision {
            bucket: bucket_name.to_string(),
            reason: e.to_string(),
        };

        let path = format!("/{}", uri_encode(bucket_name));
        if !self.head_bucket(&path).map_err(provision_error)? {
            info!(target: "sharedvm::backup", bucket = bucket_name, "Creating bucket");
            self.put(&path, &self.create_bucket_body())
                .map_err(provision_error)?;
        }

        Ok(S3Bucket {
            client: self.clone(),
            name: bucket_name.to_string(),
        })
    }
}

/// Handle to one S3 bucket
#[derive(Debug, Clone)]
pub struct S3Bucket {
    client: S3Client,
    name: String,
}

impl Bucket for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload(&self, data: &[u8], remote_path: &str) -> Result<()> {
        let path = format!(
            "/{}/{}",
            uri_encode(&self.name),
            uri_encode(remote_path.trim_start_matches('/'))
        );
        self.client.put(&path, data).map_err(|e| Error::Upload {
            remote_path: remote_path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// SigV4 request signer for one set of credentials
struct Signer<'a> {
    access_key_id: &'a str,
    secret_access_key: &'a str,
    region: &'a str,
    host: &'a str,
}

impl Signer<'_> {
    /// Headers to attach: `x-amz-date`, `x-amz-content-sha256`, `Authorization`
    fn sign(
        &self,
        method: &str,
        path: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(payload));

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            self.host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, path, canonical_headers, signed_headers, payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(self.secret_access_key, &date, self.region, SERVICE);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        vec![
            ("x-amz-date".to_string(), amz_date),
            ("x-amz-content-sha256".to_string(), payload_hash),
            (
                "Authorization".to_string(),
                format!(
                    "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
                    self.access_key_id, scope, signed_headers, signature
                ),
            ),
        ]
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Percent-encode a path, keeping `/` and RFC 3986 unreserved characters
fn uri_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Authority part of an endpoint URL, without default ports
fn host_of(endpoint: &str) -> &str {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    let authority = without_scheme.split('/').next().unwrap_or(without_scheme);
    if endpoint.starts_with("https://") {
        authority.strip_suffix(":443").unwrap_or(authority)
    } else {
        authority.strip_suffix(":80").unwrap_or(authority)
    }
}
