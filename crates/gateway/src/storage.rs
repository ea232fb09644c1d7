use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

/// PUT-signed upload URLs stay valid for 15 minutes.
pub const UPLOAD_URL_TTL_SECS: u64 = 15 * 60;
/// GET-signed download URLs stay valid for 7 days, the provider maximum.
pub const DOWNLOAD_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Client for an S3-compatible object store. Mints V4 query-presigned URLs so
/// browsers upload and download directly against the provider; the gateway
/// itself only touches bytes for the profile-picture proxy.
pub struct StorageClient {
    http: reqwest::Client,
    endpoint: String,
    host: String,
    region: String,
    bucket: String,
    access_key: String,
    secret_key: String,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// AWS-style URI encoding: unreserved characters pass through, everything
/// else becomes %XX. Path encoding leaves `/` intact.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

impl StorageClient {
    pub fn new(http: reqwest::Client, config: &StorageConfig) -> Self {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let host = endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(endpoint.as_str())
            .to_string();
        Self {
            http,
            endpoint,
            host,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// PUT-signed URL. When a content type is given it joins the signed
    /// headers, so the upload must carry exactly the negotiated type.
    pub fn presign_put(&self, key: &str, content_type: Option<&str>, expires_secs: u64) -> String {
        self.presign_at("PUT", key, content_type, expires_secs, Utc::now())
    }

    pub fn presign_get(&self, key: &str, expires_secs: u64) -> String {
        self.presign_at("GET", key, None, expires_secs, Utc::now())
    }

    /// Signing core with the clock injected.
    fn presign_at(
        &self,
        method: &str,
        key: &str,
        content_type: Option<&str>,
        expires_secs: u64,
        now: DateTime<Utc>,
    ) -> String {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", datestamp, self.region);
        let credential = format!("{}/{}", self.access_key, scope);

        let canonical_uri = format!("/{}/{}", self.bucket, uri_encode(key, false));

        let (canonical_headers, signed_headers) = match content_type {
            Some(ct) => (
                format!("content-type:{}\nhost:{}\n", ct, self.host),
                "content-type;host".to_string(),
            ),
            None => (format!("host:{}\n", self.host), "host".to_string()),
        };

        // Already in canonical (sorted) order.
        let query_pairs = [
            ("X-Amz-Algorithm", "AWS4-HMAC-SHA256".to_string()),
            ("X-Amz-Credential", credential),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", expires_secs.to_string()),
            ("X-Amz-SignedHeaders", signed_headers.clone()),
        ];
        let canonical_query = query_pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, uri_encode(v, true)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\nUNSIGNED-PAYLOAD",
            method, canonical_uri, canonical_query, canonical_headers, signed_headers
        );
        let hashed_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date, scope, hashed_request
        );

        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_key).as_bytes(),
            datestamp.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, b"s3");
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

        format!(
            "{}{}?{}&X-Amz-Signature={}",
            self.endpoint, canonical_uri, canonical_query, signature
        )
    }

    /// Synchronous proxy upload used for profile pictures: the gateway holds
    /// the bytes once and PUTs them itself through a short-lived signed URL.
    pub async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.presign_put(key, Some(content_type), UPLOAD_URL_TTL_SECS);
        let resp = self
            .http
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("storage PUT for {} failed: {} {}", key, status, body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_client() -> StorageClient {
        StorageClient::new(
            reqwest::Client::new(),
            &StorageConfig {
                endpoint: "http://localhost:9000".to_string(),
                region: "us-east-1".to_string(),
                bucket: "repforge-media".to_string(),
                access_key: "AKIDEXAMPLE".to_string(),
                secret_key: "secret".to_string(),
            },
        )
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn presigned_put_carries_expiry_and_signature() {
        let client = test_client();
        let url = client.presign_at(
            "PUT",
            "transformations/7/front.png",
            None,
            UPLOAD_URL_TTL_SECS,
            fixed_now(),
        );

        assert!(url.starts_with("http://localhost:9000/repforge-media/transformations/7/front.png?"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-Date=20260801T120000Z"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));

        let signature = url.split("X-Amz-Signature=").nth(1).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let client = test_client();
        let a = client.presign_at("GET", "transformations/7/front.png", None, 600, fixed_now());
        let b = client.presign_at("GET", "transformations/7/front.png", None, 600, fixed_now());
        assert_eq!(a, b);
    }

    #[test]
    fn method_changes_the_signature() {
        let client = test_client();
        let put = client.presign_at("PUT", "k", None, 600, fixed_now());
        let get = client.presign_at("GET", "k", None, 600, fixed_now());
        let sig = |u: &str| u.split("X-Amz-Signature=").nth(1).unwrap().to_string();
        assert_ne!(sig(&put), sig(&get));
    }

    #[test]
    fn content_type_joins_signed_headers() {
        let client = test_client();
        let url = client.presign_at("PUT", "k", Some("image/png"), 600, fixed_now());
        assert!(url.contains("X-Amz-SignedHeaders=content-type%3Bhost"));
    }

    #[test]
    fn download_urls_use_the_seven_day_window() {
        let client = test_client();
        let url = client.presign_at(
            "GET",
            "transformations/7/front.png",
            None,
            DOWNLOAD_URL_TTL_SECS,
            fixed_now(),
        );
        assert!(url.contains("X-Amz-Expires=604800"));
    }

    #[test]
    fn key_segments_are_encoded_but_slashes_kept() {
        assert_eq!(
            uri_encode("transformations/7/my photo.png", false),
            "transformations/7/my%20photo.png"
        );
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
    }
}
