//! ACS3-HMAC-SHA256 request signing
//!
//! RPC-style ECS calls carry every parameter in the query string and send an
//! empty body. The signature covers the method, the sorted query, the `host`
//! and `x-acs-*` headers, and the SHA-256 of the body.

use crate::config::Credentials;
use crate::error::{AliyunError, Result};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const ALGORITHM: &str = "ACS3-HMAC-SHA256";

/// RFC 3986 unreserved characters stay as-is; everything else is encoded
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986).to_string()
}

/// Sorted, encoded `k=v&...` string
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Everything that varies per request
#[derive(Debug, Clone)]
pub struct RequestParts<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    pub params: &'a BTreeMap<String, String>,
    /// `%Y-%m-%dT%H:%M:%SZ` in UTC
    pub timestamp: &'a str,
    pub nonce: &'a str,
}

/// Headers to attach plus the query string the signature was computed over
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub query: String,
    pub headers: Vec<(String, String)>,
}

pub struct Signer<'a> {
    credentials: &'a Credentials,
}

impl<'a> Signer<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    pub fn sign(&self, parts: &RequestParts<'_>) -> Result<SignedRequest> {
        let query = canonical_query(parts.params);
        let payload_hash = sha256_hex(b"");

        // BTreeMap keeps header names sorted
        let headers: BTreeMap<&str, &str> = [
            ("host", parts.host),
            ("x-acs-action", parts.action),
            ("x-acs-content-sha256", payload_hash.as_str()),
            ("x-acs-date", parts.timestamp),
            ("x-acs-signature-nonce", parts.nonce),
            ("x-acs-version", parts.version),
        ]
        .into_iter()
        .collect();

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
            .collect();
        let signed_headers = headers.keys().copied().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n/\n{}\n{}\n{}\n{}",
            parts.method, query, canonical_headers, signed_headers, payload_hash
        );
        let string_to_sign = format!(
            "{}\n{}",
            ALGORITHM,
            sha256_hex(canonical_request.as_bytes())
        );

        let mut mac = HmacSha256::new_from_slice(self.credentials.access_key_secret.as_bytes())
            .map_err(|e| AliyunError::Signing(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        let signature = format!("{:x}", mac.finalize().into_bytes());

        let authorization = format!(
            "{} Credential={},SignedHeaders={},Signature={}",
            ALGORITHM, self.credentials.access_key_id, signed_headers, signature
        );

        let mut out: Vec<(String, String)> = headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        out.push(("authorization".to_string(), authorization));

        Ok(SignedRequest {
            query,
            headers: out,
        })
    }
}
