//! AWS Signature Version 4 request signing.
//!
//! Every call to Bedrock, AgentCore Memory, and IAM goes through
//! [`SigV4Signer::sign`]. The canonicalisation lives in pure functions so it
//! can be checked against the published test vectors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credentials::{Credentials, CredentialsProvider};
use crate::SigningError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The request pieces that take part in the signature.
#[derive(Debug, Clone)]
pub struct CanonicalParts<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Path exactly as sent on the wire
    pub path: &'a str,
    /// Decoded query pairs
    pub query: Vec<(String, String)>,
    /// Extra headers to sign; `host` and `x-amz-*` are added by the signer
    pub headers: Vec<(String, String)>,
    pub payload: &'a [u8],
}

/// What the signer adds to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureOutput {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
    pub signature: String,
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SigningError::InvalidRequest(format!("signing key rejected: {e}")))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date)?;
    let k_region = hmac(&k_date, region)?;
    let k_service = hmac(&k_region, service)?;
    hmac(&k_service, "aws4_request")
}

/// RFC 3986 encoding with the AWS unreserved set (`A-Z a-z 0-9 - _ . ~`).
pub fn uri_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Canonical URI: each wire segment encoded once more (non-S3 rule).
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".into();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the canonical request string and the signed-header list.
pub fn canonical_request(parts: &CanonicalParts<'_>, amz_date: &str, token: Option<&str>) -> (String, String) {
    let mut headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), normalize_header_value(v)))
        .filter(|(k, _)| k != "host" && k != "x-amz-date" && k != "authorization")
        .collect();
    headers.push(("host".into(), parts.host.to_string()));
    headers.push(("x-amz-date".into(), amz_date.to_string()));
    if let Some(token) = token {
        headers.retain(|(k, _)| k != "x-amz-security-token");
        headers.push(("x-amz-security-token".into(), token.to_string()));
    }
    headers.sort();

    let canonical_headers: String = headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        parts.method.to_ascii_uppercase(),
        canonical_uri(parts.path),
        canonical_query(&parts.query),
        canonical_headers,
        signed_headers,
        sha256_hex(parts.payload),
    );
    (request, signed_headers)
}

/// Sign `parts` at `time` for `region`/`service`.
pub fn sign_parts(
    parts: &CanonicalParts<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    time: DateTime<Utc>,
) -> Result<SignatureOutput, SigningError> {
    let amz_date = time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = time.format("%Y%m%d").to_string();
    let token = credentials.session_token.as_deref();

    let (request, signed_headers) = canonical_request(parts, &amz_date, token);
    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service)?;
    let signature = hex::encode(hmac(&key, &string_to_sign)?);

    Ok(SignatureOutput {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
        amz_date,
        security_token: token.map(str::to_string),
        signature,
    })
}

/// Signs outgoing `reqwest` requests for one service in one region.
#[derive(Clone)]
pub struct SigV4Signer {
    region: String,
    service: String,
    credentials: Arc<dyn CredentialsProvider>,
}

impl SigV4Signer {
    pub fn new(
        region: impl Into<String>,
        service: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
            credentials,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Add `Authorization`, `X-Amz-Date`, and (for temporary credentials)
    /// `X-Amz-Security-Token` to `request`.
    pub async fn sign(&self, request: &mut reqwest::Request) -> Result<(), SigningError> {
        let credentials = self.credentials.credentials().await?;

        let url = request.url().clone();
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(SigningError::InvalidRequest(format!("URL has no host: {url}"))),
        };
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut headers = Vec::new();
        for (name, value) in request.headers() {
            let value = value
                .to_str()
                .map_err(|e| SigningError::InvalidRequest(format!("header {name}: {e}")))?;
            headers.push((name.as_str().to_string(), value.to_string()));
        }

        let payload: Vec<u8> = match request.body() {
            Some(body) => body
                .as_bytes()
                .ok_or_else(|| SigningError::InvalidRequest("streaming bodies cannot be signed".into()))?
                .to_vec(),
            None => Vec::new(),
        };

        let method = request.method().as_str().to_string();
        let parts = CanonicalParts {
            method: &method,
            host: &host,
            path: url.path(),
            query,
            headers,
            payload: &payload,
        };
        let output = sign_parts(&parts, &credentials, &self.region, &self.service, Utc::now())?;

        let headers = request.headers_mut();
        insert_header(headers, "host", &host)?;
        insert_header(headers, "x-amz-date", &output.amz_date)?;
        if let Some(token) = &output.security_token {
            insert_header(headers, "x-amz-security-token", token)?;
        }
        insert_header(headers, "authorization", &output.authorization)?;
        Ok(())
    }
}

fn insert_header(
    headers: &mut reqwest::header::HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), SigningError> {
    let value = reqwest::header::HeaderValue::from_str(value)
        .map_err(|e| SigningError::InvalidRequest(format!("header {name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    #[test]
    fn signing_key_matches_published_example() {
        let key = signing_key(
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
    fn signing_key_accepts_any_secret_length() {
        let long = "k".repeat(300);
        for secret in ["", long.as_str()] {
            let key = signing_key(secret, "20120215", "us-east-1", "iam").unwrap();
            assert_eq!(key.len(), 32);
        }
    }

    #[test]
    fn get_vanilla_vector() {
        let parts = CanonicalParts {
            method: "GET",
            host: "example.amazon.com",
            path: "/",
            query: vec![],
            headers: vec![],
            payload: b"",
        };
        let time = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let out = sign_parts(&parts, &example_credentials(), "us-east-1", "service", time).unwrap();

        assert_eq!(out.amz_date, "20150830T123600Z");
        assert_eq!(
            out.signature,
            "5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(
            out.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn canonical_request_layout() {
        let parts = CanonicalParts {
            method: "post",
            host: "bedrock-runtime.us-east-1.amazonaws.com",
            path: "/model/amazon.nova-pro-v1%3A0/converse",
            query: vec![("b".into(), "2".into()), ("a".into(), "x y".into())],
            headers: vec![("Content-Type".into(), "application/json".into())],
            payload: b"{}",
        };
        let (request, signed) = canonical_request(&parts, "20240101T000000Z", Some("tok"));
        let lines: Vec<&str> = request.lines().collect();

        assert_eq!(lines[0], "POST");
        assert_eq!(lines[1], "/model/amazon.nova-pro-v1%253A0/converse");
        assert_eq!(lines[2], "a=x%20y&b=2");
        assert_eq!(lines[3], "content-type:application/json");
        assert_eq!(lines[4], "host:bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(signed, "content-type;host;x-amz-date;x-amz-security-token");
        assert_eq!(lines.last().copied(), Some(sha256_hex(b"{}").as_str()));
    }

    #[test]
    fn session_token_is_reported() {
        let mut creds = example_credentials();
        creds.session_token = Some("FQoGZXIvYXdzEXAMPLE".into());
        let parts = CanonicalParts {
            method: "GET",
            host: "iam.amazonaws.com",
            path: "/",
            query: vec![],
            headers: vec![],
            payload: b"",
        };
        let out = sign_parts(&parts, &creds, "us-east-1", "iam", Utc::now()).unwrap();
        assert_eq!(out.security_token.as_deref(), Some("FQoGZXIvYXdzEXAMPLE"));
        assert!(out.authorization.contains("x-amz-security-token"));
    }

    #[test]
    fn uri_encode_keeps_unreserved() {
        assert_eq!(uri_encode("abc-_.~XYZ09"), "abc-_.~XYZ09");
        assert_eq!(uri_encode("a:b/c d"), "a%3Ab%2Fc%20d");
    }

    #[tokio::test]
    async fn signer_adds_headers_to_request() {
        let signer = SigV4Signer::new(
            "us-east-1",
            "bedrock",
            Arc::new(crate::credentials::StaticCredentials::new(example_credentials())),
        );
        let client = reqwest::Client::new();
        let mut request = client
            .post("https://bedrock-runtime.us-east-1.amazonaws.com/model/amazon.nova-pro-v1%3A0/converse")
            .header("content-type", "application/json")
            .body("{}")
            .build()
            .unwrap();

        signer.sign(&mut request).await.unwrap();

        let auth = request.headers()["authorization"].to_str().unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(auth.contains("/us-east-1/bedrock/aws4_request"));
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-date"));
        assert!(request.headers().contains_key("x-amz-date"));
        assert!(!request.headers().contains_key("x-amz-security-token"));
    }
}
