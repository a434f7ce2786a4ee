//! AWS Signature Version 4 query-string presigning.
//!
//! The presigned URL carries the credentials scope and signature in its query
//! string, so a WebSocket client can connect without a signed handshake. The
//! output must match the remote verifier byte for byte: the query string that
//! is hashed is the exact `String` embedded in the URL.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::SigningError;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const REQUEST_TYPE: &str = "aws4_request";
pub const SIGNED_HEADERS: &str = "host";
pub const PRESIGN_EXPIRY_SECONDS: u32 = 300;
const SECRET_KEY_PREFIX: &str = "AWS4";

pub const TRANSCRIBE_SERVICE: &str = "transcribe";
pub const TRANSCRIBE_STREAMING_PORT: u16 = 8443;
pub const TRANSCRIBE_STREAMING_PATH: &str = "/stream-transcription-websocket";

/// Short-lived AWS credentials used to sign a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Everything that goes into a presigned GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    pub credentials: Credentials,
    pub region: String,
    pub service: String,
    pub host: String,
    pub port: u16,
    /// Canonical absolute path, e.g. `/stream-transcription-websocket`.
    pub path: String,
    /// Caller parameters, unencoded.
    pub params: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub expires_in: u32,
}

impl PresignRequest {
    /// Timestamp in the `YYYYMMDDTHHMMSSZ` form used by `X-Amz-Date`.
    pub fn amz_date(&self) -> String {
        self.timestamp.format("%Y%m%dT%H%M%SZ").to_string()
    }

    /// Date in the `YYYYMMDD` form used by the scope and the signing key.
    pub fn date_stamp(&self) -> String {
        self.timestamp.format("%Y%m%d").to_string()
    }

    /// Pattern: `<date>/<region>/<service>/aws4_request`
    pub fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.date_stamp(),
            self.region,
            self.service,
            REQUEST_TYPE
        )
    }

    fn host_header(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builds the presign request for the streaming transcription WebSocket.
pub fn transcribe_streaming_request(
    credentials: Credentials,
    region: &str,
    language_code: &str,
    sample_rate: u32,
    timestamp: DateTime<Utc>,
) -> PresignRequest {
    let mut params = BTreeMap::new();
    params.insert("language-code".to_string(), language_code.to_string());
    params.insert("media-encoding".to_string(), "pcm".to_string());
    params.insert("sample-rate".to_string(), sample_rate.to_string());

    PresignRequest {
        credentials,
        region: region.to_string(),
        service: TRANSCRIBE_SERVICE.to_string(),
        host: format!("transcribestreaming.{region}.amazonaws.com"),
        port: TRANSCRIBE_STREAMING_PORT,
        path: TRANSCRIBE_STREAMING_PATH.to_string(),
        params,
        timestamp,
        expires_in: PRESIGN_EXPIRY_SECONDS,
    }
}

/// Produces a `wss://` URL authorizing a single GET of `request`.
///
/// Fails with `MissingCredentials` before any hashing when the access key or
/// secret key is empty.
pub fn presign_url(request: &PresignRequest) -> Result<String, SigningError> {
    let credentials = &request.credentials;
    if credentials.access_key_id.is_empty() {
        return Err(SigningError::MissingCredentials("access key"));
    }
    if credentials.secret_access_key.is_empty() {
        return Err(SigningError::MissingCredentials("secret key"));
    }

    let query = canonical_query_string(request);
    let canonical = canonical_request(request, &query);
    let to_sign = string_to_sign(request, &canonical);
    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        &request.date_stamp(),
        &request.region,
        &request.service,
    )?;
    let signature = hex::encode(hmac_sha256(&signing_key, to_sign.as_bytes())?);

    Ok(format!(
        "wss://{}{}?{}&X-Amz-Signature={}",
        request.host_header(),
        request.path,
        query,
        signature
    ))
}

/// Encoded, sorted query string including the signing metadata.
pub fn canonical_query_string(request: &PresignRequest) -> String {
    let credentials = &request.credentials;
    let mut params: Vec<(String, String)> = request
        .params
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    params.push(("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()));
    params.push((
        "X-Amz-Credential".to_string(),
        format!(
            "{}/{}",
            credentials.access_key_id,
            request.credential_scope()
        ),
    ));
    params.push(("X-Amz-Date".to_string(), request.amz_date()));
    params.push(("X-Amz-Expires".to_string(), request.expires_in.to_string()));
    params.push(("X-Amz-SignedHeaders".to_string(), SIGNED_HEADERS.to_string()));
    if let Some(token) = &credentials.session_token {
        params.push(("X-Amz-Security-Token".to_string(), token.clone()));
    }

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (uri_encode(key), uri_encode(value)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical request for a bodiless GET signed over the `host` header only.
pub fn canonical_request(request: &PresignRequest, canonical_query: &str) -> String {
    format!(
        "GET\n{}\n{}\nhost:{}\n\n{}\n{}",
        request.path,
        canonical_query,
        request.host_header(),
        SIGNED_HEADERS,
        sha256_hex(b"")
    )
}

pub fn string_to_sign(request: &PresignRequest, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        request.amz_date(),
        request.credential_scope(),
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Four-stage HMAC chain: date, region, service, then the request type.
pub fn derive_signing_key(
    secret_access_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let secret = format!("{SECRET_KEY_PREFIX}{secret_access_key}");
    let date_key = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, service.as_bytes())?;
    hmac_sha256(&service_key, REQUEST_TYPE.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Strict percent-encoding: only `A-Z a-z 0-9 - _ . ~` pass through and a
/// space becomes `%20`.
fn uri_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
