//! Presigned URLs for AWS endpoints reached without an SDK.

mod error;
mod presign;

pub use error::{signing_error_to_status_code, SigningError};
pub use presign::{
    canonical_query_string, canonical_request, derive_signing_key, presign_url, string_to_sign,
    transcribe_streaming_request, Credentials, PresignRequest, ALGORITHM, PRESIGN_EXPIRY_SECONDS,
    TRANSCRIBE_SERVICE, TRANSCRIBE_STREAMING_PATH, TRANSCRIBE_STREAMING_PORT,
};
