// ============================================================================
// Axum Extractors
// ============================================================================
//
// CallerId: the pre-validated caller identity. Token issuance and signature
// verification live in the external identity layer; by the time a request
// reaches the engine its identity has been checked and travels in the
// X-User-Id header.
//
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const CALLER_HEADER: &str = "x-user-id";

/// Extractor for the authenticated caller id.
///
/// Usage:
/// ```rust,ignore
/// async fn handler(caller: CallerId, ...) -> Result<...> {
///     let user_id = caller.0;
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::invalid("missing X-User-Id header"))?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| AppError::invalid("malformed X-User-Id header"))?;

        Ok(CallerId(user_id))
    }
}
