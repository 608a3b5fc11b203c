//! Extractors whose rejections are [`BoundaryError`]s.

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::BoundaryError;

/// JSON body that is decoded and then validated with [`validator::Validate`].
///
/// A body that does not parse is rejected as [`BoundaryError::MalformedBody`];
/// a body that parses but violates its constraints is rejected as
/// [`BoundaryError::Validation`] listing every failing field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = BoundaryError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
