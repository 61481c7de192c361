//! Viewer identity supplied by the fronting proxy.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};

use crate::application::error::HttpError;
use crate::domain::entities::UserRecord;

use super::{HttpState, routes};

/// Trusted header carrying the authenticated username.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

const SOURCE: &str = "infra::http::identity";

fn header_username(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(REMOTE_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

async fn resolve_viewer(parts: &Parts, state: &HttpState) -> Result<Option<UserRecord>, HttpError> {
    let Some(username) = header_username(parts) else {
        return Ok(None);
    };
    state.users.resolve(username).await.map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to resolve viewer",
            &err,
        )
    })
}

/// The signed-in user, or `None` for anonymous requests and unknown names.
pub struct CurrentUser(pub Option<UserRecord>);

impl<S> FromRequestParts<S> for CurrentUser
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = HttpState::from_ref(state);
        Ok(Self(resolve_viewer(parts, &state).await?))
    }
}

/// A signed-in user; anonymous requests are sent to the login page.
pub struct RequireUser(pub UserRecord);

impl<S> FromRequestParts<S> for RequireUser
where
    HttpState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = HttpState::from_ref(state);
        match resolve_viewer(parts, &state).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or_else(|| parts.uri.path());
                Err(Redirect::to(&routes::login(next)).into_response())
            }
            Err(err) => Err(err.into_response()),
        }
    }
}
