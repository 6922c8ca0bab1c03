use axum::{
    Json, async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use tracing::error;

use crate::{
    auth::{SESSION_COOKIE, TokenError, session},
    users::{self, User},
    web::{AppState, responses::ApiMessage},
};

/// A request authenticated by session cookie or bearer token.
pub struct CurrentUser(pub User);

/// A [`CurrentUser`] holding the admin role.
pub struct AdminUser(pub User);

/// Authentication failures. Every variant except `Backend` means "unauthenticated".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    InvalidCredentials,
    InvalidToken,
    ExpiredToken,
    Forbidden,
    Backend,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Invalid => AuthError::InvalidToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message, challenge) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "Authentication required",
                Some("Bearer"),
            ),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password", None)
            }
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid authentication token",
                Some(r#"Bearer error="invalid_token""#),
            ),
            AuthError::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                "Authentication token has expired",
                Some(r#"Bearer error="invalid_token", error_description="expired""#),
            ),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Administrator access required", None),
            AuthError::Backend => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                None,
            ),
        };

        let mut response = (status, Json(ApiMessage::new(message))).into_response();
        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        response
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|never| -> AuthError { match never {} })?;

        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            if let Some(user) = session::load_user(state.pool_ref(), cookie.value()).await {
                return Ok(CurrentUser(user));
            }
        }

        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingCredentials)?;
        let claims = state.tokens().verify(token)?;
        let user_id = claims.user_id().ok_or(AuthError::InvalidToken)?;

        match users::find_by_id(state.pool_ref(), user_id).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            // Token outlived its user.
            Ok(None) => Err(AuthError::InvalidToken),
            Err(err) => {
                error!(?err, user_id, "failed to load token user");
                Err(AuthError::Backend)
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
