use axum::{
    Extension, Json,
    extract::{Form, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    auth::{self, IssuedToken, SESSION_COOKIE, SESSION_TTL_DAYS, session},
    users::{self, NewUser, Role, User},
    web::{
        AppState,
        extract::{AuthError, CurrentUser},
        proxy::RequestOrigin,
        responses::{ApiMessage, json_error},
    },
};

const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn process_login(
    State(state): State<AppState>,
    origin: Option<Extension<RequestOrigin>>,
    jar: SignedCookieJar,
    Form(form): Form<Credentials>,
) -> Result<(SignedCookieJar, Json<User>), AuthError> {
    let user = authenticate(state.pool_ref(), &form.email, &form.password).await?;

    let session_token = session::create_session(state.pool_ref(), user.id)
        .await
        .map_err(|err| {
            error!(?err, "failed to create session");
            AuthError::Backend
        })?;

    let secure = origin.is_some_and(|Extension(origin)| origin.is_secure());
    let mut cookie = Cookie::new(SESSION_COOKIE, session_token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));

    info!(user_id = user.id, "session login");
    Ok((jar.add(cookie), Json(user)))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, StatusCode) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(token) = Uuid::parse_str(cookie.value()) {
            if let Err(err) = session::revoke_session(state.pool_ref(), token).await {
                error!(?err, "failed to remove session during logout");
            }
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));

    (jar.remove(removal), StatusCode::NO_CONTENT)
}

pub async fn issue_token(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<IssuedToken>, AuthError> {
    let user = authenticate(state.pool_ref(), &credentials.email, &credentials.password).await?;

    let issued = state.tokens().issue(&user).map_err(|err| {
        error!(?err, "failed to sign access token");
        AuthError::Backend
    })?;

    info!(user_id = user.id, "access token issued");
    Ok(Json(issued))
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), (StatusCode, Json<ApiMessage>)> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Username is required"));
    }

    let email = users::normalize_email(&request.email);
    if !email.contains('@') {
        return Err(json_error(StatusCode::BAD_REQUEST, "A valid email is required"));
    }

    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }

    let password_hash = auth::hash_password(&request.password).map_err(|err| {
        error!(?err, "failed to hash password while registering user");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })?;

    let result = users::insert(
        state.pool_ref(),
        NewUser {
            username,
            email: &email,
            password_hash: &password_hash,
            role: Role::Student,
        },
    )
    .await;

    match result {
        Ok(user) => {
            info!(user_id = user.id, "user registered");
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(err) if users::is_unique_violation(&err) => Err(json_error(
            StatusCode::CONFLICT,
            "Username or email is already registered",
        )),
        Err(err) => {
            error!(?err, "failed to create user");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ))
        }
    }
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn authenticate(pool: &SqlitePool, email: &str, password: &str) -> Result<User, AuthError> {
    let user = match users::find_by_email(pool, email).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AuthError::InvalidCredentials),
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(AuthError::Backend);
        }
    };

    if !auth::verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(user)
}
