use std::fmt::Display;

mod endpoints_menu;
mod endpoints_token;
pub mod throttle;
#[cfg(test)]
mod tests;

use crate::auth_password;
use crate::auth_session::SessionToken;
use crate::data_store::{models, PortalStoreFacade, StoreError};
use crate::web::ui::{SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME};
use actix_web::error::JsonPayloadError;
use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    web, HttpRequest, HttpResponse,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(get_api_service());
}

fn get_api_service() -> actix_web::Scope {
    let json_config =
        web::JsonConfig::default().error_handler(|err, _req| APIError::InvalidJson(err).into());
    // The "/menus/day/..." route must be registered before the "/menus/{dining_hall}/..."
    // routes, so the literal "day" segment takes precedence.
    web::scope("/api/v1")
        .app_data(json_config)
        .service(endpoints_token::get_token)
        .service(endpoints_menu::list_menus)
        .service(endpoints_menu::list_menus_for_day)
        .service(endpoints_menu::list_menus_for_hall)
        .service(endpoints_menu::list_menus_for_hall_and_day)
        .service(endpoints_menu::list_menus_for_hall_day_and_meal)
}

#[derive(Debug)]
pub enum APIError {
    NotExisting,
    AlreadyExisting,
    /// The request carries no valid credentials (token, password or session)
    NotAuthenticated,
    /// The per-user request rate limit has been exceeded
    Throttled {
        retry_after_secs: u64,
    },
    InvalidJson(actix_web::error::JsonPayloadError),
    InvalidData(String),
    TransactionConflict,
    InternalError(String),
}

impl Display for APIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotExisting => f.write_str("Element does not exist")?,
            Self::AlreadyExisting => {
                f.write_str("Element already exists")?;
            }
            Self::NotAuthenticated => {
                f.write_str("Authentication credentials were not provided or are not valid.")?;
            }
            Self::Throttled { retry_after_secs } => {
                write!(
                    f,
                    "Request was throttled. Expected available in {} seconds.",
                    retry_after_secs
                )?;
            }
            Self::InternalError(s) => {
                f.write_str("Internal error: ")?;
                f.write_str(s)?;
            }
            Self::InvalidJson(e) => {
                write!(f, "Invalid JSON request data: {}", e)?;
            }
            Self::InvalidData(e) => {
                write!(f, "Invalid request data: {}", e)?;
            }
            Self::TransactionConflict => {
                f.write_str("Concurrent database transaction conflict. Please retry request.")?;
            }
        };
        Ok(())
    }
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse {
        let message = format!("{}", self);

        let mut response = HttpResponse::build(self.status_code());
        match self {
            Self::NotAuthenticated => {
                response.insert_header(("WWW-Authenticate", "Basic realm=\"api\""));
            }
            Self::Throttled { retry_after_secs } => {
                response.insert_header(("Retry-After", retry_after_secs.to_string()));
            }
            _ => {}
        }
        response.insert_header(ContentType::json()).json(json!({
            "httpCode": self.status_code().as_u16(),
            "message": message
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotExisting => StatusCode::NOT_FOUND,
            Self::AlreadyExisting => StatusCode::CONFLICT,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidJson(e) => match e {
                JsonPayloadError::ContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                JsonPayloadError::Deserialize(json_error) if json_error.is_data() => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::BAD_REQUEST,
            },
            Self::InvalidData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TransactionConflict => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConnectionError(error) => {
                Self::InternalError(format!("Could not connect to database: {}", error))
            }
            StoreError::QueryError(diesel_error) => Self::InternalError(format!(
                "Error while executing database query: {}",
                diesel_error
            )),
            StoreError::TransactionConflict => Self::TransactionConflict,
            StoreError::NotExisting => Self::NotExisting,
            StoreError::ConflictEntityExists => Self::AlreadyExisting,
            StoreError::InvalidInputData(e) => Self::InvalidData(e),
            StoreError::InvalidDataInDatabase(e) => Self::InternalError(format!(
                "Data queried from database could not be deserialized: {}",
                e
            )),
        }
    }
}

impl From<actix_web::error::BlockingError> for APIError {
    fn from(_e: actix_web::error::BlockingError) -> Self {
        APIError::InternalError(
            "Could not get thread from thread pool for synchronous database operation.".to_owned(),
        )
    }
}

impl From<throttle::ThrottledError> for APIError {
    fn from(e: throttle::ThrottledError) -> Self {
        APIError::Throttled {
            retry_after_secs: e.retry_after_secs,
        }
    }
}

/// The request credentials that the client presented, in order of precedence
#[derive(Debug, Clone)]
pub enum Credentials {
    /// An API token from the `auth_token` query parameter or the X-AUTH-TOKEN header
    Token(String),
    /// Username and password from an `Authorization: Basic` header
    Password { username: String, password: String },
    /// A signed session cookie from a browser login
    SessionCookie(String),
}

#[derive(Deserialize)]
struct AuthTokenQuery {
    auth_token: Option<String>,
}

/// Extract the client's credentials from the request.
///
/// Checked in order: the `auth_token` query parameter, the X-AUTH-TOKEN header, HTTP Basic
/// authentication, the session cookie. Only the first present source is used.
pub fn extract_credentials(req: &HttpRequest) -> Option<Credentials> {
    if let Ok(query) = serde_urlencoded::from_str::<AuthTokenQuery>(req.query_string()) {
        if let Some(token) = query.auth_token {
            // Query parameters may carry (encoded) surrounding whitespace from copy-pasted URLs
            return Some(Credentials::Token(token.trim().to_owned()));
        }
    }

    if let Some(header) = req.headers().get("X-AUTH-TOKEN") {
        if let Ok(token) = header.to_str() {
            return Some(Credentials::Token(token.to_owned()));
        }
    }

    if let Some(header) = req.headers().get(actix_web::http::header::AUTHORIZATION) {
        if let Some(encoded) = header.to_str().ok().and_then(|v| v.strip_prefix("Basic ")) {
            let decoded = BASE64.decode(encoded.trim()).ok()?;
            let decoded = String::from_utf8(decoded).ok()?;
            let (username, password) = decoded.split_once(':')?;
            return Some(Credentials::Password {
                username: username.to_owned(),
                password: password.to_owned(),
            });
        }
    }

    req.cookie(SESSION_COOKIE_NAME)
        .map(|cookie| Credentials::SessionCookie(cookie.value().to_owned()))
}

/// Resolve the given credentials to an active user account.
///
/// Any failure (unknown token, wrong password, invalid session, inactive account) is reported
/// uniformly as [APIError::NotAuthenticated].
pub fn authenticate_user(
    store: &mut dyn PortalStoreFacade,
    credentials: &Option<Credentials>,
    secret: &str,
) -> Result<models::User, APIError> {
    let user = match credentials {
        None => return Err(APIError::NotAuthenticated),
        Some(Credentials::Token(token)) => store.get_user_by_api_token(token).map_err(|e| match e {
            StoreError::NotExisting => APIError::NotAuthenticated,
            e => e.into(),
        })?,
        Some(Credentials::Password { username, password }) => {
            let user = store.get_user_by_username(username).map_err(|e| match e {
                StoreError::NotExisting => APIError::NotAuthenticated,
                e => e.into(),
            })?;
            let password_valid = auth_password::verify_password(password, &user.password_hash)
                .map_err(|e| APIError::InternalError(format!("Invalid stored password hash: {}", e)))?;
            if !password_valid {
                return Err(APIError::NotAuthenticated);
            }
            user
        }
        Some(Credentials::SessionCookie(cookie_value)) => {
            let session_token =
                SessionToken::from_string(cookie_value, secret, SESSION_COOKIE_MAX_AGE)
                    .map_err(|_| APIError::NotAuthenticated)?;
            store.get_user(session_token.user_id()).map_err(|e| match e {
                StoreError::NotExisting => APIError::NotAuthenticated,
                e => e.into(),
            })?
        }
    };
    if !user.is_active {
        return Err(APIError::NotAuthenticated);
    }
    Ok(user)
}
