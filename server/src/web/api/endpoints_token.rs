use crate::auth_password::generate_api_token;
use crate::web::api::{authenticate_user, extract_credentials, APIError};
use crate::web::AppState;
use actix_web::{get, web, HttpRequest, Responder};

/// Get the authenticated user's API token, creating it on first request.
///
/// The candidate token is generated up front, outside the database transaction; when the user
/// already has a token, the candidate is discarded and the existing token is returned.
#[get("/token")]
async fn get_token(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, APIError> {
    let credentials = extract_credentials(&req);
    let candidate_token = generate_api_token()
        .map_err(|e| APIError::InternalError(format!("Could not generate token: {}", e)))?;

    let token: portal_api_types::TokenInfo = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let user = authenticate_user(&mut *store, &credentials, &state.secret)?;
        state.throttle.check_rate_limit(user.id)?;
        Ok(store.get_or_create_api_token(user.id, candidate_token)?)
    })
    .await??
    .into();

    Ok(web::Json(token))
}
