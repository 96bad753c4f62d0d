use crate::auth_password::verify_password;
use crate::auth_session::SessionToken;
use crate::web::ui::base_template::BaseTemplateContext;
use crate::web::ui::error::AppError;
use crate::web::ui::form_values::FormValue;
use crate::web::ui::sub_templates::form_inputs::HiddenInputTemplate;
use crate::web::ui::{SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME};
use crate::web::AppState;
use actix_web::http::header;
use actix_web::http::header::{ContentType, TryIntoHeaderValue};
use actix_web::web::Html;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use askama::Template;
use log::info;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct LoginQueryData {
    pub redirect_to: Option<String>,
}

#[derive(Deserialize)]
struct LoginFormData {
    username: String,
    password: String,
}

#[get("/login")]
async fn login_form(
    query: web::Query<LoginQueryData>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let tmpl = build_login_form_template(&req, query.into_inner().redirect_to, None)?;
    Ok(Html::new(tmpl.render()?))
}

#[post("/login")]
async fn login(
    state: web::Data<AppState>,
    data: web::Form<LoginFormData>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let data = data.into_inner();
    let today = chrono::Local::now().date_naive();

    let result = web::block(move || -> Result<_, AppError> {
        let mut store = state.store.get_facade()?;
        let user = store.get_user_by_username(&data.username)?;
        let password_valid = verify_password(&data.password, &user.password_hash)
            .map_err(|e| AppError::InternalError(format!("Invalid stored password hash: {}", e)))?;
        if !password_valid || !user.is_active {
            return Err(AppError::NotAuthenticated);
        }
        let sync_report = store.sync_permissions_on_login(&data.username, today)?;
        Ok((user, sync_report, state.secret.clone()))
    })
    .await?;

    let redirect_query: LoginQueryData =
        serde_urlencoded::from_str(req.query_string()).unwrap_or(LoginQueryData {
            redirect_to: None,
        });

    match result {
        Ok((user, sync_report, secret)) => {
            if !sync_report.granted.is_empty() {
                info!(
                    "Granted position permissions to '{}' on login: {}",
                    user.username,
                    sync_report.granted.join(", ")
                );
            }
            if !sync_report.revoked.is_empty() {
                info!(
                    "Revoked position permissions from '{}' on login: {}",
                    user.username,
                    sync_report.revoked.join(", ")
                );
            }
            Ok(HttpResponse::SeeOther()
                .cookie(create_session_cookie(SessionToken::new(user.id), &secret))
                .append_header((
                    header::LOCATION,
                    safe_redirect_target(redirect_query.redirect_to),
                ))
                .finish())
        }
        Err(AppError::EntityNotFound) | Err(AppError::NotAuthenticated) => {
            let tmpl = build_login_form_template(
                &req,
                redirect_query.redirect_to,
                Some("Unknown username or wrong password."),
            )?;
            Ok(HttpResponse::UnprocessableEntity()
                .append_header((
                    header::CONTENT_TYPE,
                    ContentType::html().try_into_value().unwrap(),
                ))
                .body(tmpl.render()?))
        }
        Err(e) => Err(e),
    }
}

#[get("/logout")]
async fn logout() -> Result<impl Responder, AppError> {
    let mut cookie = actix_web::cookie::Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookie.set_expires(actix_web::cookie::time::OffsetDateTime::UNIX_EPOCH);
    Ok(HttpResponse::SeeOther()
        .cookie(cookie)
        .append_header((header::LOCATION, "/ui/login"))
        .finish())
}

/// Only allow redirecting to a local absolute path, to prevent open redirects.
fn safe_redirect_target(redirect_to: Option<String>) -> String {
    match redirect_to {
        Some(target) if target.starts_with('/') && !target.starts_with("//") => target,
        _ => "/ui/courses".to_owned(),
    }
}

fn build_login_form_template<'a>(
    req: &'a HttpRequest,
    redirect_to: Option<String>,
    error: Option<&'a str>,
) -> Result<LoginFormTemplate<'a>, AppError> {
    let redirect_value: FormValue<String> = FormValue::from(redirect_to.unwrap_or_default());
    let redirect_input = HiddenInputTemplate::new(&redirect_value, "redirect_to")?.render()?;
    Ok(LoginFormTemplate {
        base: BaseTemplateContext {
            request: req,
            page_title: "Login",
            active_section: "",
        },
        redirect_input,
        error,
    })
}

fn create_session_cookie(session_token: SessionToken, secret: &str) -> actix_web::cookie::Cookie {
    let mut cookie =
        actix_web::cookie::Cookie::new(SESSION_COOKIE_NAME, session_token.as_string(secret));
    cookie.set_path("/");
    cookie.set_expires(actix_web::cookie::time::OffsetDateTime::now_utc() + SESSION_COOKIE_MAX_AGE);
    cookie
}

#[derive(Template)]
#[template(path = "login_form.html")]
struct LoginFormTemplate<'a> {
    base: BaseTemplateContext<'a>,
    redirect_input: String,
    error: Option<&'a str>,
}
