use crate::web::ui::error::AppError;
use crate::web::ui::error_page::error_page_middleware;
use actix_web::http::header::{CacheControl, CacheDirective};
use actix_web::middleware::from_fn;
use actix_web::{get, web, HttpResponse, Responder};
use rust_embed::Embed;
use std::fmt::Write;

mod base_template;
mod endpoints;
pub mod error;
mod error_page;
mod form_values;
mod sub_templates;
mod validation;

pub(crate) const SESSION_COOKIE_NAME: &str = "portal-session";

#[allow(clippy::identity_op)] // We want to explicitly state that it's "1" day
pub(crate) const SESSION_COOKIE_MAX_AGE: std::time::Duration =
    std::time::Duration::from_secs(1 * 86400);

pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(get_ui_service().wrap(from_fn(error_page_middleware)))
        .service(web::scope("/media").service(endpoints::documents::media_file));
}

fn get_ui_service() -> actix_web::Scope {
    web::scope("/ui")
        .service(static_resources)
        .service(endpoints::index)
        .service(endpoints::auth::login_form)
        .service(endpoints::auth::login)
        .service(endpoints::auth::logout)
        .service(endpoints::course_search::course_search)
        .service(endpoints::positions::positions_list)
        .service(endpoints::documents::documents_list)
        .service(endpoints::page::show_page)
        .default_service(web::to(not_found_handler))
}

#[derive(Embed)]
#[folder = "static/"]
struct Resources;

impl Resources {
    fn handle_embedded_file(path: &str) -> HttpResponse {
        match Self::get(path) {
            Some(content) => HttpResponse::Ok()
                .content_type(mime_guess::from_path(path).first_or_octet_stream().as_ref())
                .append_header(CacheControl(vec![CacheDirective::MaxAge(86400 * 365)]))
                .body(content.data.into_owned()),
            None => {
                HttpResponse::NotFound().body(format!("Static resource file '{}' not found", path))
            }
        }
    }
}

#[get("/static/{_:.*}")]
async fn static_resources(path: web::Path<String>) -> impl Responder {
    Resources::handle_embedded_file(path.as_str())
}

async fn not_found_handler() -> Result<&'static str, AppError> {
    Err(AppError::PageNotFound)
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut output, b| {
        let _ = write!(output, "{:02x}", b);
        output
    })
}
