use actix_web::http::header;
use actix_web::{get, HttpResponse, Responder};

pub mod auth;
pub mod course_search;
pub mod documents;
pub mod page;
pub mod positions;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/ui/courses"))
        .finish()
}
