use crate::data_store::models::Document;
use crate::web::ui::base_template::BaseTemplateContext;
use crate::web::ui::error::AppError;
use crate::web::AppState;
use actix_web::web::Html;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use askama::Template;

/// List all uploaded documents, linking to their files below the media root.
#[get("/documents")]
async fn documents_list(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let documents = web::block(move || -> Result<_, AppError> {
        let mut store = state.store.get_facade()?;
        Ok(store.get_documents()?)
    })
    .await??;

    let tmpl = DocumentsTemplate {
        base: BaseTemplateContext {
            request: &req,
            page_title: "Documents",
            active_section: "documents",
        },
        documents: &documents,
    };
    Ok(Html::new(tmpl.render()?))
}

/// Serve an uploaded file from the media root.
///
/// Path segments are checked individually, so relative segments cannot escape the media root.
#[get("/{path:.*}")]
async fn media_file(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let relative_path = path.into_inner();
    if relative_path.is_empty()
        || relative_path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(AppError::PageNotFound);
    }

    let file_path = state.media_root.join(&relative_path);
    let content = web::block(move || std::fs::read(file_path))
        .await?
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::PageNotFound,
            _ => AppError::InternalError(format!("Could not read media file: {}", e)),
        })?;

    Ok(HttpResponse::Ok()
        .content_type(
            mime_guess::from_path(&relative_path)
                .first_or_octet_stream()
                .as_ref(),
        )
        .body(content))
}

#[derive(Template)]
#[template(path = "documents.html")]
struct DocumentsTemplate<'a> {
    base: BaseTemplateContext<'a>,
    documents: &'a [Document],
}
