use crate::data_store::StoreError;
use crate::web::ui::base_template::BaseTemplateContext;
use crate::web::ui::error::AppError;
use crate::web::AppState;
use actix_web::web::Html;
use actix_web::{get, web, HttpRequest, Responder};
use askama::Template;

/// Render a page from the page tree, addressed by its slash-separated slug path.
///
/// Unknown paths (including paths below managed top-level pages) are a 404, not an error page
/// about a missing entity.
#[get("/pages/{slug_path:.*}")]
async fn show_page(
    path: web::Path<String>,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let slug_path = path.into_inner();

    let resolved = web::block(move || -> Result<_, AppError> {
        let segments = split_slug_path(&slug_path).ok_or(AppError::PageNotFound)?;
        let mut store = state.store.get_facade()?;
        store.resolve_page(&segments).map_err(|e| match e {
            StoreError::NotExisting => AppError::PageNotFound,
            e => e.into(),
        })
    })
    .await??;

    let body_html = comrak::markdown_to_html(&resolved.page.body, &comrak::Options::default());
    let tmpl = PageTemplate {
        base: BaseTemplateContext {
            request: &req,
            page_title: &resolved.page.title,
            active_section: &resolved.active_section,
        },
        title: &resolved.page.title,
        body_html,
    };
    Ok(Html::new(tmpl.render()?))
}

/// Split a slug path into its segments.
///
/// A single trailing slash is tolerated; any other empty segment (as in "a//b") makes the path
/// unresolvable.
fn split_slug_path(path: &str) -> Option<Vec<&str>> {
    let path = path.strip_suffix('/').unwrap_or(path);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        None
    } else {
        Some(segments)
    }
}

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    base: BaseTemplateContext<'a>,
    title: &'a str,
    /// Page body, already rendered from Markdown to HTML
    body_html: String,
}

#[cfg(test)]
mod tests {
    use super::split_slug_path;

    #[test]
    fn test_split_slug_path() {
        assert_eq!(split_slug_path("a/b/c"), Some(vec!["a", "b", "c"]));
        assert_eq!(split_slug_path("a/b/"), Some(vec!["a", "b"]));
        assert_eq!(split_slug_path("a"), Some(vec!["a"]));
        assert_eq!(split_slug_path("a//b"), None);
        assert_eq!(split_slug_path("a//"), None);
        assert_eq!(split_slug_path("/a"), None);
        assert_eq!(split_slug_path(""), None);
    }
}
