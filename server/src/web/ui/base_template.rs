use crate::web::ui::{bytes_to_hex, Resources};
use actix_web::HttpRequest;

/// Common template data for all ui templates extending the `base.html` template
///
/// This struct must be a part of the template data structure, as the field `base`.
/// The contained data and functions can be used by the individual template's code, as well.
#[derive(Debug)]
pub struct BaseTemplateContext<'a> {
    /// The HTTP request the template is used to respond to. Used for creating resource urls.
    pub request: &'a HttpRequest,
    /// HTML title
    pub page_title: &'a str,
    /// Slug of the top-level navigation section the current page belongs to, for highlighting
    /// the matching navigation entry
    pub active_section: &'a str,
}

impl BaseTemplateContext<'_> {
    /// Absolute URL of an embedded static resource, with a content hash query parameter for
    /// cache busting. Falls back to the plain static path when URL generation fails, so this
    /// can be called from templates without error handling.
    pub fn url_for_static(&self, file: &str) -> String {
        match self.request.url_for("static_resources", [file]) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair(
                    "hash",
                    &Resources::get(file)
                        .map(|f| bytes_to_hex(&f.metadata.sha256_hash()))
                        .unwrap_or("unknown".to_string()),
                );
                url.to_string()
            }
            Err(_) => format!("/ui/static/{}", file),
        }
    }
}
