use crate::data_store::models::PositionWithAppointee;
use crate::web::ui::base_template::BaseTemplateContext;
use crate::web::ui::error::AppError;
use crate::web::AppState;
use actix_web::web::Html;
use actix_web::{get, web, HttpRequest, Responder};
use askama::Template;

/// List the active positions with their current appointee.
#[get("/positions")]
async fn positions_list(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, AppError> {
    let today = chrono::Local::now().date_naive();

    let positions = web::block(move || -> Result<_, AppError> {
        let mut store = state.store.get_facade()?;
        Ok(store.get_positions(true, today)?)
    })
    .await??;

    let tmpl = PositionsTemplate {
        base: BaseTemplateContext {
            request: &req,
            page_title: "Positions",
            active_section: "positions",
        },
        positions: &positions,
    };
    Ok(Html::new(tmpl.render()?))
}

#[derive(Template)]
#[template(path = "positions.html")]
struct PositionsTemplate<'a> {
    base: BaseTemplateContext<'a>,
    positions: &'a [PositionWithAppointee],
}
