use crate::data_store::MenuFilter;
use crate::web::api::{authenticate_user, extract_credentials, APIError};
use crate::web::AppState;
use actix_web::{get, web, HttpRequest, Responder};

#[get("/menus")]
async fn list_menus(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, APIError> {
    filtered_menus(state, req, MenuFilter::default()).await
}

#[get("/menus/day/{day}")]
async fn list_menus_for_day(
    path: web::Path<String>,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, APIError> {
    let filter = MenuFilter {
        day: Some(path.into_inner()),
        ..Default::default()
    };
    filtered_menus(state, req, filter).await
}

#[get("/menus/{dining_hall}")]
async fn list_menus_for_hall(
    path: web::Path<String>,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, APIError> {
    let filter = MenuFilter {
        dining_hall: Some(path.into_inner()),
        ..Default::default()
    };
    filtered_menus(state, req, filter).await
}

#[get("/menus/{dining_hall}/{day}")]
async fn list_menus_for_hall_and_day(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, APIError> {
    let (dining_hall, day) = path.into_inner();
    let filter = MenuFilter {
        dining_hall: Some(dining_hall),
        day: Some(day),
        meal: None,
    };
    filtered_menus(state, req, filter).await
}

#[get("/menus/{dining_hall}/{day}/{meal}")]
async fn list_menus_for_hall_day_and_meal(
    path: web::Path<(String, String, String)>,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, APIError> {
    let (dining_hall, day, meal) = path.into_inner();
    let filter = MenuFilter {
        dining_hall: Some(dining_hall),
        day: Some(day),
        meal: Some(meal),
    };
    filtered_menus(state, req, filter).await
}

/// Shared implementation of the menu endpoints: authenticate, throttle, query.
///
/// An empty result list is a valid response, not a 404.
async fn filtered_menus(
    state: web::Data<AppState>,
    req: HttpRequest,
    filter: MenuFilter,
) -> Result<web::Json<Vec<portal_api_types::Menu>>, APIError> {
    let credentials = extract_credentials(&req);
    let menus: Vec<portal_api_types::Menu> = web::block(move || -> Result<_, APIError> {
        let mut store = state.store.get_facade()?;
        let user = authenticate_user(&mut *store, &credentials, &state.secret)?;
        state.throttle.check_rate_limit(user.id)?;
        Ok(store.get_menus(filter)?)
    })
    .await??
    .into_iter()
    .map(|m| m.into())
    .collect();

    Ok(web::Json(menus))
}
