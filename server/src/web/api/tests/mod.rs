
use super::*;
use crate::auth_session::SessionToken;
use crate::data_store::store_mock::StoreMock;
use crate::web::api::throttle::UserRateThrottle;
use crate::web::AppState;
use actix_web::{cookie::Cookie, http, test, App};
use sample_data::{fill_sample_data, SAMPLE_PASSWORD, SAMPLE_TOKEN};
use std::sync::Arc;
use std::time::Duration;

const APP_SECRET: &str = "123456";

fn test_state(throttle: UserRateThrottle) -> AppState {
    let data_store_mock = StoreMock::default();
    fill_sample_data(&data_store_mock);
    AppState {
        store: Arc::new(data_store_mock),
        secret: APP_SECRET.to_string(),
        media_root: std::env::temp_dir(),
        throttle: Arc::new(throttle),
    }
}

fn basic_auth(username: &str, password: &str) -> (String, String) {
    (
        "Authorization".to_string(),
        format!("Basic {}", BASE64.encode(format!("{}:{}", username, password))),
    )
}

#[actix_web::test]
async fn test_menus_require_authentication() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/menus").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers()
            .get("WWW-Authenticate")
            .and_then(|v| v.to_str().ok()),
        Some("Basic realm=\"api\"")
    );

    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .append_header(("X-AUTH-TOKEN", "not-a-valid-token"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_list_menus_with_token_header() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let result: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.len(), 5);
}

#[actix_web::test]
async fn test_list_menus_with_token_query_parameter() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/menus?auth_token={}", SAMPLE_TOKEN))
        .to_request();
    let result: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.len(), 5);
}

#[actix_web::test]
async fn test_token_query_parameter_is_trimmed() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    // Surrounding whitespace (e.g. from a copy-pasted URL) must not invalidate the token
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/menus?auth_token=%20{}%20", SAMPLE_TOKEN))
        .to_request();
    let result: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.len(), 5);
}

#[actix_web::test]
async fn test_list_menus_with_basic_auth() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .append_header(basic_auth("alice", SAMPLE_PASSWORD))
        .to_request();
    let result: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.len(), 5);

    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .append_header(basic_auth("alice", "wrong password"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_list_menus_with_session_cookie() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let session = SessionToken::new(1).as_string(APP_SECRET);
    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .cookie(Cookie::new(SESSION_COOKIE_NAME, session))
        .to_request();
    let result: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.len(), 5);

    // A session signed with a different secret is rejected
    let forged = SessionToken::new(1).as_string("not the app secret");
    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .cookie(Cookie::new(SESSION_COOKIE_NAME, forged))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_inactive_user_is_rejected() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .append_header(basic_auth("mallory", SAMPLE_PASSWORD))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_menu_narrowing() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/menus/frary")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let by_hall: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(by_hall.len(), 3);
    assert!(by_hall.iter().all(|m| m.dining_hall == "frary"));

    let req = test::TestRequest::get()
        .uri("/api/v1/menus/frary/monday")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let by_hall_and_day: Vec<portal_api_types::Menu> =
        test::call_and_read_body_json(&app, req).await;
    assert_eq!(by_hall_and_day.len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/v1/menus/frary/monday/lunch")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let single: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].food_items, vec!["pasta", "salad"]);

    // No matching menus is an empty list, not a 404
    let req = test::TestRequest::get()
        .uri("/api/v1/menus/frary/sunday/lunch")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let empty: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert!(empty.is_empty());
}

#[actix_web::test]
async fn test_list_menus_by_day() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    // The literal "day" segment takes precedence over the {dining_hall} route
    let req = test::TestRequest::get()
        .uri("/api/v1/menus/day/monday")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let by_day: Vec<portal_api_types::Menu> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(by_day.len(), 3);
    assert!(by_day.iter().all(|m| m.day == "monday"));
}

#[actix_web::test]
async fn test_get_token_is_idempotent() {
    let state = test_state(UserRateThrottle::default());
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/token")
        .append_header(basic_auth("alice", SAMPLE_PASSWORD))
        .to_request();
    let first: portal_api_types::TokenInfo = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first.token, SAMPLE_TOKEN);

    let req = test::TestRequest::get()
        .uri("/api/v1/token")
        .append_header(basic_auth("alice", SAMPLE_PASSWORD))
        .to_request();
    let second: portal_api_types::TokenInfo = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second.token, first.token);
}

#[actix_web::test]
async fn test_throttling() {
    let state = test_state(UserRateThrottle::new(2, Duration::from_secs(3600)));
    let app = test::init_service(
        App::new()
            .configure(configure_app)
            .app_data(web::Data::new(state.clone())),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/v1/menus")
            .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), http::StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/menus")
        .append_header(("X-AUTH-TOKEN", SAMPLE_TOKEN))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), http::StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 3600);
}
