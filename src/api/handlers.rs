// HTTP request handlers for API endpoints

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use std::time::Instant;

use crate::api::models::*;
use crate::bootstrap::SEED_YEARS;
use crate::database_ops::store::HolidayStore;
use crate::error::SyncError;
use crate::sync::HolidayService;

/// Shared state handed to every handler.
pub struct AppState {
    pub service: HolidayService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: HolidayService) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}

impl ResponseError for SyncError {
    fn status_code(&self) -> StatusCode {
        match self {
            SyncError::ProviderUnavailable(_) | SyncError::EmptyProviderResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
            SyncError::UnknownCountryCode(_) | SyncError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            SyncError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "request failed");
        }
        HttpResponse::build(status).json(ApiResponse::<()>::error(self.code(), self.to_string()))
    }
}

type HandlerResult = Result<HttpResponse, SyncError>;

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let store = match state.service.store().count_countries().await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };
    HttpResponse::Ok().json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        store: store.to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// Re-sync the last six years for every country
pub async fn sync_all(state: web::Data<AppState>) -> HttpResponse {
    tracing::info!(years = SEED_YEARS, "full sync requested");
    let report = state.service.sync_recent_years(SEED_YEARS).await;
    HttpResponse::Ok().json(ApiResponse::success(report))
}

pub async fn sync_range(
    state: web::Data<AppState>,
    payload: web::Json<SyncRangeRequest>,
) -> HandlerResult {
    payload.validate()?;
    tracing::info!(
        start_year = payload.start_year,
        end_year = payload.end_year,
        "range sync requested"
    );
    let report = state
        .service
        .sync_range(payload.start_year, payload.end_year)
        .await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

/// Re-fetch and reconcile a single (country, year)
pub async fn refresh(state: web::Data<AppState>, payload: web::Json<ScopeRequest>) -> HandlerResult {
    let ScopeRequest { country_code, year } = payload.into_inner();
    let outcome = state.service.reconcile_one(&country_code, year).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(RefreshResponse {
        country_code,
        year,
        outcome,
    })))
}

pub async fn delete_holidays(
    state: web::Data<AppState>,
    query: web::Query<ScopeRequest>,
) -> HandlerResult {
    let ScopeRequest { country_code, year } = query.into_inner();
    let deleted_count = state.service.delete_scope(&country_code, year).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(DeleteResponse {
        country_code,
        year,
        deleted_count,
    })))
}

pub async fn search_holidays(
    state: web::Data<AppState>,
    query: web::Query<SearchParams>,
) -> HandlerResult {
    let query = query.into_inner().into_query()?;
    let page = state.service.search(&query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

pub async fn sync_countries(state: web::Data<AppState>) -> HandlerResult {
    let country_count = state.service.sync_countries().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(CountrySyncResponse { country_count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{auth::Auth, routes::configure_routes};
    use crate::config::SyncConfig;
    use crate::database_ops::memory::MemoryHolidayStore;
    use crate::sync::current_year;
    use crate::testing::{country, record, seeded_store, Reply, ScriptedProvider};
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    const SECRET: &str = "test-secret";

    async fn state() -> (Arc<MemoryHolidayStore>, Arc<ScriptedProvider>, web::Data<AppState>) {
        let store = seeded_store(&[("KR", "South Korea"), ("US", "United States")]).await;
        let provider = Arc::new(
            ScriptedProvider::new().with_countries(vec![
                country("KR", "South Korea"),
                country("US", "United States"),
                country("JP", "Japan"),
            ]),
        );
        let service = HolidayService::new(store.clone(), provider.clone(), SyncConfig::default());
        (store, provider, web::Data::new(AppState::new(service)))
    }

    macro_rules! app {
        ($data:expr) => {
            test::init_service(
                App::new()
                    .app_data($data.clone())
                    .wrap(Auth::new(SECRET.to_string()))
                    .configure(configure_routes),
            )
            .await
        };
    }

    fn bearer() -> (&'static str, String) {
        ("Authorization", format!("Bearer {SECRET}"))
    }

    #[actix_web::test]
    async fn health_is_public() {
        let (_, _, data) = state().await;
        let app = app!(data);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["store"], "connected");
    }

    #[actix_web::test]
    async fn api_requires_bearer_token() {
        let (_, _, data) = state().await;
        let app = app!(data);
        let req = test::TestRequest::post().uri("/api/v1/countries/sync").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/v1/countries/sync")
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_reports_outcome_and_errors() {
        let (_, provider, data) = state().await;
        let app = app!(data);
        let year = current_year();

        let req = test::TestRequest::put()
            .uri("/api/v1/holidays/refresh")
            .insert_header(bearer())
            .set_json(json!({"country_code": "KR", "year": year}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["actual_added_count"], 2);

        let cases = [
            (json!({"country_code": "kr", "year": year}), 400, "INVALID_REQUEST"),
            (json!({"country_code": "KR", "year": year + 1}), 400, "INVALID_REQUEST"),
            (json!({"country_code": "JP", "year": year}), 400, "UNKNOWN_COUNTRY_CODE"),
        ];
        for (payload, status, code) in cases {
            let req = test::TestRequest::put()
                .uri("/api/v1/holidays/refresh")
                .insert_header(bearer())
                .set_json(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), status);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"]["code"], code);
        }

        provider.reply("US", year, Reply::Fail);
        let req = test::TestRequest::put()
            .uri("/api/v1/holidays/refresh")
            .insert_header(bearer())
            .set_json(json!({"country_code": "US", "year": year}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn sync_range_and_delete() {
        let (store, _, data) = state().await;
        let app = app!(data);
        let year = current_year();

        let req = test::TestRequest::post()
            .uri("/api/v1/holidays/sync/range")
            .insert_header(bearer())
            .set_json(json!({"start_year": year - 1, "end_year": year}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total_count"], 4);
        assert_eq!(body["data"]["success_count"], 4);
        assert_eq!(store.count_all().await.unwrap(), 8);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/holidays?country_code=KR&year={year}"))
            .insert_header(bearer())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["deleted_count"], 2);
        assert_eq!(store.count_all().await.unwrap(), 6);

        let req = test::TestRequest::post()
            .uri("/api/v1/holidays/sync/range")
            .insert_header(bearer())
            .set_json(json!({"start_year": year, "end_year": year - 1}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn search_pages_results() {
        let (_, provider, data) = state().await;
        let year = current_year();
        let mut records = vec![
            record(&format!("{year}-01-01"), "New Year's Day"),
            record(&format!("{year}-03-01"), "Independence Movement Day"),
            record(&format!("{year}-05-05"), "Children's Day"),
        ];
        records[2].types = vec!["School".into()];
        provider.reply("KR", year, Reply::Records(records));
        data.service.reconcile_one("KR", year).await.unwrap();
        let app = app!(data);

        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/v1/holidays/search?country_code=KR&start_date={year}-01-01&end_date={year}-12-31&size=2"
            ))
            .insert_header(bearer())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["page_info"]["total_elements"], 3);
        assert_eq!(body["data"]["page_info"]["total_pages"], 2);
        assert_eq!(body["data"]["holidays"][0]["name"], "New Year's Day");

        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/v1/holidays/search?country_code=KR&start_date={year}-01-01&end_date={year}-12-31&types=SCHOOL"
            ))
            .insert_header(bearer())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["page_info"]["total_elements"], 1);
        assert_eq!(body["data"]["holidays"][0]["types"], json!(["School"]));

        let req = test::TestRequest::get()
            .uri("/api/v1/holidays/search?country_code=KR&start_date=1970-01-01&end_date=1971-01-01")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn country_sync_replaces_list() {
        let (store, _, data) = state().await;
        let app = app!(data);
        let req = test::TestRequest::post()
            .uri("/api/v1/countries/sync")
            .insert_header(bearer())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["country_count"], 3);
        assert_eq!(store.count_countries().await.unwrap(), 3);
    }

    #[actix_web::test]
    async fn malformed_json_uses_error_envelope() {
        let (_, _, data) = state().await;
        let app = app!(data);
        let req = test::TestRequest::put()
            .uri("/api/v1/holidays/refresh")
            .insert_header(bearer())
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }
}
