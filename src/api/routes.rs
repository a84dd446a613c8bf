// API route configuration

use actix_web::{error, web, HttpResponse};

use crate::api::handlers;
use crate::api::models::ApiResponse;

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::error("INVALID_REQUEST", message))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Body/query decode failures answer with the regular error envelope.
    let json_cfg = web::JsonConfig::default().error_handler(|err, _| {
        let resp = bad_request(err.to_string());
        error::InternalError::from_response(err, resp).into()
    });
    let query_cfg = web::QueryConfig::default().error_handler(|err, _| {
        let resp = bad_request(err.to_string());
        error::InternalError::from_response(err, resp).into()
    });

    cfg.app_data(json_cfg)
        .app_data(query_cfg)
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                .route("/holidays/sync/all", web::post().to(handlers::sync_all))
                .route("/holidays/sync/range", web::post().to(handlers::sync_range))
                .route("/holidays/refresh", web::put().to(handlers::refresh))
                .route("/holidays/search", web::get().to(handlers::search_holidays))
                .route("/holidays", web::delete().to(handlers::delete_holidays))
                .route("/countries/sync", web::post().to(handlers::sync_countries)),
        );
}
