// src/routes.rs

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn build_router(app_state: AppState) -> Router {
    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let me_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Rotas protegidas; as de admin ainda passam pelo `RequireRole` nos handlers
    let product_routes = Router::new()
        .route("/api/products"
               ,get(handlers::products::list_products)
               .post(handlers::products::create_product)
        )
        .route("/api/products/{id}"
               ,put(handlers::products::update_product)
        );

    let stock_routes = Router::new()
        .route("/api/stock", get(handlers::stock::get_inventory))
        .route("/api/stock/calendar", get(handlers::stock::get_stock_calendar))
        .route("/api/stock/logs", get(handlers::stock::get_activity_logs))
        .route("/api/stock/log", post(handlers::stock::log_stock_change));

    let protected_routes = product_routes
        .merge(stock_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Combina tudo no router principal
    Router::new()
        .route("/", get(|| async { "Daily Stock API is running" }))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/docs/openapi.json", get(openapi_json))
        .nest("/api/auth", auth_routes.merge(me_routes))
        .merge(protected_routes)
        // Cabeçalhos básicos de segurança em toda resposta
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
