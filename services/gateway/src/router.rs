use crate::handlers::{queue, rank, ws};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/queue",
            post(queue::join_queue).get(queue::queue_status).delete(queue::leave_queue),
        )
        .route("/rank/{rating}", get(rank::get_rank))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
