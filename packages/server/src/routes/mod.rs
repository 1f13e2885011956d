mod v1;

use utoipa_axum::router::OpenApiRouter;

use crate::state::AppState;

/// Everything under `/api`. Each version is nested under its own prefix.
pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1::routes())
}
