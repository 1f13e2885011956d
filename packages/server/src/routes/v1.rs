use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/assets", asset_routes())
}

fn asset_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::asset::create_upload_url))
        .routes(routes!(
            handlers::asset::get_asset,
            handlers::asset::delete_asset
        ))
        .routes(routes!(handlers::asset::confirm_upload))
        .routes(routes!(handlers::asset::get_download_url))
}
