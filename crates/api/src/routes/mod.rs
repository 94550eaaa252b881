pub mod assets;
pub mod associations;
pub mod clients;
pub mod health;
pub mod locks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /clients                               list, create
/// /clients/{id}                          get
/// /clients/{id}/associations             association history (?active_only)
///
/// /assets                                list (?status_id), register
/// /assets/{id}                           get, soft-delete
/// /assets/{id}/associations              association history
///
/// /associations                          open (POST)
/// /associations/{id}                     get
/// /associations/{id}/end                 close (POST)
///
/// /locks/sweep                           purge expired locks (POST)
/// /locks/{operation_type}/{resource_id}  live lock or null
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/clients", clients::router())
        .nest("/assets", assets::router())
        .nest("/associations", associations::router())
        .nest("/locks", locks::router())
}
