use axum::routing::{get, post};
use axum::Router;

use crate::handlers::associations;
use crate::state::AppState;

/// Routes mounted at `/associations`.
///
/// ```text
/// POST   /            -> create_association
/// GET    /{id}        -> get_association
/// POST   /{id}/end    -> end_association
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(associations::create_association))
        .route("/{id}", get(associations::get_association))
        .route("/{id}/end", post(associations::end_association))
}
