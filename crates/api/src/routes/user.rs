//! Route definitions for the `/user` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::user;
use crate::state::AppState;

/// Routes mounted at `/user`. Every route requires an access token.
pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(user::profile))
}
