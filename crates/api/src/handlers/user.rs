//! Handlers for the `/user` resource.

use axum::extract::State;
use axum::Json;
use keystone_core::error::CoreError;
use keystone_core::types::Timestamp;
use keystone_db::models::user::User;
use keystone_db::repositories::UserRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Public view of a user. Ids are strings so 64-bit values survive JSON clients.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub display_name: String,
    pub email: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            avatar: user.avatar,
            display_name: user.display_name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// GET /api/v{VERSION}/user/profile
pub async fn profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<UserProfile>>> {
    let user = UserRepo::find_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User" }))?;

    Ok(Json(DataResponse { data: user.into() }))
}
