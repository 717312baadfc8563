//! Admin contact management. Routes are mounted behind `require_admin`.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AdminListResponse, SetAdminRequest, SetAdminResponse};
use crate::services::auth;

/// `GET /api/admin/contacts/admins`
pub async fn list_admins_handler(State(state): State<AppState>) -> AppResult<Json<AdminListResponse>> {
    Ok(Json(auth::list_admins(&state).await?))
}

/// `PUT /api/admin/contacts/{id}/admin`: promote or demote a contact.
pub async fn set_admin_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    Path(telegram_id): Path<i64>,
    Json(body): Json<SetAdminRequest>,
) -> AppResult<Json<SetAdminResponse>> {
    let resp = auth::set_admin(&state, &actor, telegram_id, body.is_admin).await?;
    Ok(Json(resp))
}
