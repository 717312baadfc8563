//! Mini-app entry points that need only verified launch data.

use axum::Json;

use crate::middleware::auth::VerifiedLaunch;
use crate::models::VerifyResponse;

/// `POST /api/webapp/verify`: return the identity asserted by the launch data.
pub async fn verify_handler(VerifiedLaunch(data): VerifiedLaunch) -> Json<VerifyResponse> {
    Json(VerifyResponse::from(&data))
}
