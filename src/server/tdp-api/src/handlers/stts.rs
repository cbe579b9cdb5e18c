//! STT handlers.

use axum::extract::State;
use axum::Json;
use tdp_users::RegionSummary;

use crate::error::ApiResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// Regions with their STTs, ordered by region then STT name.
///
/// GET /v1/stts/all
pub async fn list_regions(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<RegionSummary>>> {
    Ok(Json(state.directory.regions_with_stts().await?))
}
