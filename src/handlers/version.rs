use axum::Json;
use axum::extract::State;

use crate::build_info::ServiceInfo;
use crate::server::AppState;

pub async fn version(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo::new(&state.policy))
}
