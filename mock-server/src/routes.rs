use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthResponse, Credentials, Crop, CropPatch, CropStats, Farmer, FarmerDetail, FarmerPatch,
    FarmerStats, Message, NewCrop, NewFarmer, PasswordChange, UserView,
};
use crate::store::Caller;
use crate::Db;

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<Db> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        let caller = db.read().await.authenticate(token, Utc::now());
        if let Err(e) = &caller {
            debug!(status = %e.status, "rejected token");
        }
        caller
    }
}

// --- auth ---

pub async fn login(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> ApiResult<Json<AuthResponse>> {
    let auth = db.write().await.login(&input)?;
    info!(email = %auth.user.email, "login");
    Ok(Json(auth))
}

pub async fn register(
    State(db): State<Db>,
    Json(input): Json<NewFarmer>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let auth = db.write().await.register(input)?;
    info!(email = %auth.user.email, "registered farmer");
    Ok((StatusCode::CREATED, Json(auth)))
}

pub async fn profile(State(db): State<Db>, caller: Caller) -> ApiResult<Json<UserView>> {
    db.read().await.profile(&caller).map(Json)
}

pub async fn change_password(
    State(db): State<Db>,
    caller: Caller,
    Json(input): Json<PasswordChange>,
) -> ApiResult<Json<Message>> {
    db.write().await.change_password(&caller, &input)?;
    Ok(Json(Message::new("Password changed successfully")))
}

// --- farmers ---

pub async fn list_farmers(State(db): State<Db>, caller: Caller) -> ApiResult<Json<Vec<Farmer>>> {
    db.read().await.list_farmers(&caller).map(Json)
}

pub async fn get_farmer(
    State(db): State<Db>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FarmerDetail>> {
    db.read().await.farmer_detail(&caller, id).map(Json)
}

pub async fn create_farmer(
    State(db): State<Db>,
    caller: Caller,
    Json(input): Json<NewFarmer>,
) -> ApiResult<(StatusCode, Json<Farmer>)> {
    let farmer = db.write().await.create_farmer(&caller, input)?;
    info!(id = %farmer.id, "created farmer");
    Ok((StatusCode::CREATED, Json(farmer)))
}

pub async fn update_farmer(
    State(db): State<Db>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<FarmerPatch>,
) -> ApiResult<Json<Farmer>> {
    db.write().await.update_farmer(&caller, id, patch).map(Json)
}

pub async fn delete_farmer(
    State(db): State<Db>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    db.write().await.delete_farmer(&caller, id)?;
    info!(%id, "deleted farmer");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn farmer_stats(State(db): State<Db>, caller: Caller) -> ApiResult<Json<FarmerStats>> {
    db.read().await.farmer_stats(&caller).map(Json)
}

// --- crops ---

pub async fn list_crops(State(db): State<Db>, caller: Caller) -> Json<Vec<Crop>> {
    Json(db.read().await.list_crops(&caller))
}

pub async fn get_crop(
    State(db): State<Db>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Crop>> {
    db.read().await.get_crop(&caller, id).map(Json)
}

pub async fn create_crop(
    State(db): State<Db>,
    caller: Caller,
    Json(input): Json<NewCrop>,
) -> ApiResult<(StatusCode, Json<Crop>)> {
    let crop = db.write().await.create_crop(&caller, input)?;
    Ok((StatusCode::CREATED, Json(crop)))
}

pub async fn update_crop(
    State(db): State<Db>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<CropPatch>,
) -> ApiResult<Json<Crop>> {
    db.write().await.update_crop(&caller, id, patch).map(Json)
}

pub async fn delete_crop(
    State(db): State<Db>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    db.write().await.delete_crop(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn crop_stats(State(db): State<Db>, caller: Caller) -> Json<CropStats> {
    Json(db.read().await.crop_stats(&caller))
}
