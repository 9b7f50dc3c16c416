//! JSON shapes served by the mock cooperative API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Farmer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CropType {
    Cereals,
    Vegetables,
    Fruits,
    Legumes,
    CashCrops,
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer: Option<FarmerSummary>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
    pub expires_in: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farmer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farm_location: Option<String>,
    #[serde(default)]
    pub crop_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FarmerDetail {
    #[serde(flatten)]
    pub farmer: Farmer,
    pub crops: Vec<Crop>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub quantity: f64,
    pub unit: String,
    pub farmer_id: Uuid,
    pub farmer: Option<FarmerSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register` and `POST /farmers`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFarmer {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub national_id: Option<String>,
    pub farm_size: Option<f64>,
    pub farm_location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub national_id: Option<String>,
    pub farm_size: Option<f64>,
    pub farm_location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrop {
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub quantity: f64,
    pub unit: String,
    pub farmer_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub crop_type: Option<CropType>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub farmer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerCropCount {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub crop_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStats {
    pub total_farmers: u32,
    pub total_crops: u32,
    pub crops_per_farmer: Vec<FarmerCropCount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CropTypeCount {
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropStats {
    pub total_crops: u32,
    pub crops_by_type: Vec<CropTypeCount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
