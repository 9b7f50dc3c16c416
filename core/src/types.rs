//! Wire DTOs for the cooperative API.
//!
//! # Design
//! Response types mirror the server's camelCase JSON. Request payloads carry
//! optional profile fields as `Option`, and the serializer drops a field that
//! is `None`, blank, or (for farm size) not positive. That omission is part
//! of the contract: the server treats a present key as "set this value", so
//! an empty string would overwrite data on a PATCH.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Farmer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Farmer => "FARMER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CropType {
    Cereals,
    Vegetables,
    Fruits,
    Legumes,
    CashCrops,
    Other,
}

impl CropType {
    pub const ALL: [CropType; 6] = [
        CropType::Cereals,
        CropType::Vegetables,
        CropType::Fruits,
        CropType::Legumes,
        CropType::CashCrops,
        CropType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropType::Cereals => "CEREALS",
            CropType::Vegetables => "VEGETABLES",
            CropType::Fruits => "FRUITS",
            CropType::Legumes => "LEGUMES",
            CropType::CashCrops => "CASH_CROPS",
            CropType::Other => "OTHER",
        }
    }

    /// Human-readable label, e.g. "Cash Crops".
    pub fn label(&self) -> &'static str {
        match self {
            CropType::Cereals => "Cereals",
            CropType::Vegetables => "Vegetables",
            CropType::Fruits => "Fruits",
            CropType::Legumes => "Legumes",
            CropType::CashCrops => "Cash Crops",
            CropType::Other => "Other",
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CropType {
    type Err = String;

    /// Accepts the wire name or the label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CropType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted) || t.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown crop type: {wanted}"))
    }
}

/// Relation counts some servers nest as `_count: {crops}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCounts {
    #[serde(default)]
    pub crops: u32,
}

/// A flat `cropCount` wins over `_count.crops`; neither means none.
fn crop_total(flat: Option<u32>, nested: Option<&RelationCounts>) -> u32 {
    flat.or(nested.map(|c| c.crops)).unwrap_or(0)
}

/// `{id, firstName, lastName}` as nested in crops, stats and user profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

impl FarmerSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Farmer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// ISO date or date-time as sent by the server.
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub farm_size: Option<f64>,
    #[serde(default)]
    pub farm_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_count: Option<u32>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<RelationCounts>,
    pub created_at: DateTime<Utc>,
}

impl Farmer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn crop_total(&self) -> u32 {
        crop_total(self.crop_count, self.counts.as_ref())
    }

    /// Date of birth as `YYYY-MM-DD`, dropping any time component.
    pub fn birth_date(&self) -> Option<&str> {
        self.date_of_birth
            .as_deref()
            .map(|d| d.split('T').next().unwrap_or(d))
    }
}

/// `GET /farmers/{id}`: the farmer plus their crops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerDetail {
    #[serde(flatten)]
    pub farmer: Farmer,
    #[serde(default)]
    pub crops: Vec<Crop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub quantity: f64,
    pub unit: String,
    pub farmer_id: String,
    #[serde(default)]
    pub farmer: Option<FarmerSummary>,
    pub created_at: DateTime<Utc>,
}

/// `POST /farmers` (admin) and the body of `POST /auth/register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFarmer {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_unset_size")]
    pub farm_size: Option<f64>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub farm_location: Option<String>,
}

/// Registration uses the same shape as an admin-created farmer.
pub type RegisterRequest = CreateFarmer;

impl CreateFarmer {
    /// A payload with only the required fields set.
    pub fn new(email: &str, password: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ..Self::default()
        }
    }
}

/// `PATCH /farmers/{id}`: only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFarmer {
    #[serde(default, skip_serializing_if = "is_blank")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub national_id: Option<String>,
    #[serde(default, skip_serializing_if = "is_unset_size")]
    pub farm_size: Option<f64>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub farm_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCrop {
    pub name: String,
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub quantity: f64,
    pub unit: String,
    pub farmer_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCrop {
    #[serde(default, skip_serializing_if = "is_blank")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<CropType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "is_blank")]
    pub farmer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerCropCount {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_count: Option<u32>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<RelationCounts>,
}

impl FarmerCropCount {
    pub fn crop_total(&self) -> u32 {
        crop_total(self.crop_count, self.counts.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStats {
    pub total_farmers: u32,
    pub total_crops: u32,
    #[serde(default)]
    pub crops_per_farmer: Vec<FarmerCropCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropTypeCount {
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropStats {
    pub total_crops: u32,
    #[serde(default)]
    pub crops_by_type: Vec<CropTypeCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

/// The server's view of the logged-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub farmer: Option<FarmerSummary>,
}

/// Body of a successful login or registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
    pub user: UserProfile,
    /// Token lifetime in seconds, when the server states one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn is_unset_size(value: &Option<f64>) -> bool {
    value.map_or(true, |n| !(n > 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_with_required_fields_only_omits_optional_keys() {
        let payload = CreateFarmer::new("jane@agtech.com", "secret1", "Jane", "Doe");
        let json = serde_json::to_value(&payload).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["phone", "address", "dateOfBirth", "nationalId", "farmSize", "farmLocation"] {
            assert!(json.get(key).is_none(), "{key} should be omitted");
        }
    }

    #[test]
    fn blank_and_zero_optional_fields_are_omitted() {
        let payload = CreateFarmer {
            phone: Some("   ".into()),
            address: Some(String::new()),
            farm_size: Some(0.0),
            farm_location: Some("North Valley".into()),
            ..CreateFarmer::new("a@b.co", "secret1", "A", "B")
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("phone").is_none());
        assert!(json.get("address").is_none());
        assert!(json.get("farmSize").is_none());
        assert_eq!(json["farmLocation"], "North Valley");
    }

    #[test]
    fn update_farmer_sends_only_present_fields() {
        let payload = UpdateFarmer {
            phone: Some("+233200000000".into()),
            farm_size: Some(4.5),
            ..UpdateFarmer::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"phone": "+233200000000", "farmSize": 4.5}));
    }

    #[test]
    fn crop_parses_server_json() {
        let crop: Crop = serde_json::from_str(
            r#"{"id":"c1","name":"Corn","type":"CASH_CROPS","quantity":12.5,"unit":"kg",
                "farmerId":"f1","farmer":{"id":"f1","firstName":"John","lastName":"Farmer"},
                "createdAt":"2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(crop.crop_type, CropType::CashCrops);
        assert_eq!(crop.farmer.unwrap().full_name(), "John Farmer");
    }

    #[test]
    fn create_crop_uses_type_key() {
        let payload = CreateCrop {
            name: "Corn".into(),
            crop_type: CropType::Cereals,
            quantity: 12.5,
            unit: "kg".into(),
            farmer_id: "f1".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name":"Corn","type":"CEREALS","quantity":12.5,"unit":"kg","farmerId":"f1"})
        );
    }

    #[test]
    fn farmer_detail_flattens_farmer_fields() {
        let detail: FarmerDetail = serde_json::from_str(
            r#"{"id":"f1","firstName":"John","lastName":"Farmer","email":"john@agtech.com",
                "dateOfBirth":"1985-04-12T00:00:00.000Z","cropCount":0,
                "createdAt":"2024-03-01T10:00:00Z","crops":[]}"#,
        )
        .unwrap();
        assert_eq!(detail.farmer.birth_date(), Some("1985-04-12"));
        assert!(detail.crops.is_empty());
    }

    #[test]
    fn auth_response_accepts_access_token_alias() {
        let auth: AuthResponse = serde_json::from_str(
            r#"{"access_token":"t","user":{"id":"u1","email":"admin@agtech.com","role":"ADMIN"}}"#,
        )
        .unwrap();
        assert_eq!(auth.token, "t");
        assert_eq!(auth.user.role, Role::Admin);
        assert!(auth.expires_in.is_none());
    }

    #[test]
    fn crop_type_parses_labels_and_wire_names() {
        assert_eq!("cash crops".parse::<CropType>().unwrap(), CropType::CashCrops);
        assert_eq!("LEGUMES".parse::<CropType>().unwrap(), CropType::Legumes);
        assert!("tubers".parse::<CropType>().is_err());
    }

    #[test]
    fn farmer_stats_accept_flat_and_nested_counts() {
        let nested: FarmerStats = serde_json::from_str(
            r#"{"totalFarmers":1,"totalCrops":2,"cropsPerFarmer":[
                {"id":"f1","firstName":"John","lastName":"Farmer","_count":{"crops":2}}]}"#,
        )
        .unwrap();
        assert_eq!(nested.crops_per_farmer[0].crop_total(), 2);

        let flat: FarmerStats = serde_json::from_str(
            r#"{"totalFarmers":1,"totalCrops":2,"cropsPerFarmer":[
                {"id":"f1","firstName":"John","lastName":"Farmer","cropCount":2}]}"#,
        )
        .unwrap();
        assert_eq!(flat.crops_per_farmer[0].crop_total(), 2);
    }

    #[test]
    fn farmer_crop_total_reads_nested_count() {
        let farmer: Farmer = serde_json::from_str(
            r#"{"id":"f1","firstName":"John","lastName":"Farmer","email":"john@agtech.com",
                "_count":{"crops":2},"createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(farmer.crop_total(), 2);

        let bare: Farmer = serde_json::from_str(
            r#"{"id":"f1","firstName":"John","lastName":"Farmer","email":"john@agtech.com",
                "createdAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(bare.crop_total(), 0);
    }
}
