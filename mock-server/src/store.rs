//! In-memory accounts, farmers and crops, with the access rules applied.
//!
//! Every method takes the authenticated [`Caller`] where access matters:
//! admins see everything, a farmer sees and edits only their own profile and
//! crops. Handlers stay thin wrappers around these methods.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuthResponse, Credentials, Crop, CropPatch, CropStats, CropType, CropTypeCount, Farmer,
    FarmerCropCount, FarmerDetail, FarmerPatch, FarmerStats, FarmerSummary, NewCrop, NewFarmer,
    PasswordChange, Role, UserView,
};

pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug)]
struct User {
    id: Uuid,
    email: String,
    password: String,
    role: Role,
    farmer_id: Option<Uuid>,
}

#[derive(Clone, Debug)]
struct Grant {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct FarmerRecord {
    id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    address: Option<String>,
    date_of_birth: Option<String>,
    national_id: Option<String>,
    farm_size: Option<f64>,
    farm_location: Option<String>,
    created_at: DateTime<Utc>,
}

impl FarmerRecord {
    fn summary(&self) -> FarmerSummary {
        FarmerSummary {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct CropRecord {
    id: Uuid,
    name: String,
    crop_type: CropType,
    quantity: f64,
    unit: String,
    farmer_id: Uuid,
    created_at: DateTime<Utc>,
}

/// Who is making the request, resolved from the bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub farmer_id: Option<Uuid>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }

    fn require_farmer_access(&self, farmer_id: Uuid) -> ApiResult<()> {
        if self.is_admin() || self.farmer_id == Some(farmer_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

#[derive(Debug, Default)]
pub struct Store {
    users: Vec<User>,
    grants: HashMap<String, Grant>,
    farmers: Vec<FarmerRecord>,
    crops: Vec<CropRecord>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

fn check_crop(name: &str, quantity: f64, unit: &str) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("Crop name is required"));
    }
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(ApiError::bad_request("Quantity must be positive"));
    }
    if unit.trim().is_empty() {
        return Err(ApiError::bad_request("Unit is required"));
    }
    Ok(())
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// One admin and one farmer (with two crops) to log in with.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        store.users.push(User {
            id: Uuid::new_v4(),
            email: "admin@agtech.com".to_string(),
            password: "admin123".to_string(),
            role: Role::Admin,
            farmer_id: None,
        });
        let john = store
            .insert_farmer(NewFarmer {
                email: "john@agtech.com".to_string(),
                password: "farmer123".to_string(),
                first_name: "John".to_string(),
                last_name: "Farmer".to_string(),
                phone: Some("+1 555 0100".to_string()),
                address: None,
                date_of_birth: None,
                national_id: None,
                farm_size: Some(12.5),
                farm_location: Some("North Valley".to_string()),
            })
            .map(|farmer| farmer.id);
        if let Ok(farmer_id) = john {
            for (name, crop_type, quantity) in [
                ("Maize", CropType::Cereals, 500.0),
                ("Tomatoes", CropType::Vegetables, 120.0),
            ] {
                store.crops.push(CropRecord {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    crop_type,
                    quantity,
                    unit: "kg".to_string(),
                    farmer_id,
                    created_at: Utc::now(),
                });
            }
        }
        store
    }

    // --- auth ---

    pub fn login(&mut self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        let user = self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(credentials.email.trim()))
            .filter(|u| u.password == credentials.password)
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
        Ok(self.issue(&user))
    }

    pub fn register(&mut self, input: NewFarmer) -> ApiResult<AuthResponse> {
        let farmer = self.insert_farmer(input)?;
        let user = self
            .users
            .iter()
            .find(|u| u.farmer_id == Some(farmer.id))
            .cloned()
            .ok_or_else(|| ApiError::not_found("User"))?;
        Ok(self.issue(&user))
    }

    fn issue(&mut self, user: &User) -> AuthResponse {
        let token = Uuid::new_v4().simple().to_string();
        self.grants.insert(
            token.clone(),
            Grant {
                user_id: user.id,
                expires_at: Utc::now() + Duration::seconds(TOKEN_TTL_SECS),
            },
        );
        AuthResponse {
            token,
            user: self.user_view(user),
            expires_in: TOKEN_TTL_SECS,
        }
    }

    fn user_view(&self, user: &User) -> UserView {
        UserView {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            farmer: user
                .farmer_id
                .and_then(|id| self.farmer_record(id))
                .map(FarmerRecord::summary),
        }
    }

    /// Resolve a bearer token. Unknown or expired tokens are 401.
    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> ApiResult<Caller> {
        let grant = self
            .grants
            .get(token)
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;
        if now >= grant.expires_at {
            return Err(ApiError::unauthorized("Token expired"));
        }
        let user = self
            .users
            .iter()
            .find(|u| u.id == grant.user_id)
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;
        Ok(Caller {
            user_id: user.id,
            role: user.role,
            farmer_id: user.farmer_id,
        })
    }

    /// Push a token past its expiry.
    pub fn expire_token(&mut self, token: &str) {
        if let Some(grant) = self.grants.get_mut(token) {
            grant.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub fn profile(&self, caller: &Caller) -> ApiResult<UserView> {
        self.users
            .iter()
            .find(|u| u.id == caller.user_id)
            .map(|u| self.user_view(u))
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))
    }

    pub fn change_password(&mut self, caller: &Caller, change: &PasswordChange) -> ApiResult<()> {
        if change.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == caller.user_id)
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;
        if user.password != change.current_password {
            return Err(ApiError::bad_request("Current password is incorrect"));
        }
        user.password = change.new_password.clone();
        Ok(())
    }

    // --- farmers ---

    fn farmer_record(&self, id: Uuid) -> Option<&FarmerRecord> {
        self.farmers.iter().find(|f| f.id == id)
    }

    fn crop_count(&self, farmer_id: Uuid) -> u32 {
        self.crops.iter().filter(|c| c.farmer_id == farmer_id).count() as u32
    }

    fn farmer_view(&self, record: &FarmerRecord) -> Farmer {
        let email = self
            .users
            .iter()
            .find(|u| u.id == record.user_id)
            .map(|u| u.email.clone())
            .unwrap_or_default();
        Farmer {
            id: record.id,
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email,
            phone: record.phone.clone(),
            address: record.address.clone(),
            date_of_birth: record.date_of_birth.clone(),
            national_id: record.national_id.clone(),
            farm_size: record.farm_size,
            farm_location: record.farm_location.clone(),
            crop_count: self.crop_count(record.id),
            created_at: record.created_at,
        }
    }

    fn insert_farmer(&mut self, input: NewFarmer) -> ApiResult<Farmer> {
        let email = input.email.trim().to_string();
        if !looks_like_email(&email) {
            return Err(ApiError::bad_request("Valid email is required"));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
            return Err(ApiError::bad_request("First and last name are required"));
        }
        if input.farm_size.is_some_and(|size| size < 0.0) {
            return Err(ApiError::bad_request("Farm size must be positive"));
        }
        if self.users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(ApiError::conflict("Email already registered"));
        }

        let user_id = Uuid::new_v4();
        let farmer_id = Uuid::new_v4();
        self.users.push(User {
            id: user_id,
            email,
            password: input.password,
            role: Role::Farmer,
            farmer_id: Some(farmer_id),
        });
        let record = FarmerRecord {
            id: farmer_id,
            user_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            phone: blank_to_none(input.phone),
            address: blank_to_none(input.address),
            date_of_birth: blank_to_none(input.date_of_birth),
            national_id: blank_to_none(input.national_id),
            farm_size: input.farm_size.filter(|size| *size > 0.0),
            farm_location: blank_to_none(input.farm_location),
            created_at: Utc::now(),
        };
        let view = self.farmer_view(&record);
        self.farmers.push(record);
        Ok(view)
    }

    pub fn list_farmers(&self, caller: &Caller) -> ApiResult<Vec<Farmer>> {
        caller.require_admin()?;
        Ok(self.farmers.iter().map(|f| self.farmer_view(f)).collect())
    }

    pub fn farmer_detail(&self, caller: &Caller, id: Uuid) -> ApiResult<FarmerDetail> {
        caller.require_farmer_access(id)?;
        let record = self
            .farmer_record(id)
            .ok_or_else(|| ApiError::not_found("Farmer"))?;
        Ok(FarmerDetail {
            farmer: self.farmer_view(record),
            crops: self
                .crops
                .iter()
                .filter(|c| c.farmer_id == id)
                .map(|c| self.crop_view(c))
                .collect(),
        })
    }

    pub fn create_farmer(&mut self, caller: &Caller, input: NewFarmer) -> ApiResult<Farmer> {
        caller.require_admin()?;
        self.insert_farmer(input)
    }

    pub fn update_farmer(&mut self, caller: &Caller, id: Uuid, patch: FarmerPatch) -> ApiResult<Farmer> {
        caller.require_farmer_access(id)?;
        for name in [&patch.first_name, &patch.last_name].into_iter().flatten() {
            if name.trim().is_empty() {
                return Err(ApiError::bad_request("First and last name are required"));
            }
        }
        if patch.farm_size.is_some_and(|size| size < 0.0) {
            return Err(ApiError::bad_request("Farm size must be positive"));
        }
        let record = self
            .farmers
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| ApiError::not_found("Farmer"))?;
        if let Some(first_name) = patch.first_name {
            record.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = patch.last_name {
            record.last_name = last_name.trim().to_string();
        }
        if patch.phone.is_some() {
            record.phone = blank_to_none(patch.phone);
        }
        if patch.address.is_some() {
            record.address = blank_to_none(patch.address);
        }
        if patch.date_of_birth.is_some() {
            record.date_of_birth = blank_to_none(patch.date_of_birth);
        }
        if patch.national_id.is_some() {
            record.national_id = blank_to_none(patch.national_id);
        }
        if let Some(size) = patch.farm_size {
            record.farm_size = Some(size).filter(|s| *s > 0.0);
        }
        if patch.farm_location.is_some() {
            record.farm_location = blank_to_none(patch.farm_location);
        }
        let record = record.clone();
        Ok(self.farmer_view(&record))
    }

    /// Removes the farmer, their account, their tokens and their crops.
    pub fn delete_farmer(&mut self, caller: &Caller, id: Uuid) -> ApiResult<()> {
        caller.require_admin()?;
        let index = self
            .farmers
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| ApiError::not_found("Farmer"))?;
        let record = self.farmers.remove(index);
        self.crops.retain(|c| c.farmer_id != id);
        self.users.retain(|u| u.id != record.user_id);
        self.grants.retain(|_, g| g.user_id != record.user_id);
        Ok(())
    }

    pub fn farmer_stats(&self, caller: &Caller) -> ApiResult<FarmerStats> {
        caller.require_admin()?;
        Ok(FarmerStats {
            total_farmers: self.farmers.len() as u32,
            total_crops: self.crops.len() as u32,
            crops_per_farmer: self
                .farmers
                .iter()
                .map(|f| FarmerCropCount {
                    id: f.id,
                    first_name: f.first_name.clone(),
                    last_name: f.last_name.clone(),
                    crop_count: self.crop_count(f.id),
                })
                .collect(),
        })
    }

    // --- crops ---

    fn crop_view(&self, record: &CropRecord) -> Crop {
        Crop {
            id: record.id,
            name: record.name.clone(),
            crop_type: record.crop_type,
            quantity: record.quantity,
            unit: record.unit.clone(),
            farmer_id: record.farmer_id,
            farmer: self.farmer_record(record.farmer_id).map(FarmerRecord::summary),
            created_at: record.created_at,
        }
    }

    fn visible_crops<'a>(&'a self, caller: &'a Caller) -> impl Iterator<Item = &'a CropRecord> + 'a {
        self.crops
            .iter()
            .filter(move |c| caller.is_admin() || caller.farmer_id == Some(c.farmer_id))
    }

    fn owned_crop(&self, caller: &Caller, id: Uuid) -> ApiResult<usize> {
        let index = self
            .crops
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ApiError::not_found("Crop"))?;
        caller.require_farmer_access(self.crops[index].farmer_id)?;
        Ok(index)
    }

    pub fn list_crops(&self, caller: &Caller) -> Vec<Crop> {
        self.visible_crops(caller).map(|c| self.crop_view(c)).collect()
    }

    pub fn get_crop(&self, caller: &Caller, id: Uuid) -> ApiResult<Crop> {
        let index = self.owned_crop(caller, id)?;
        Ok(self.crop_view(&self.crops[index]))
    }

    pub fn create_crop(&mut self, caller: &Caller, input: NewCrop) -> ApiResult<Crop> {
        caller.require_farmer_access(input.farmer_id)?;
        check_crop(&input.name, input.quantity, &input.unit)?;
        if self.farmer_record(input.farmer_id).is_none() {
            return Err(ApiError::bad_request("Farmer does not exist"));
        }
        let record = CropRecord {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            crop_type: input.crop_type,
            quantity: input.quantity,
            unit: input.unit.trim().to_string(),
            farmer_id: input.farmer_id,
            created_at: Utc::now(),
        };
        let view = self.crop_view(&record);
        self.crops.push(record);
        Ok(view)
    }

    pub fn update_crop(&mut self, caller: &Caller, id: Uuid, patch: CropPatch) -> ApiResult<Crop> {
        let index = self.owned_crop(caller, id)?;
        if let Some(farmer_id) = patch.farmer_id {
            caller.require_farmer_access(farmer_id)?;
            if self.farmer_record(farmer_id).is_none() {
                return Err(ApiError::bad_request("Farmer does not exist"));
            }
        }
        let current = &self.crops[index];
        check_crop(
            patch.name.as_deref().unwrap_or(&current.name),
            patch.quantity.unwrap_or(current.quantity),
            patch.unit.as_deref().unwrap_or(&current.unit),
        )?;

        let record = &mut self.crops[index];
        if let Some(name) = patch.name {
            record.name = name.trim().to_string();
        }
        if let Some(crop_type) = patch.crop_type {
            record.crop_type = crop_type;
        }
        if let Some(quantity) = patch.quantity {
            record.quantity = quantity;
        }
        if let Some(unit) = patch.unit {
            record.unit = unit.trim().to_string();
        }
        if let Some(farmer_id) = patch.farmer_id {
            record.farmer_id = farmer_id;
        }
        let record = record.clone();
        Ok(self.crop_view(&record))
    }

    pub fn delete_crop(&mut self, caller: &Caller, id: Uuid) -> ApiResult<()> {
        let index = self.owned_crop(caller, id)?;
        self.crops.remove(index);
        Ok(())
    }

    /// Counts by type, in type order, for the crops the caller can see.
    pub fn crop_stats(&self, caller: &Caller) -> CropStats {
        let mut counts: HashMap<CropType, u32> = HashMap::new();
        let mut total = 0;
        for crop in self.visible_crops(caller) {
            *counts.entry(crop.crop_type).or_default() += 1;
            total += 1;
        }
        let mut crops_by_type: Vec<CropTypeCount> = counts
            .into_iter()
            .map(|(crop_type, count)| CropTypeCount { crop_type, count })
            .collect();
        crops_by_type.sort_by_key(|c| c.crop_type);
        CropStats {
            total_crops: total,
            crops_by_type,
        }
    }
}
