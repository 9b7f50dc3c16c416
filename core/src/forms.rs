//! Client-side form validation.
//!
//! Forms hold raw input the way a user typed it (numbers as text). Each
//! `validate*` method either returns the request payload or every field
//! error found, so a page can show them all at once.

use std::fmt;

use chrono::NaiveDate;

use crate::types::{
    ChangePassword, CreateCrop, CreateFarmer, Crop, CropType, Farmer, LoginRequest, UpdateCrop,
    UpdateFarmer,
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_UNIT: &str = "kg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// First message recorded for `field`.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

fn require(errors: &mut ValidationErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.add(field, message);
    }
}

/// Loose shape check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
        }
        None => false,
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email) {
        errors.add("email", "Valid email is required");
    }
}

fn check_password(errors: &mut ValidationErrors, field: &'static str, password: &str, label: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("{label} must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}

/// Empty means unset; otherwise a non-negative number.
fn parse_farm_size(errors: &mut ValidationErrors, raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(size) if size.is_finite() && size >= 0.0 => Some(size),
        Ok(_) => {
            errors.add("farmSize", "Farm size must be positive");
            None
        }
        Err(_) => {
            errors.add("farmSize", "Farm size must be a number");
            None
        }
    }
}

fn check_birth_date(errors: &mut ValidationErrors, raw: &str) {
    let raw = raw.trim();
    if !raw.is_empty() && NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_err() {
        errors.add("dateOfBirth", "Date of birth must be YYYY-MM-DD");
    }
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "email", &self.email, "Email is required");
        require(&mut errors, "password", &self.password, "Password is required");
        errors.finish(|| LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// Farmer profile fields. Used for registration, admin create/edit and the
/// farmer's own profile; `email` and `password` only matter when creating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FarmerForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub address: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub national_id: String,
    pub farm_size: String,
    pub farm_location: String,
}

impl FarmerForm {
    /// Prefill for editing. Missing values become empty inputs and a farm size
    /// of zero shows as empty.
    pub fn from_farmer(farmer: &Farmer) -> Self {
        Self {
            first_name: farmer.first_name.clone(),
            last_name: farmer.last_name.clone(),
            email: farmer.email.clone(),
            password: String::new(),
            phone: farmer.phone.clone().unwrap_or_default(),
            address: farmer.address.clone().unwrap_or_default(),
            date_of_birth: farmer.birth_date().unwrap_or_default().to_string(),
            national_id: farmer.national_id.clone().unwrap_or_default(),
            farm_size: farmer
                .farm_size
                .filter(|size| *size > 0.0)
                .map(|size| size.to_string())
                .unwrap_or_default(),
            farm_location: farmer.farm_location.clone().unwrap_or_default(),
        }
    }

    fn check_profile(&self, errors: &mut ValidationErrors) -> Option<f64> {
        require(errors, "firstName", &self.first_name, "First name is required");
        require(errors, "lastName", &self.last_name, "Last name is required");
        check_birth_date(errors, &self.date_of_birth);
        parse_farm_size(errors, &self.farm_size)
    }

    /// Payload for `POST /farmers` and `POST /auth/register`.
    pub fn validate_create(&self) -> Result<CreateFarmer, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let farm_size = self.check_profile(&mut errors);
        check_email(&mut errors, &self.email);
        check_password(&mut errors, "password", &self.password, "Password");
        errors.finish(|| CreateFarmer {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: optional(&self.phone),
            address: optional(&self.address),
            date_of_birth: optional(&self.date_of_birth),
            national_id: optional(&self.national_id),
            farm_size,
            farm_location: optional(&self.farm_location),
        })
    }

    /// Payload for `PATCH /farmers/{id}`; email and password are ignored.
    pub fn validate_update(&self) -> Result<UpdateFarmer, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let farm_size = self.check_profile(&mut errors);
        errors.finish(|| UpdateFarmer {
            first_name: optional(&self.first_name),
            last_name: optional(&self.last_name),
            phone: optional(&self.phone),
            address: optional(&self.address),
            date_of_birth: optional(&self.date_of_birth),
            national_id: optional(&self.national_id),
            farm_size,
            farm_location: optional(&self.farm_location),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropForm {
    pub name: String,
    pub crop_type: Option<CropType>,
    pub quantity: String,
    pub unit: String,
    pub farmer_id: String,
}

impl Default for CropForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            crop_type: None,
            quantity: String::new(),
            unit: DEFAULT_UNIT.to_string(),
            farmer_id: String::new(),
        }
    }
}

impl CropForm {
    pub fn from_crop(crop: &Crop) -> Self {
        Self {
            name: crop.name.clone(),
            crop_type: Some(crop.crop_type),
            quantity: crop.quantity.to_string(),
            unit: crop.unit.clone(),
            farmer_id: crop.farmer_id.clone(),
        }
    }

    fn check(&self, errors: &mut ValidationErrors) -> Option<f64> {
        require(errors, "name", &self.name, "Name is required");
        if self.crop_type.is_none() {
            errors.add("type", "Crop type is required");
        }
        require(errors, "unit", &self.unit, "Unit is required");
        require(errors, "farmerId", &self.farmer_id, "Farmer is required");

        let raw = self.quantity.trim();
        if raw.is_empty() {
            errors.add("quantity", "Quantity is required");
            return None;
        }
        match raw.parse::<f64>() {
            Ok(q) if q.is_finite() && q > 0.0 => Some(q),
            Ok(_) => {
                errors.add("quantity", "Quantity must be positive");
                None
            }
            Err(_) => {
                errors.add("quantity", "Quantity must be a number");
                None
            }
        }
    }

    pub fn validate_create(&self) -> Result<CreateCrop, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let quantity = self.check(&mut errors);
        match (quantity, self.crop_type) {
            (Some(quantity), Some(crop_type)) if errors.is_empty() => Ok(CreateCrop {
                name: self.name.trim().to_string(),
                crop_type,
                quantity,
                unit: self.unit.trim().to_string(),
                farmer_id: self.farmer_id.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }

    /// Same checks as creation; every field is sent.
    pub fn validate_update(&self) -> Result<UpdateCrop, ValidationErrors> {
        let created = self.validate_create()?;
        Ok(UpdateCrop {
            name: Some(created.name),
            crop_type: Some(created.crop_type),
            quantity: Some(created.quantity),
            unit: Some(created.unit),
            farmer_id: Some(created.farmer_id),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordForm {
    pub fn validate(&self) -> Result<ChangePassword, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(
            &mut errors,
            "currentPassword",
            &self.current_password,
            "Current password is required",
        );
        if self.new_password != self.confirm_password {
            errors.add("confirmPassword", "New passwords do not match");
        }
        check_password(&mut errors, "newPassword", &self.new_password, "New password");
        errors.finish(|| ChangePassword {
            current_password: self.current_password.clone(),
            new_password: self.new_password.clone(),
        })
    }
}
