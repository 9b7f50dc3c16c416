//! The farmer's own profile: details, crops summary, edit and password change.

use crate::context::Services;
use crate::error::{Error, Result};
use crate::forms::{FarmerForm, PasswordForm, ValidationErrors};
use crate::pages::{Notice, PageCore, Phase};
use crate::resources::{AccountClient, FarmersClient};
use crate::types::{FarmerDetail, Role};

#[derive(Debug)]
pub struct ProfilePage {
    core: PageCore,
    farmers: FarmersClient,
    account: AccountClient,
    farmer_id: Option<String>,
    detail: Option<FarmerDetail>,
    /// Open profile edit form, if any.
    editing: Option<FarmerForm>,
    pub password: PasswordForm,
    errors: ValidationErrors,
}

impl ProfilePage {
    pub fn new(services: &Services) -> Self {
        Self {
            core: PageCore::new(services.session.clone()),
            farmers: services.farmers.clone(),
            account: services.account.clone(),
            farmer_id: None,
            detail: None,
            editing: None,
            password: PasswordForm::default(),
            errors: ValidationErrors::new(),
        }
    }

    pub fn open(&mut self) -> &Phase {
        if let Some(session) = self.core.enter(Some(Role::Farmer)) {
            self.farmer_id = session.farmer_profile_id;
            if self.farmer_id.is_none() {
                self.core
                    .set_notice(Notice::error("No farmer profile is linked to this account"));
                self.core.mark_ready();
                return self.core.phase();
            }
            let _ = self.reload();
        }
        self.core.phase()
    }

    pub fn reload(&mut self) -> Result<()> {
        let id = self.farmer_id.clone().ok_or(Error::NotAuthenticated)?;
        let ticket = self.core.ticket();
        let result = self.farmers.get_one(&id);
        if let Some(detail) = self.core.settle(&ticket, result, "Failed to load profile")? {
            self.detail = Some(detail);
            self.core.mark_ready();
        }
        Ok(())
    }

    pub fn phase(&self) -> &Phase {
        self.core.phase()
    }

    pub fn detail(&self) -> Option<&FarmerDetail> {
        self.detail.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.core.notice()
    }

    pub fn is_submitting(&self) -> bool {
        self.core.is_submitting()
    }

    /// Errors from the last rejected profile or password form.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn profile_form(&self) -> Option<&FarmerForm> {
        self.editing.as_ref()
    }

    pub fn profile_form_mut(&mut self) -> Option<&mut FarmerForm> {
        self.editing.as_mut()
    }

    /// Prefill the edit form from the loaded profile.
    pub fn start_edit(&mut self) -> bool {
        match &self.detail {
            Some(detail) => {
                self.editing = Some(FarmerForm::from_farmer(&detail.farmer));
                self.errors = ValidationErrors::new();
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn submit_profile(&mut self) -> Result<()> {
        let Some(form) = &self.editing else {
            return Ok(());
        };
        let id = self.farmer_id.clone().ok_or(Error::NotAuthenticated)?;
        let update = form.validate_update().map_err(|errors| {
            self.errors = errors.clone();
            Error::Validation(errors)
        })?;
        self.errors = ValidationErrors::new();

        let ticket = self.core.ticket();
        let client = &self.farmers;
        let result = self.core.submitting(|| client.update(&id, &update));
        if self.core.settle(&ticket, result, "Failed to update profile")?.is_some() {
            self.editing = None;
            self.core.set_notice(Notice::success("Profile updated successfully"));
            self.reload()?;
        }
        Ok(())
    }

    /// Submit [`Self::password`]; the form is cleared on success.
    pub fn change_password(&mut self) -> Result<()> {
        let payload = self.password.validate().map_err(|errors| {
            self.errors = errors.clone();
            Error::Validation(errors)
        })?;
        self.errors = ValidationErrors::new();

        let ticket = self.core.ticket();
        let account = &self.account;
        let result = self.core.submitting(|| account.change_password(&payload));
        if self.core.settle(&ticket, result, "Failed to change password")?.is_some() {
            self.password = PasswordForm::default();
            self.core.set_notice(Notice::success("Password changed successfully"));
        }
        Ok(())
    }
}
