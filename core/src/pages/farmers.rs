//! Farmers management (admin only).

use crate::context::Services;
use crate::error::{Error, Result};
use crate::forms::FarmerForm;
use crate::pages::{Editor, Notice, PageCore, PendingDelete, Phase};
use crate::resources::FarmersClient;
use crate::types::{CreateFarmer, Farmer, Role, UpdateFarmer};

#[derive(Debug)]
pub struct FarmersPage {
    core: PageCore,
    client: FarmersClient,
    farmers: Vec<Farmer>,
    editor: Option<Editor<FarmerForm>>,
    pending_delete: Option<PendingDelete>,
}

impl FarmersPage {
    pub fn new(services: &Services) -> Self {
        Self {
            core: PageCore::new(services.session.clone()),
            client: services.farmers.clone(),
            farmers: Vec::new(),
            editor: None,
            pending_delete: None,
        }
    }

    /// Guard and first load.
    pub fn open(&mut self) -> &Phase {
        if self.core.enter(Some(Role::Admin)).is_some() {
            // A failed load leaves an error notice and an empty list.
            let _ = self.reload();
        }
        self.core.phase()
    }

    pub fn reload(&mut self) -> Result<()> {
        let ticket = self.core.ticket();
        let result = self.client.get_all();
        if let Some(farmers) = self.core.settle(&ticket, result, "Failed to load farmers")? {
            self.farmers = farmers;
            self.core.mark_ready();
        }
        Ok(())
    }

    pub fn phase(&self) -> &Phase {
        self.core.phase()
    }

    pub fn farmers(&self) -> &[Farmer] {
        &self.farmers
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.core.notice()
    }

    pub fn is_submitting(&self) -> bool {
        self.core.is_submitting()
    }

    pub fn editor(&self) -> Option<&Editor<FarmerForm>> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut Editor<FarmerForm>> {
        self.editor.as_mut()
    }

    pub fn start_create(&mut self) {
        self.editor = Some(Editor::create(FarmerForm::default()));
    }

    /// Open the edit dialog prefilled from the loaded farmer.
    pub fn start_edit(&mut self, id: &str) -> bool {
        match self.farmers.iter().find(|f| f.id == id) {
            Some(farmer) => {
                self.editor = Some(Editor::edit(id, FarmerForm::from_farmer(farmer)));
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editor = None;
    }

    /// Validate the open dialog, create or update, then re-fetch.
    pub fn submit(&mut self) -> Result<()> {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(());
        };
        let validated = match &editor.editing {
            Some(id) => editor
                .form
                .validate_update()
                .map(|update| Payload::Update(id.clone(), update)),
            None => editor.form.validate_create().map(Payload::Create),
        };
        let payload = match validated {
            Ok(payload) => {
                editor.errors = Default::default();
                payload
            }
            Err(errors) => {
                editor.errors = errors.clone();
                return Err(Error::Validation(errors));
            }
        };

        let ticket = self.core.ticket();
        let client = &self.client;
        let result = self.core.submitting(|| match &payload {
            Payload::Create(create) => client.create(create).map(drop),
            Payload::Update(id, update) => client.update(id, update).map(drop),
        });
        if self.core.settle(&ticket, result, "Failed to save farmer")?.is_some() {
            let message = match payload {
                Payload::Create(_) => "Farmer added successfully",
                Payload::Update(..) => "Farmer updated successfully",
            };
            self.editor = None;
            self.core.set_notice(Notice::success(message));
            self.reload()?;
        }
        Ok(())
    }

    /// First step of a delete: remember what to delete and ask.
    pub fn request_delete(&mut self, id: &str) -> bool {
        match self.farmers.iter().find(|f| f.id == id) {
            Some(farmer) => {
                self.pending_delete = Some(PendingDelete {
                    id: farmer.id.clone(),
                    label: farmer.full_name(),
                });
                true
            }
            None => false,
        }
    }

    pub fn pending_delete(&self) -> Option<&PendingDelete> {
        self.pending_delete.as_ref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Issue the confirmed delete (the server cascades the farmer's crops).
    pub fn confirm_delete(&mut self) -> Result<()> {
        let Some(pending) = self.pending_delete.take() else {
            return Ok(());
        };
        let ticket = self.core.ticket();
        let client = &self.client;
        let result = self.core.submitting(|| client.delete(&pending.id));
        if self.core.settle(&ticket, result, "Failed to delete farmer")?.is_some() {
            self.core.set_notice(Notice::success("Farmer deleted successfully"));
            self.reload()?;
        }
        Ok(())
    }
}

enum Payload {
    Create(CreateFarmer),
    Update(String, UpdateFarmer),
}
