//! All crops across the cooperative (admin only).
//!
//! Loads crops and farmers together: the farmer list feeds the owner picker
//! in the crop dialog, and the page renders only once both have arrived.

use crate::context::Services;
use crate::error::{Error, Result};
use crate::forms::CropForm;
use crate::pages::{Editor, Notice, PageCore, PendingDelete, Phase};
use crate::resources::{CropsClient, FarmersClient};
use crate::types::{CreateCrop, Crop, Farmer, Role, UpdateCrop};

#[derive(Debug)]
pub struct CropsPage {
    core: PageCore,
    crops_client: CropsClient,
    farmers_client: FarmersClient,
    crops: Vec<Crop>,
    farmers: Vec<Farmer>,
    editor: Option<Editor<CropForm>>,
    pending_delete: Option<PendingDelete>,
}

enum Payload {
    Create(CreateCrop),
    Update(String, UpdateCrop),
}

impl CropsPage {
    pub fn new(services: &Services) -> Self {
        Self {
            core: PageCore::new(services.session.clone()),
            crops_client: services.crops.clone(),
            farmers_client: services.farmers.clone(),
            crops: Vec::new(),
            farmers: Vec::new(),
            editor: None,
            pending_delete: None,
        }
    }

    pub fn open(&mut self) -> &Phase {
        if self.core.enter(Some(Role::Admin)).is_some() {
            let _ = self.reload();
        }
        self.core.phase()
    }

    /// Fetch crops and farmers in one step; nothing is applied unless both
    /// succeed.
    pub fn reload(&mut self) -> Result<()> {
        let ticket = self.core.ticket();
        let result = self
            .crops_client
            .get_all()
            .and_then(|crops| Ok((crops, self.farmers_client.get_all()?)));
        if let Some((crops, farmers)) = self.core.settle(&ticket, result, "Failed to load data")? {
            self.crops = crops;
            self.farmers = farmers;
            self.core.mark_ready();
        }
        Ok(())
    }

    pub fn phase(&self) -> &Phase {
        self.core.phase()
    }

    pub fn crops(&self) -> &[Crop] {
        &self.crops
    }

    /// Owner choices for the crop dialog.
    pub fn farmers(&self) -> &[Farmer] {
        &self.farmers
    }

    /// Display name of a crop's owner, from the nested summary or the loaded
    /// farmer list.
    pub fn owner_name(&self, crop: &Crop) -> Option<String> {
        crop.farmer.as_ref().map(|f| f.full_name()).or_else(|| {
            self.farmers
                .iter()
                .find(|f| f.id == crop.farmer_id)
                .map(Farmer::full_name)
        })
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.core.notice()
    }

    pub fn is_submitting(&self) -> bool {
        self.core.is_submitting()
    }

    pub fn editor(&self) -> Option<&Editor<CropForm>> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut Editor<CropForm>> {
        self.editor.as_mut()
    }

    pub fn start_create(&mut self) {
        self.editor = Some(Editor::create(CropForm::default()));
    }

    pub fn start_edit(&mut self, id: &str) -> bool {
        match self.crops.iter().find(|c| c.id == id) {
            Some(crop) => {
                self.editor = Some(Editor::edit(id, CropForm::from_crop(crop)));
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editor = None;
    }

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
        let client = &self.crops_client;
        let result = self.core.submitting(|| match &payload {
            Payload::Create(create) => client.create(create).map(drop),
            Payload::Update(id, update) => client.update(id, update).map(drop),
        });
        if self.core.settle(&ticket, result, "Failed to save crop")?.is_some() {
            let message = match payload {
                Payload::Create(_) => "Crop added successfully",
                Payload::Update(..) => "Crop updated successfully",
            };
            self.editor = None;
            self.core.set_notice(Notice::success(message));
            self.reload()?;
        }
        Ok(())
    }

    pub fn request_delete(&mut self, id: &str) -> bool {
        match self.crops.iter().find(|c| c.id == id) {
            Some(crop) => {
                self.pending_delete = Some(PendingDelete {
                    id: crop.id.clone(),
                    label: crop.name.clone(),
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

    pub fn confirm_delete(&mut self) -> Result<()> {
        let Some(pending) = self.pending_delete.take() else {
            return Ok(());
        };
        let ticket = self.core.ticket();
        let client = &self.crops_client;
        let result = self.core.submitting(|| client.delete(&pending.id));
        if self.core.settle(&ticket, result, "Failed to delete crop")?.is_some() {
            self.core.set_notice(Notice::success("Crop deleted successfully"));
            self.reload()?;
        }
        Ok(())
    }
}
