//! The logged-in farmer's own crops.
//!
//! The server scopes `GET /crops` to the caller for farmer accounts. New crops
//! are always attributed to the session's farmer profile, whatever the form
//! says.

use crate::context::Services;
use crate::error::{Error, Result};
use crate::forms::CropForm;
use crate::pages::{Editor, Notice, PageCore, PendingDelete, Phase};
use crate::resources::CropsClient;
use crate::types::{CreateCrop, Crop, Role, UpdateCrop};

#[derive(Debug)]
pub struct MyCropsPage {
    core: PageCore,
    client: CropsClient,
    farmer_id: Option<String>,
    crops: Vec<Crop>,
    editor: Option<Editor<CropForm>>,
    pending_delete: Option<PendingDelete>,
}

enum Payload {
    Create(CreateCrop),
    Update(String, UpdateCrop),
}

impl MyCropsPage {
    pub fn new(services: &Services) -> Self {
        Self {
            core: PageCore::new(services.session.clone()),
            client: services.crops.clone(),
            farmer_id: None,
            crops: Vec::new(),
            editor: None,
            pending_delete: None,
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
        let ticket = self.core.ticket();
        let result = self.client.get_all();
        if let Some(crops) = self.core.settle(&ticket, result, "Failed to load crops")? {
            self.crops = crops;
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

    /// Open an empty crop dialog owned by the current farmer.
    pub fn start_create(&mut self) -> Result<()> {
        let farmer_id = self.farmer_id.clone().ok_or(Error::NotAuthenticated)?;
        self.editor = Some(Editor::create(CropForm {
            farmer_id,
            ..CropForm::default()
        }));
        Ok(())
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
        let Some(farmer_id) = self.farmer_id.clone() else {
            return Err(Error::NotAuthenticated);
        };
        let Some(editor) = self.editor.as_mut() else {
            return Ok(());
        };
        editor.form.farmer_id = farmer_id;
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
        let client = &self.client;
        let result = self.core.submitting(|| client.delete(&pending.id));
        if self.core.settle(&ticket, result, "Failed to delete crop")?.is_some() {
            self.core.set_notice(Notice::success("Crop deleted successfully"));
            self.reload()?;
        }
        Ok(())
    }
}
