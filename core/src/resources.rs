//! Typed clients for `/farmers`, `/crops` and the account endpoints.
//!
//! # Design
//! Each operation is a direct pass-through to [`ApiClient::send`] with a fixed
//! path template: no caching, no de-duplication, no local merging.
//!
//! **Post-condition of `create`, `update` and `delete`:** any collection
//! fetched before the call is stale. Callers observe the new state only by
//! calling `get_all` (or `get_one`) again.

use std::marker::PhantomData;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;

use crate::client::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::types::{
    ChangePassword, CreateCrop, CreateFarmer, Crop, CropStats, Farmer, FarmerDetail, FarmerStats,
    UpdateCrop, UpdateFarmer,
};

/// A server-side collection and its payload types.
pub trait Resource {
    const PATH: &'static str;
    type Item: DeserializeOwned;
    /// What `GET {PATH}/{id}` returns.
    type Detail: DeserializeOwned;
    type Create: Serialize;
    type Update: Serialize;
    type Stats: DeserializeOwned;
}

#[derive(Debug, Clone, Copy)]
pub struct Farmers;

impl Resource for Farmers {
    const PATH: &'static str = "/farmers";
    type Item = Farmer;
    type Detail = FarmerDetail;
    type Create = CreateFarmer;
    type Update = UpdateFarmer;
    type Stats = FarmerStats;
}

#[derive(Debug, Clone, Copy)]
pub struct Crops;

impl Resource for Crops {
    const PATH: &'static str = "/crops";
    type Item = Crop;
    type Detail = Crop;
    type Create = CreateCrop;
    type Update = UpdateCrop;
    type Stats = CropStats;
}

/// `get_all`, `get_one`, `create`, `update`, `delete` and `get_stats` for `R`.
#[derive(Debug)]
pub struct ResourceClient<R> {
    api: ApiClient,
    _resource: PhantomData<R>,
}

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            _resource: PhantomData,
        }
    }
}

pub type FarmersClient = ResourceClient<Farmers>;
pub type CropsClient = ResourceClient<Crops>;

impl<R: Resource> ResourceClient<R> {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            _resource: PhantomData,
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{id}", R::PATH)
    }

    /// `GET {PATH}`
    pub fn get_all(&self) -> Result<Vec<R::Item>> {
        self.api.send(ApiRequest::get(R::PATH))
    }

    /// `GET {PATH}/{id}`
    pub fn get_one(&self, id: &str) -> Result<R::Detail> {
        self.api.send(ApiRequest::get(Self::item_path(id)))
    }

    /// `POST {PATH}`, returning the stored record with its server id.
    pub fn create(&self, payload: &R::Create) -> Result<R::Item> {
        self.api.send(ApiRequest::post(R::PATH).json(payload)?)
    }

    /// `PATCH {PATH}/{id}` with only the fields present in `payload`.
    pub fn update(&self, id: &str, payload: &R::Update) -> Result<R::Item> {
        self.api.send(ApiRequest::patch(Self::item_path(id)).json(payload)?)
    }

    /// `DELETE {PATH}/{id}`. Whatever body the server returns is ignored.
    pub fn delete(&self, id: &str) -> Result<()> {
        let _: IgnoredAny = self.api.send(ApiRequest::delete(Self::item_path(id)))?;
        Ok(())
    }

    /// `GET {PATH}/stats`
    pub fn get_stats(&self) -> Result<R::Stats> {
        self.api.send(ApiRequest::get(format!("{}/stats", R::PATH)))
    }
}

pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";

/// Endpoints about the logged-in account itself.
#[derive(Debug, Clone)]
pub struct AccountClient {
    api: ApiClient,
}

impl AccountClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// `POST /auth/change-password`, bearer authenticated.
    pub fn change_password(&self, payload: &ChangePassword) -> Result<()> {
        let _: IgnoredAny = self
            .api
            .send(ApiRequest::post(CHANGE_PASSWORD_PATH).json(payload)?)?;
        Ok(())
    }
}
