//! Client core for the cooperative management API.
//!
//! # Overview
//! Farmers and their crops live on a REST server. This crate holds the
//! client side: who is logged in ([`SessionStore`]), how requests reach the
//! server ([`ApiClient`] over a [`Transport`]), typed access to `/farmers`
//! and `/crops` ([`ResourceClient`]), form validation, and one controller per
//! screen ([`pages`]).
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest` / `HttpResponse`).
//!   `ApiClient::build` and `parse_response` are pure; only a `Transport`
//!   touches the network, so tests swap in a [`ScriptedTransport`].
//! - Single-threaded: shared state is `Rc` + `RefCell`/`Cell`.
//! - The bearer token is pulled from the session store through the
//!   [`Credentials`] trait; a 401 response invalidates the session.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod forms;
pub mod http;
pub mod pages;
pub mod resources;
pub mod session;
pub mod token_store;
pub mod transport;
pub mod types;

pub use client::{parse_response, ApiClient, ApiRequest, Credentials};
pub use config::Config;
pub use context::Services;
pub use error::{Error, Result};
pub use forms::{CropForm, FarmerForm, LoginForm, PasswordForm, ValidationErrors};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use resources::{AccountClient, CropsClient, FarmersClient, Resource, ResourceClient};
pub use session::{AuthState, Session, SessionStore, SessionTicket};
pub use token_store::{FileTokenStore, MemoryTokenStore, PersistedToken, TokenStore};
pub use transport::{ScriptedTransport, Transport, UreqTransport};
pub use types::{
    CreateCrop, CreateFarmer, Crop, CropStats, CropType, Farmer, FarmerDetail, FarmerStats,
    RelationCounts, Role, UpdateCrop, UpdateFarmer, UserProfile,
};
