//! Wires the session store and resource clients over one transport.

use std::rc::Rc;

use crate::client::{ApiClient, Credentials};
use crate::config::Config;
use crate::resources::{AccountClient, CropsClient, FarmersClient};
use crate::session::SessionStore;
use crate::token_store::{FileTokenStore, TokenStore};
use crate::transport::{Transport, UreqTransport};

/// Everything a page controller needs.
///
/// The session store talks to the server with an anonymous client; the
/// resource clients share the same transport but take their bearer token
/// from the store.
#[derive(Debug, Clone)]
pub struct Services {
    pub session: Rc<SessionStore>,
    pub farmers: FarmersClient,
    pub crops: CropsClient,
    pub account: AccountClient,
}

impl Services {
    pub fn new(config: &Config, transport: Rc<dyn Transport>, tokens: Box<dyn TokenStore>) -> Self {
        let anonymous = ApiClient::new(&config.api_base_url, transport);
        let session = SessionStore::new(anonymous.clone(), tokens, config.session_ttl);
        let credentials: Rc<dyn Credentials> = session.clone();
        let api = anonymous.with_credentials(credentials);
        Self {
            session,
            farmers: FarmersClient::new(api.clone()),
            crops: CropsClient::new(api.clone()),
            account: AccountClient::new(api),
        }
    }

    /// Production wiring: `ureq` transport, token file from the config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Rc::new(UreqTransport::new()),
            Box::new(FileTokenStore::new(&config.token_path)),
        )
    }
}
