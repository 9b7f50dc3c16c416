//! End-to-end flows against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the session store,
//! the resource clients and the page controllers over real HTTP with the
//! `ureq` transport. Validates that request building and response parsing
//! agree with the server's actual JSON.

use std::rc::Rc;
use std::sync::Arc;

use coop_core::pages::{FarmersPage, MyCropsPage, Phase, Route};
use coop_core::{
    AuthState, Config, CreateCrop, CreateFarmer, CropType, Error, FileTokenStore,
    MemoryTokenStore, Role, Services, TokenStore, UpdateCrop, UreqTransport,
};
use mock_server::{Db, Store};
use tokio::sync::RwLock;

/// Serve a fresh seeded store on a random port; returns the base URL and a
/// handle on the store.
fn start_server() -> (String, Db) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    let served = db.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, served).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), db)
}

fn config(base_url: &str) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        ..Config::default()
    }
}

fn services(base_url: &str, tokens: &MemoryTokenStore) -> Services {
    Services::new(
        &config(base_url),
        Rc::new(UreqTransport::new()),
        Box::new(tokens.clone()),
    )
}

#[test]
fn admin_crud_lifecycle() {
    let (base_url, _db) = start_server();
    let tokens = MemoryTokenStore::new();
    let services = services(&base_url, &tokens);

    // Step 1: log in as the seeded admin.
    let session = services.session.login("admin@agtech.com", "admin123").unwrap();
    assert_eq!(session.role, Role::Admin);
    assert!(tokens.current().is_some());

    // Step 2: list farmers, find the seeded one.
    let farmers = services.farmers.get_all().unwrap();
    assert_eq!(farmers.len(), 1);
    let john = &farmers[0];
    assert_eq!(john.full_name(), "John Farmer");

    // Step 3: create a crop for him and see it in the list.
    let created = services
        .crops
        .create(&CreateCrop {
            name: "Corn".to_string(),
            crop_type: CropType::Cereals,
            quantity: 12.5,
            unit: "kg".to_string(),
            farmer_id: john.id.clone(),
        })
        .unwrap();
    assert!(!created.id.is_empty());
    let crops = services.crops.get_all().unwrap();
    let corn = crops.iter().find(|c| c.id == created.id).unwrap();
    assert_eq!(corn.name, "Corn");
    assert_eq!(corn.crop_type, CropType::Cereals);
    assert_eq!(corn.quantity, 12.5);
    assert_eq!(corn.farmer_id, john.id);

    // Step 4: partial update keeps the untouched fields.
    let updated = services
        .crops
        .update(
            &created.id,
            &UpdateCrop {
                quantity: Some(150.0),
                ..UpdateCrop::default()
            },
        )
        .unwrap();
    assert_eq!(updated.quantity, 150.0);
    assert_eq!(updated.name, "Corn");

    // Step 5: detail view nests the farmer's crops.
    let detail = services.farmers.get_one(&john.id).unwrap();
    assert_eq!(detail.crops.len(), 3);

    // Step 6: deleting the farmer removes their crops too.
    let before = services.crops.get_stats().unwrap();
    assert_eq!(before.total_crops, 3);
    services.farmers.delete(&john.id).unwrap();
    let after = services.crops.get_stats().unwrap();
    assert_eq!(after.total_crops, 0);
    assert!(services
        .crops
        .get_all()
        .unwrap()
        .iter()
        .all(|c| c.farmer_id != john.id));
    assert!(services.farmers.get_one(&john.id).unwrap_err().is_not_found());

    // Step 7: logout clears everything.
    services.session.logout();
    assert_eq!(services.session.state(), AuthState::Anonymous);
    assert!(tokens.current().is_none());
    assert!(matches!(
        services.farmers.get_all(),
        Err(Error::Api { status: 401, .. })
    ));
}

#[test]
fn wrong_password_is_auth_error() {
    let (base_url, _db) = start_server();
    let tokens = MemoryTokenStore::new();
    let services = services(&base_url, &tokens);

    let err = services.session.login("admin@agtech.com", "wrong").unwrap_err();
    assert!(matches!(err, Error::Auth(ref m) if m == "Invalid credentials"));
    assert!(!services.session.is_authenticated());
    assert!(tokens.current().is_none());
}

#[test]
fn register_with_required_fields_only() {
    let (base_url, _db) = start_server();
    let services = services(&base_url, &MemoryTokenStore::new());

    let session = services
        .session
        .register(&CreateFarmer::new("jane@agtech.com", "secret1", "Jane", "Doe"))
        .unwrap();
    assert_eq!(session.role, Role::Farmer);
    let profile_id = session.farmer_profile_id.clone().unwrap();

    let detail = services.farmers.get_one(&profile_id).unwrap();
    assert_eq!(detail.farmer.email, "jane@agtech.com");
    assert!(detail.farmer.phone.is_none());
    assert!(detail.crops.is_empty());

    services.session.logout();
    let err = services
        .session
        .register(&CreateFarmer::new("jane@agtech.com", "secret1", "Jane", "Doe"))
        .unwrap_err();
    assert!(matches!(err, Error::Registration { status: 409, .. }));
}

#[test]
fn session_restores_from_token_file() {
    let (base_url, _db) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");

    let first = Services::new(
        &config(&base_url),
        Rc::new(UreqTransport::new()),
        Box::new(FileTokenStore::new(&path)),
    );
    first.session.login("john@agtech.com", "farmer123").unwrap();
    assert!(FileTokenStore::new(&path).load().unwrap().is_some());

    let second = Services::new(
        &config(&base_url),
        Rc::new(UreqTransport::new()),
        Box::new(FileTokenStore::new(&path)),
    );
    assert!(second.session.is_loading());
    let state = second.session.restore().unwrap();
    match state {
        AuthState::Authenticated(session) => {
            assert_eq!(session.email, "john@agtech.com");
            assert_eq!(session.display_name.as_deref(), Some("John"));
        }
        other => panic!("expected a restored session, got {other:?}"),
    }
}

#[test]
fn server_side_expiry_logs_out() {
    let (base_url, db) = start_server();
    let tokens = MemoryTokenStore::new();
    let services = services(&base_url, &tokens);
    let session = services.session.login("admin@agtech.com", "admin123").unwrap();

    db.blocking_write().expire_token(&session.bearer_token);

    let mut page = FarmersPage::new(&services);
    assert_eq!(page.open(), &Phase::Redirect(Route::Login));
    assert!(!services.session.is_authenticated());
    assert!(tokens.current().is_none());
}

#[test]
fn farmer_manages_own_crops_through_page() {
    let (base_url, _db) = start_server();
    let services = services(&base_url, &MemoryTokenStore::new());
    services.session.login("john@agtech.com", "farmer123").unwrap();

    let mut page = MyCropsPage::new(&services);
    assert_eq!(page.open(), &Phase::Ready);
    assert_eq!(page.crops().len(), 2);

    page.start_create().unwrap();
    let form = &mut page.editor_mut().unwrap().form;
    form.name = "Beans".to_string();
    form.crop_type = Some(CropType::Legumes);
    form.quantity = "25".to_string();
    page.submit().unwrap();
    assert_eq!(page.crops().len(), 3);

    let beans = page.crops().iter().find(|c| c.name == "Beans").unwrap().id.clone();
    assert!(page.request_delete(&beans));
    page.confirm_delete().unwrap();
    assert_eq!(page.crops().len(), 2);
    assert_eq!(page.notice().unwrap().message, "Crop deleted successfully");

    let mut admin_page = FarmersPage::new(&services);
    assert_eq!(admin_page.open(), &Phase::Redirect(Route::Dashboard));
}
