//! Page controller flows against a scripted server.
//!
//! # Design
//! Every test wires real `Services` over a `ScriptedTransport`, logs in with a
//! canned response, then drives one controller and inspects both its view
//! state and the requests that reached the transport.

use std::rc::Rc;

use chrono::{Duration, Utc};
use coop_core::forms::PasswordForm;
use coop_core::http::HttpMethod;
use coop_core::pages::dashboard::ChartKind;
use coop_core::pages::login::Tab;
use coop_core::pages::{
    CropsPage, DashboardPage, FarmersPage, LoginPage, MyCropsPage, NoticeKind, Phase, ProfilePage,
    Route,
};
use coop_core::{
    Config, CropType, Error, MemoryTokenStore, PersistedToken, ScriptedTransport, Services,
};

const ADMIN_LOGIN: &str =
    r#"{"token":"tok-admin","user":{"id":"u1","email":"admin@agtech.com","role":"ADMIN"}}"#;
const FARMER_LOGIN: &str = r#"{"token":"tok-john","user":{"id":"u2","email":"john@agtech.com","role":"FARMER","farmer":{"id":"f1","firstName":"John","lastName":"Farmer"}}}"#;

const JOHN: &str = r#"{"id":"f1","firstName":"John","lastName":"Farmer","email":"john@agtech.com","farmSize":12.5,"cropCount":1,"createdAt":"2024-01-01T00:00:00Z"}"#;
const CORN: &str = r#"{"id":"c1","name":"Corn","type":"CEREALS","quantity":100,"unit":"kg","farmerId":"f1","farmer":{"id":"f1","firstName":"John","lastName":"Farmer"},"createdAt":"2024-02-01T00:00:00Z"}"#;

struct Harness {
    transport: ScriptedTransport,
    tokens: MemoryTokenStore,
    services: Services,
}

fn harness_with(tokens: MemoryTokenStore) -> Harness {
    let transport = ScriptedTransport::new();
    let services = Services::new(
        &Config::default(),
        Rc::new(transport.clone()),
        Box::new(tokens.clone()),
    );
    Harness {
        transport,
        tokens,
        services,
    }
}

fn harness() -> Harness {
    harness_with(MemoryTokenStore::new())
}

fn logged_in(login: &str) -> Harness {
    let h = harness();
    h.transport.push_json(200, login);
    h.services.session.login("someone@agtech.com", "secret1").unwrap();
    h
}

fn list(item: &str) -> String {
    format!("[{item}]")
}

fn methods_after_login(h: &Harness) -> Vec<(HttpMethod, String)> {
    h.transport
        .requests()
        .into_iter()
        .skip(1)
        .map(|r| (r.method, r.url))
        .collect()
}

#[test]
fn anonymous_user_is_sent_to_login() {
    let h = harness();
    let mut page = FarmersPage::new(&h.services);
    assert_eq!(page.open(), &Phase::Redirect(Route::Login));
    assert!(h.transport.requests().is_empty());
}

#[test]
fn farmer_opening_admin_page_is_sent_to_dashboard() {
    let h = logged_in(FARMER_LOGIN);
    let mut page = CropsPage::new(&h.services);
    assert_eq!(page.open(), &Phase::Redirect(Route::Dashboard));

    let mut admin_only = FarmersPage::new(&h.services);
    assert_eq!(admin_only.open(), &Phase::Redirect(Route::Dashboard));
    assert_eq!(h.transport.requests().len(), 1);
}

#[test]
fn page_waits_while_session_is_restoring() {
    let h = harness_with(MemoryTokenStore::with_token(PersistedToken {
        token: "persisted".into(),
        expires_at: Utc::now() + Duration::hours(1),
    }));
    let mut page = DashboardPage::new(&h.services);
    assert_eq!(page.open(), &Phase::Loading);
    assert!(h.transport.requests().is_empty());
}

#[test]
fn farmers_page_loads_and_sends_bearer() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, &list(JOHN));
    let mut page = FarmersPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Ready);
    assert_eq!(page.farmers().len(), 1);
    assert_eq!(page.farmers()[0].full_name(), "John Farmer");
    let sent = h.transport.last_request().unwrap();
    assert_eq!(sent.url, "http://localhost:8080/farmers");
    assert_eq!(sent.header("Authorization"), Some("Bearer tok-admin"));
}

#[test]
fn load_failure_leaves_error_notice_and_ready_page() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(500, r#"{"message":"database down"}"#);
    let mut page = FarmersPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Ready);
    let notice = page.notice().unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, "Failed to load farmers: database down");
    assert!(page.farmers().is_empty());
}

#[test]
fn delete_requires_confirmation() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, &list(JOHN));
    let mut page = FarmersPage::new(&h.services);
    page.open();

    assert!(page.request_delete("f1"));
    assert_eq!(page.pending_delete().unwrap().label, "John Farmer");
    page.cancel_delete();
    page.confirm_delete().unwrap();
    assert_eq!(h.transport.requests().len(), 2, "cancelled delete must not reach the server");

    h.transport.push_json(204, "").push_json(200, "[]");
    assert!(page.request_delete("f1"));
    page.confirm_delete().unwrap();
    assert_eq!(
        methods_after_login(&h)[1..],
        [
            (HttpMethod::Delete, "http://localhost:8080/farmers/f1".to_string()),
            (HttpMethod::Get, "http://localhost:8080/farmers".to_string()),
        ]
    );
    assert!(page.farmers().is_empty());
    assert_eq!(page.notice().unwrap().message, "Farmer deleted successfully");
    assert!(!page.request_delete("missing"));
}

#[test]
fn invalid_form_never_reaches_the_server() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, "[]");
    let mut page = FarmersPage::new(&h.services);
    page.open();
    let before = h.transport.requests().len();

    page.start_create();
    let err = page.submit().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let editor = page.editor().unwrap();
    assert_eq!(editor.errors.for_field("firstName"), Some("First name is required"));
    assert_eq!(h.transport.requests().len(), before);
    assert!(!page.is_submitting());
}

#[test]
fn failed_save_resets_submitting_and_keeps_dialog() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, "[]");
    let mut page = FarmersPage::new(&h.services);
    page.open();

    page.start_create();
    let form = &mut page.editor_mut().unwrap().form;
    form.first_name = "Jane".into();
    form.last_name = "Doe".into();
    form.email = "jane@agtech.com".into();
    form.password = "secret1".into();
    h.transport.push_json(409, r#"{"message":"Email already exists"}"#);

    let err = page.submit().unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert!(!page.is_submitting());
    assert!(page.editor().is_some());
    assert_eq!(page.notice().unwrap().message, "Failed to save farmer: Email already exists");
}

#[test]
fn unauthorized_response_logs_out_and_drops_result() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(401, r#"{"message":"Token expired"}"#);
    let mut page = FarmersPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Redirect(Route::Login));
    assert!(page.notice().is_none());
    assert!(!h.services.session.is_authenticated());
    assert!(h.tokens.current().is_none());
}

#[test]
fn unauthorized_save_is_returned_as_failure() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, "[]");
    let mut page = FarmersPage::new(&h.services);
    page.open();

    page.start_create();
    let form = &mut page.editor_mut().unwrap().form;
    form.first_name = "Jane".into();
    form.last_name = "Doe".into();
    form.email = "jane@agtech.com".into();
    form.password = "secret1".into();
    h.transport.push_json(401, r#"{"message":"Token expired"}"#);

    let err = page.submit().unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(page.phase(), &Phase::Redirect(Route::Login));
    assert!(!page.is_submitting());
    assert!(page.notice().is_none());
    assert!(!h.services.session.is_authenticated());
}

#[test]
fn forbidden_response_is_reported_without_logout() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(403, r#"{"message":"Forbidden"}"#);
    let mut page = FarmersPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Ready);
    assert_eq!(page.notice().unwrap().kind, NoticeKind::Error);
    assert!(h.services.session.is_authenticated());
}

#[test]
fn crops_page_loads_crops_and_farmers_together() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, &list(CORN)).push_json(200, &list(JOHN));
    let mut page = CropsPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Ready);
    assert_eq!(page.crops().len(), 1);
    assert_eq!(page.farmers().len(), 1);
    assert_eq!(page.owner_name(&page.crops()[0]).as_deref(), Some("John Farmer"));
}

#[test]
fn crops_page_applies_nothing_when_one_fetch_fails() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, &list(CORN)).push_failure("connection reset");
    let mut page = CropsPage::new(&h.services);

    page.open();
    assert!(page.crops().is_empty());
    assert_eq!(page.notice().unwrap().message, "Failed to load data");
}

#[test]
fn crop_edit_sends_patch_then_refetches() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport.push_json(200, &list(CORN)).push_json(200, &list(JOHN));
    let mut page = CropsPage::new(&h.services);
    page.open();

    assert!(page.start_edit("c1"));
    page.editor_mut().unwrap().form.quantity = "150".into();
    h.transport
        .push_json(200, CORN)
        .push_json(200, &list(CORN))
        .push_json(200, &list(JOHN));
    page.submit().unwrap();

    let sent = &h.transport.requests()[3];
    assert_eq!(sent.method, HttpMethod::Patch);
    assert_eq!(sent.url, "http://localhost:8080/crops/c1");
    let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["quantity"], 150.0);
    assert_eq!(body["type"], "CEREALS");
    assert!(page.editor().is_none());
    assert_eq!(page.notice().unwrap().message, "Crop updated successfully");
    assert_eq!(h.transport.remaining(), 0);
}

#[test]
fn my_crops_are_created_for_the_logged_in_farmer() {
    let h = logged_in(FARMER_LOGIN);
    h.transport.push_json(200, "[]");
    let mut page = MyCropsPage::new(&h.services);
    assert_eq!(page.open(), &Phase::Ready);

    page.start_create().unwrap();
    let form = &mut page.editor_mut().unwrap().form;
    form.name = "Tomatoes".into();
    form.crop_type = Some(CropType::Vegetables);
    form.quantity = "40".into();
    form.farmer_id = "someone-else".into();
    h.transport.push_json(201, CORN).push_json(200, &list(CORN));
    page.submit().unwrap();

    let sent = &h.transport.requests()[2];
    assert_eq!(sent.method, HttpMethod::Post);
    let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["farmerId"], "f1");
    assert_eq!(body["unit"], "kg");
    assert_eq!(page.crops().len(), 1);
}

#[test]
fn profile_edit_and_password_change() {
    let detail = format!(
        r#"{{"id":"f1","firstName":"John","lastName":"Farmer","email":"john@agtech.com","createdAt":"2024-01-01T00:00:00Z","crops":[{CORN}]}}"#
    );
    let h = logged_in(FARMER_LOGIN);
    h.transport.push_json(200, &detail);
    let mut page = ProfilePage::new(&h.services);
    assert_eq!(page.open(), &Phase::Ready);
    assert_eq!(page.detail().unwrap().crops.len(), 1);
    assert_eq!(h.transport.last_request().unwrap().url, "http://localhost:8080/farmers/f1");

    assert!(page.start_edit());
    page.profile_form_mut().unwrap().phone = "+1 555 0100".into();
    h.transport.push_json(200, JOHN).push_json(200, &detail);
    page.submit_profile().unwrap();
    assert!(!page.is_editing());
    assert_eq!(page.notice().unwrap().message, "Profile updated successfully");

    page.password = PasswordForm {
        current_password: "farmer123".into(),
        new_password: "newpass1".into(),
        confirm_password: "newpass2".into(),
    };
    assert!(matches!(page.change_password(), Err(Error::Validation(_))));
    page.password.confirm_password = "newpass1".into();
    h.transport.push_json(200, r#"{"message":"Password changed"}"#);
    page.change_password().unwrap();
    assert_eq!(page.password, PasswordForm::default());
    assert_eq!(page.notice().unwrap().message, "Password changed successfully");
}

#[test]
fn admin_dashboard_reads_both_stats() {
    let h = logged_in(ADMIN_LOGIN);
    h.transport
        .push_json(200, r#"{"totalCrops":3,"cropsByType":[{"type":"CEREALS","count":2},{"type":"FRUITS","count":1}]}"#)
        .push_json(200, r#"{"totalFarmers":2,"totalCrops":3,"cropsPerFarmer":[{"id":"f1","firstName":"John","lastName":"Farmer","cropCount":3}]}"#);
    let mut page = DashboardPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Ready);
    let view = page.view().unwrap();
    assert_eq!(view.cards.len(), 4);
    assert_eq!(view.cards[2].value, "1.5");
    assert_eq!(view.charts[0].kind, ChartKind::Bar);
    let urls: Vec<String> = methods_after_login(&h).into_iter().map(|(_, url)| url).collect();
    assert_eq!(
        urls,
        vec!["http://localhost:8080/crops/stats", "http://localhost:8080/farmers/stats"]
    );
}

#[test]
fn farmer_dashboard_reads_crop_stats_only() {
    let h = logged_in(FARMER_LOGIN);
    h.transport
        .push_json(200, r#"{"totalCrops":1,"cropsByType":[{"type":"CEREALS","count":1}]}"#);
    let mut page = DashboardPage::new(&h.services);

    assert_eq!(page.open(), &Phase::Ready);
    let view = page.view().unwrap();
    assert!(view.greeting.starts_with("Welcome back, John"));
    assert_eq!(view.cards[0].title, "My Crops");
    assert_eq!(h.transport.requests().len(), 2);
}

#[test]
fn login_page_flow() {
    let h = harness();
    let mut page = LoginPage::new(&h.services);
    assert_eq!(page.open(), None);

    page.login.email = "admin@agtech.com".into();
    page.login.password = "wrong".into();
    h.transport.push_json(401, r#"{"message":"Invalid credentials"}"#);
    assert!(matches!(page.submit_login(), Err(Error::Auth(_))));
    assert_eq!(page.error(), Some("Invalid credentials. Please try again."));
    assert!(!page.is_loading());

    page.login.password = "admin123".into();
    h.transport.push_json(200, ADMIN_LOGIN);
    page.submit_login().unwrap();
    assert_eq!(page.error(), None);
    assert_eq!(page.open(), Some(Route::Dashboard));
}

#[test]
fn register_tab_reports_server_message() {
    let h = harness();
    let mut page = LoginPage::new(&h.services);
    page.select(Tab::Register);
    page.register.first_name = "John".into();
    page.register.last_name = "Farmer".into();
    page.register.email = "john@agtech.com".into();
    page.register.password = "farmer123".into();
    h.transport.push_json(409, r#"{"message":"Email already registered"}"#);

    assert!(matches!(page.submit_register(), Err(Error::Registration { status: 409, .. })));
    assert_eq!(page.error(), Some("Registration failed: Email already registered"));
    assert!(!h.services.session.is_authenticated());
}
