mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use common::{MemoryStore, get, post_json, router};
use finwage_site::config::RevalidationSettings;
use finwage_site::domain::records::Record;

fn enquiry() -> serde_json::Value {
    json!({
        "name": "  Ada Lovelace ",
        "email": "ADA@Example.com",
        "message": "We would like a demo for 400 employees.",
        "interest": "demo",
        "company": "Analytical Engines",
        "phone": "+1 (555) 010-2000",
    })
}

#[tokio::test]
async fn valid_enquiry_is_stored_and_refreshes_contact_page() {
    let store = Arc::new(MemoryStore::default());
    store
        .insert(
            "contact_options",
            Record::new("c1").with_field("title", "Sales"),
        )
        .await;
    let router = router(store.clone(), RevalidationSettings::default());

    get(&router, "/contact").await;
    assert_eq!(get(&router, "/contact").await.cache.as_deref(), Some("hit"));

    let reply = post_json(&router, "/api/contact", &[], enquiry()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["success"], true);
    let id = reply.body["data"]["id"].as_str().expect("id").to_string();

    let stored = store.records("enquiries").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].str_field("name"), Some("Ada Lovelace"));
    assert_eq!(stored[0].str_field("email"), Some("ada@example.com"));
    assert_eq!(stored[0].str_field("status"), Some("new"));

    let after = get(&router, "/contact").await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.cache, None);
}

#[tokio::test]
async fn invalid_enquiry_reports_fields_and_changes_nothing() {
    let store = Arc::new(MemoryStore::default());
    let router = router(store.clone(), RevalidationSettings::default());

    get(&router, "/contact").await;

    let reply = post_json(
        &router,
        "/api/contact",
        &[],
        json!({ "name": "A", "email": "not-an-email", "message": "short" }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
    for field in ["name", "email", "message"] {
        assert!(
            reply.body["errors"][field].is_array(),
            "missing errors for {field}"
        );
    }
    assert!(store.records("enquiries").await.is_empty());
    assert_eq!(get(&router, "/contact").await.cache.as_deref(), Some("hit"));
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let router = router(Arc::new(MemoryStore::default()), RevalidationSettings::default());

    let reply = common::send(
        &router,
        axum::http::Request::post("/api/contact")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .expect("request"),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn unavailable_backend_is_service_unavailable() {
    let store = Arc::new(MemoryStore::default());
    store.set_unavailable(true);
    let router = router(store, RevalidationSettings::default());

    let reply = post_json(&router, "/api/contact", &[], enquiry()).await;

    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.body["error"]["code"], "source_unavailable");
}
