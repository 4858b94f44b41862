mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use common::{MemoryStore, get, post_json, router};
use finwage_site::config::RevalidationSettings;
use finwage_site::domain::records::Record;

fn secrets() -> RevalidationSettings {
    RevalidationSettings {
        api_key: Some("api-key".to_string()),
        webhook_secret: Some("hook-secret".to_string()),
        cron_secret: Some("cron-secret".to_string()),
    }
}

#[tokio::test]
async fn revalidate_requires_the_api_key() {
    let router = router(Arc::new(MemoryStore::default()), secrets());
    let body = json!({ "tags": ["faqs"] });

    let missing = post_json(&router, "/api/revalidate/tag", &[], body.clone()).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"]["code"], "unauthorized");

    let wrong = post_json(
        &router,
        "/api/revalidate/tag",
        &[("x-api-key", "nope")],
        body.clone(),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let header = post_json(
        &router,
        "/api/revalidate/tag",
        &[("x-api-key", "api-key")],
        body.clone(),
    )
    .await;
    assert_eq!(header.status, StatusCode::OK);
    assert_eq!(header.body["tags"], json!(["faqs"]));

    let bearer = post_json(
        &router,
        "/api/revalidate/tag",
        &[("authorization", "Bearer api-key")],
        body,
    )
    .await;
    assert_eq!(bearer.status, StatusCode::OK);
}

#[tokio::test]
async fn collection_endpoint_uses_the_shared_registry() {
    let router = router(Arc::new(MemoryStore::default()), secrets());

    let reply = post_json(
        &router,
        "/api/revalidate/collection",
        &[("x-api-key", "api-key")],
        json!({ "collection": "blogs", "action": "update", "record": { "id": "b1", "slug": "ewa-explained" } }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["endpoint"], "collection");
    let tags = reply.body["tags"].as_array().expect("tags");
    assert!(tags.contains(&json!("blogs")));
    assert!(tags.contains(&json!("blog:ewa-explained")));
    let paths = reply.body["paths"].as_array().expect("paths");
    assert!(paths.contains(&json!("/blog")));
    assert!(paths.contains(&json!("/blog/ewa-explained")));
    assert!(reply.body["duration"].as_str().is_some_and(|d| d.ends_with("ms")));
}

#[tokio::test]
async fn bad_requests_are_rejected_before_invalidating() {
    let router = router(Arc::new(MemoryStore::default()), secrets());
    let key = [("x-api-key", "api-key")];

    let unknown = post_json(&router, "/api/revalidate/purge", &key, json!({})).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["error"]["code"], "invalid_endpoint");
    let hint = unknown.body["error"]["hint"].as_str().expect("hint");
    assert!(hint.contains("collection, tag, path, all"));

    let malformed = post_json(&router, "/api/revalidate/tag", &key, json!({ "tag": 3 })).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let empty = post_json(&router, "/api/revalidate/path", &key, json!({ "paths": [] })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let relative = post_json(
        &router,
        "/api/revalidate/path",
        &key,
        json!({ "paths": "contact" }),
    )
    .await;
    assert_eq!(relative.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revalidate_all_is_repeatable() {
    let router = router(Arc::new(MemoryStore::default()), secrets());
    let key = [("x-api-key", "api-key")];

    let first = post_json(&router, "/api/revalidate/all", &key, json!({})).await;
    let second = post_json(&router, "/api/revalidate/all", &key, json!({})).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["tags"], second.body["tags"]);
    let paths = first.body["paths"].as_array().expect("paths");
    assert!(paths.contains(&json!("/for-employees")));
}

#[tokio::test]
async fn webhook_checks_its_secret_and_reports_plan() {
    let store = Arc::new(MemoryStore::default());
    store
        .insert("faqs", Record::new("f1").with_field("question", "Fees?"))
        .await;
    let router = router(store, secrets());
    let payload = json!({ "action": "update", "collection": "faqs", "record": { "id": "f1" } });

    let health = get(&router, "/api/webhooks/pocketbase").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let rejected = post_json(&router, "/api/webhooks/pocketbase", &[], payload.clone()).await;
    assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);

    let accepted = post_json(
        &router,
        "/api/webhooks/pocketbase",
        &[("x-webhook-secret", "hook-secret")],
        payload,
    )
    .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.body["collection"], "faqs");
    assert!(
        accepted.body["tags"]
            .as_array()
            .expect("tags")
            .contains(&json!("faqs"))
    );
}

#[tokio::test]
async fn webhook_for_unknown_collection_is_a_no_op() {
    let router = router(Arc::new(MemoryStore::default()), RevalidationSettings::default());

    let reply = post_json(
        &router,
        "/api/webhooks/pocketbase",
        &[],
        json!({ "action": "create", "collection": "newsletter_signups" }),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["tags"], json!([]));
}

#[tokio::test]
async fn cron_refreshes_by_frequency() {
    let router = router(Arc::new(MemoryStore::default()), secrets());

    let unauthorized = get(&router, "/api/cron/revalidate?frequency=hourly").await;
    assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

    let hourly = common::send(
        &router,
        axum::http::Request::get("/api/cron/revalidate?frequency=hourly")
            .header("authorization", "Bearer cron-secret")
            .body(axum::body::Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(hourly.status, StatusCode::OK);
    assert_eq!(hourly.body["frequency"], "hourly");
    let tags = hourly.body["tags"].as_array().expect("tags");
    assert_eq!(tags.len(), 4);
    assert!(tags.contains(&json!("blogs")));

    let weekly = post_json(
        &router,
        "/api/cron/revalidate",
        &[("authorization", "Bearer cron-secret")],
        json!({ "frequency": "weekly" }),
    )
    .await;
    assert_eq!(weekly.status, StatusCode::OK);
    assert!(
        weekly.body["tags"]
            .as_array()
            .expect("tags")
            .contains(&json!("leadership"))
    );

    let bad = post_json(
        &router,
        "/api/cron/revalidate",
        &[("authorization", "Bearer cron-secret")],
        json!({ "frequency": "monthly" }),
    )
    .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}
