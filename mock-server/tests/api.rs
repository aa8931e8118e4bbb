use axum::http::{self, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http_body_util::BodyExt;
use mock_server::{app, subscriber_hash, DEFAULT_API_KEY};
use serde_json::{json, Value};
use tower::{Service, ServiceExt};

fn auth(key: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("apikey:{key}")))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, auth(DEFAULT_API_KEY))
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, auth(DEFAULT_API_KEY))
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn new_list(name: &str) -> Value {
    json!({
        "name": name,
        "contact": {"company": "Acme", "address1": "1 Main St", "city": "Springfield", "state": "IL", "zip": "62701", "country": "US"},
        "permission_reminder": "You signed up on our site.",
        "campaign_defaults": {"from_name": "Acme", "from_email": "news@acme.test", "subject": "", "language": "en"},
        "email_type_option": false
    })
}

async fn send(app: &mut axum::routing::RouterIntoService<String>, req: Request<String>) -> axum::response::Response {
    ServiceExt::ready(app).await.unwrap().call(req).await.unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_credentials_return_401_problem() {
    let resp = app()
        .oneshot(Request::builder().uri("/3.0/lists").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["status"], 401);
    assert_eq!(body["title"], "API Key Invalid");
    assert!(body["detail"].as_str().unwrap().contains("API key"));
}

#[tokio::test]
async fn wrong_key_returns_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/3.0/lists")
                .header(http::header::AUTHORIZATION, auth("wrong-key"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- lists ---

#[tokio::test]
async fn list_lists_empty() {
    let resp = app().oneshot(request("GET", "/3.0/lists")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["lists"], json!([]));
    assert_eq!(body["total_items"], 0);
}

#[tokio::test]
async fn create_list_without_name_returns_field_errors() {
    let resp = app()
        .oneshot(json_request("POST", "/3.0/lists", json!({"permission_reminder": "x"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Invalid Resource");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"contact"));
}

#[tokio::test]
async fn get_unknown_list_returns_404_problem() {
    let resp = app().oneshot(request("GET", "/3.0/lists/nope")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["detail"], "The requested resource could not be found.");
}

#[tokio::test]
async fn list_lifecycle() {
    let mut app = app().into_service();

    let resp = send(&mut app, json_request("POST", "/3.0/lists", new_list("Newsletter"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Newsletter");
    assert_eq!(created["stats"]["member_count"], 0);

    let resp = send(
        &mut app,
        json_request("PATCH", &format!("/3.0/lists/{id}"), json!({"name": "Weekly"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["name"], "Weekly");
    assert_eq!(updated["permission_reminder"], "You signed up on our site."); // unchanged

    let resp = send(&mut app, request("DELETE", &format!("/3.0/lists/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&mut app, request("GET", &format!("/3.0/lists/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- members and tags ---

#[tokio::test]
async fn member_archive_and_permanent_delete() {
    let mut app = app().into_service();

    let resp = send(&mut app, json_request("POST", "/3.0/lists", new_list("Members"))).await;
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();
    let hash = subscriber_hash("daffy@example.com");
    let member_uri = format!("/3.0/lists/{id}/members/{hash}");

    let resp = send(
        &mut app,
        json_request(
            "POST",
            &format!("/3.0/lists/{id}/members"),
            json!({"email_address": "Daffy@example.com", "status": "subscribed"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["id"], hash.as_str());

    // duplicate
    let resp = send(
        &mut app,
        json_request(
            "POST",
            &format!("/3.0/lists/{id}/members"),
            json!({"email_address": "daffy@example.com", "status": "pending"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["title"], "Member Exists");

    // archive keeps the member around
    let resp = send(&mut app, request("DELETE", &member_uri)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&mut app, request("GET", &member_uri)).await;
    assert_eq!(body_json(resp).await["status"], "archived");

    // permanent delete removes it
    let resp = send(
        &mut app,
        json_request("POST", &format!("{member_uri}/actions/delete-permanent"), json!({})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&mut app, request("GET", &member_uri)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inactive_tags_are_removed_and_unmentioned_tags_kept() {
    let mut app = app().into_service();

    let resp = send(&mut app, json_request("POST", "/3.0/lists", new_list("Tags"))).await;
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();
    send(
        &mut app,
        json_request(
            "POST",
            &format!("/3.0/lists/{id}/members"),
            json!({"email_address": "porky@example.com", "status": "subscribed"}),
        ),
    )
    .await;
    let tags_uri = format!(
        "/3.0/lists/{id}/members/{}/tags",
        subscriber_hash("porky@example.com")
    );

    let resp = send(
        &mut app,
        json_request(
            "POST",
            &tags_uri,
            json!({"tags": [{"name": "A", "status": "active"}, {"name": "C", "status": "active"}]}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(
        &mut app,
        json_request(
            "POST",
            &tags_uri,
            json!({"tags": [{"name": "A", "status": "inactive"}, {"name": "B", "status": "active"}]}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&mut app, request("GET", &tags_uri)).await;
    let body = body_json(resp).await;
    let names: Vec<&str> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["C", "B"]);
}

#[tokio::test]
async fn bad_tag_status_is_rejected() {
    let mut app = app().into_service();

    let resp = send(&mut app, json_request("POST", "/3.0/lists", new_list("Tags"))).await;
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();
    send(
        &mut app,
        json_request(
            "POST",
            &format!("/3.0/lists/{id}/members"),
            json!({"email_address": "elmer@example.com", "status": "subscribed"}),
        ),
    )
    .await;

    let resp = send(
        &mut app,
        json_request(
            "POST",
            &format!(
                "/3.0/lists/{id}/members/{}/tags",
                subscriber_hash("elmer@example.com")
            ),
            json!({"tags": [{"name": "A", "status": "paused"}]}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
