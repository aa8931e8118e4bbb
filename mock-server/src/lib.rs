//! In-memory imitation of the Mailchimp Marketing API subset the client uses:
//! lists, list members, and member tags, behind HTTP basic auth.
//!
//! Errors come back as problem-detail JSON (`title`, `status`, `detail`,
//! optional `errors`) the same way the real API reports them.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// API key `app()` accepts.
pub const DEFAULT_API_KEY: &str = "mock-key-us0";

/// API version segment every route is nested under.
pub const API_VERSION: &str = "3.0";

const MEMBER_STATUSES: [&str; 6] = [
    "subscribed",
    "unsubscribed",
    "cleaned",
    "pending",
    "transactional",
    "archived",
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Problem-detail error response.
#[derive(Debug)]
pub struct ApiProblem {
    status: StatusCode,
    title: String,
    detail: String,
    errors: Vec<FieldError>,
}

impl ApiProblem {
    fn new(status: StatusCode, title: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            title: title.to_string(),
            detail: detail.into(),
            errors: Vec::new(),
        }
    }

    fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "Resource Not Found",
            "The requested resource could not be found.",
        )
    }

    fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "API Key Invalid",
            "Your API key may be invalid, or you've attempted to access the wrong datacenter.",
        )
    }

    fn invalid(errors: Vec<FieldError>) -> Self {
        Self {
            errors,
            ..Self::new(
                StatusCode::BAD_REQUEST,
                "Invalid Resource",
                "The resource submitted could not be validated. For field-specific details, see the 'errors' array.",
            )
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({
            "type": "https://mailchimp.com/developer/marketing/docs/errors/",
            "title": self.title,
            "status": self.status.as_u16(),
            "detail": self.detail,
            "instance": Uuid::new_v4().to_string(),
        });
        if !self.errors.is_empty() {
            body["errors"] = json!(self.errors);
        }
        body
    }
}

impl IntoResponse for ApiProblem {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            self.body().to_string(),
        )
            .into_response()
    }
}

fn blank(field: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: "This value should not be blank.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TagRecord {
    id: u64,
    name: String,
    date_added: String,
}

#[derive(Debug, Clone)]
struct MemberRecord {
    email_address: String,
    unique_email_id: String,
    status: String,
    merge_fields: Value,
    language: String,
    vip: bool,
    timestamp_opt: String,
    last_changed: String,
    tags: Vec<TagRecord>,
}

#[derive(Debug, Default)]
struct ListRecord {
    fields: Map<String, Value>,
    members: HashMap<String, MemberRecord>,
    /// Tag ids are scoped to a list: the same name keeps the same id.
    tag_ids: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct Store {
    lists: HashMap<String, ListRecord>,
    next_web_id: u64,
}

#[derive(Clone)]
struct AppState {
    api_key: Arc<str>,
    store: Arc<RwLock<Store>>,
}

type Db = Arc<RwLock<Store>>;

/// Router accepting `DEFAULT_API_KEY`.
pub fn app() -> Router {
    app_with_api_key(DEFAULT_API_KEY)
}

pub fn app_with_api_key(api_key: &str) -> Router {
    let state = AppState {
        api_key: Arc::from(api_key),
        store: Db::default(),
    };

    let api = Router::new()
        .route("/lists", get(list_lists).post(create_list))
        .route(
            "/lists/{list_id}",
            get(get_list).patch(update_list).delete(delete_list),
        )
        .route(
            "/lists/{list_id}/members",
            get(list_members).post(create_member),
        )
        .route(
            "/lists/{list_id}/members/{hash}",
            get(get_member).patch(update_member).delete(archive_member),
        )
        .route(
            "/lists/{list_id}/members/{hash}/actions/delete-permanent",
            post(delete_member_permanent),
        )
        .route(
            "/lists/{list_id}/members/{hash}/tags",
            get(list_tags).post(update_tags),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state);

    Router::new().nest(&format!("/{API_VERSION}"), api)
}

pub async fn run(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_api_key(api_key)).await
}

pub fn subscriber_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.trim().to_lowercase()))
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Password half of a `Basic` authorization header. The username is ignored.
fn basic_auth_password(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let password = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(basic_auth_password);

    match password {
        Some(key) if key == *state.api_key => next.run(request).await,
        _ => {
            tracing::debug!(uri = %request.uri(), "Rejected request with bad API key");
            ApiProblem::unauthorized().into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

fn list_json(list: &ListRecord) -> Value {
    let mut fields = list.fields.clone();
    let subscribed = list
        .members
        .values()
        .filter(|m| m.status == "subscribed")
        .count();
    let unsubscribed = list
        .members
        .values()
        .filter(|m| m.status == "unsubscribed")
        .count();
    fields.insert(
        "stats".to_string(),
        json!({
            "member_count": subscribed,
            "unsubscribe_count": unsubscribed,
            "cleaned_count": 0,
            "campaign_count": 0,
            "campaign_last_sent": "",
            "last_sub_date": "",
            "last_unsub_date": "",
        }),
    );
    Value::Object(fields)
}

async fn list_lists(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    let lists: Vec<Value> = store.lists.values().map(list_json).collect();
    let total = lists.len();
    Json(json!({ "lists": lists, "total_items": total }))
}

async fn create_list(
    State(state): State<AppState>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiProblem> {
    let mut errors = Vec::new();
    for field in ["name", "permission_reminder"] {
        if input.get(field).and_then(Value::as_str).unwrap_or("").is_empty() {
            errors.push(blank(field));
        }
    }
    for field in ["contact", "campaign_defaults"] {
        if !input.get(field).is_some_and(Value::is_object) {
            errors.push(blank(field));
        }
    }
    if !errors.is_empty() {
        return Err(ApiProblem::invalid(errors));
    }

    let mut store = state.store.write().await;
    store.next_web_id += 1;

    let id = Uuid::new_v4().simple().to_string()[..10].to_string();
    let defaults = json!({
        "web_id": store.next_web_id,
        "use_archive_bar": false,
        "notify_on_subscribe": "",
        "notify_on_unsubscribe": "",
        "date_created": now(),
        "list_rating": 0,
        "email_type_option": false,
        "subscribe_url_short": "",
        "subscribe_url_long": "",
        "beamer_address": "",
        "visibility": "prv",
        "double_optin": false,
        "has_welcome": false,
        "marketing_permissions": false,
        "modules": [],
        "_links": [],
    });
    let mut fields = match defaults {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    fields.extend(input);
    fields.insert("id".to_string(), json!(id));
    let list = ListRecord {
        fields,
        ..Default::default()
    };

    tracing::info!(list_id = %id, "Created list");
    let body = list_json(&list);
    store.lists.insert(id, list);
    Ok(Json(body))
}

async fn get_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<Value>, ApiProblem> {
    let store = state.store.read().await;
    let list = store.lists.get(&list_id).ok_or_else(ApiProblem::not_found)?;
    Ok(Json(list_json(list)))
}

async fn update_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiProblem> {
    let mut store = state.store.write().await;
    let list = store.lists.get_mut(&list_id).ok_or_else(ApiProblem::not_found)?;
    for (key, value) in input {
        if key != "id" {
            list.fields.insert(key, value);
        }
    }
    Ok(Json(list_json(list)))
}

async fn delete_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<StatusCode, ApiProblem> {
    let mut store = state.store.write().await;
    store
        .lists
        .remove(&list_id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(ApiProblem::not_found)
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

fn member_json(list_id: &str, hash: &str, member: &MemberRecord) -> Value {
    let tags: Vec<Value> = member
        .tags
        .iter()
        .map(|t| json!({ "id": t.id, "name": t.name }))
        .collect();
    let tags_count = tags.len();
    json!({
        "id": hash,
        "email_address": member.email_address,
        "unique_email_id": member.unique_email_id,
        "email_type": "html",
        "status": member.status,
        "merge_fields": member.merge_fields,
        "stats": { "avg_open_rate": 0, "avg_click_rate": 0 },
        "ip_signup": "",
        "timestamp_signup": "",
        "ip_opt": "",
        "timestamp_opt": member.timestamp_opt,
        "member_rating": 2,
        "last_changed": member.last_changed,
        "language": member.language,
        "vip": member.vip,
        "email_client": "",
        "location": {
            "latitude": 0, "longitude": 0, "gmtoff": 0, "dstoff": 0,
            "country_code": "", "timezone": ""
        },
        "source": "API - Generic",
        "tags_count": tags_count,
        "tags": tags,
        "list_id": list_id,
        "_links": [],
    })
}

fn validate_status(input: &Map<String, Value>, required: bool) -> Result<Option<String>, FieldError> {
    match input.get("status") {
        None if !required => Ok(None),
        Some(Value::String(s)) if MEMBER_STATUSES.contains(&s.as_str()) => Ok(Some(s.clone())),
        _ => Err(FieldError {
            field: "status".to_string(),
            message: "Status must be one of: subscribed, unsubscribed, cleaned, pending, transactional."
                .to_string(),
        }),
    }
}

async fn list_members(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<Value>, ApiProblem> {
    let store = state.store.read().await;
    let list = store.lists.get(&list_id).ok_or_else(ApiProblem::not_found)?;
    let members: Vec<Value> = list
        .members
        .iter()
        .map(|(hash, m)| member_json(&list_id, hash, m))
        .collect();
    let total = members.len();
    Ok(Json(json!({ "members": members, "list_id": list_id, "total_items": total })))
}

async fn create_member(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiProblem> {
    let email = input
        .get("email_address")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let mut errors = Vec::new();
    if !email.contains('@') {
        errors.push(FieldError {
            field: "email_address".to_string(),
            message: "Please provide a valid email address.".to_string(),
        });
    }
    let status = match validate_status(&input, true) {
        Ok(status) => status.unwrap_or_default(),
        Err(e) => {
            errors.push(e);
            String::new()
        }
    };
    if !errors.is_empty() {
        return Err(ApiProblem::invalid(errors));
    }

    let mut store = state.store.write().await;
    let list = store.lists.get_mut(&list_id).ok_or_else(ApiProblem::not_found)?;

    let hash = subscriber_hash(&email);
    if list.members.contains_key(&hash) {
        return Err(ApiProblem::new(
            StatusCode::BAD_REQUEST,
            "Member Exists",
            format!("{email} is already a list member. Use PUT to insert or update list members."),
        ));
    }

    let stamp = now();
    let member = MemberRecord {
        email_address: email,
        unique_email_id: Uuid::new_v4().simple().to_string()[..10].to_string(),
        status,
        merge_fields: input.get("merge_fields").cloned().unwrap_or_else(|| json!({})),
        language: input
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        vip: input.get("vip").and_then(Value::as_bool).unwrap_or(false),
        timestamp_opt: stamp.clone(),
        last_changed: stamp,
        tags: Vec::new(),
    };

    tracing::info!(list_id = %list_id, hash = %hash, "Created member");
    let body = member_json(&list_id, &hash, &member);
    list.members.insert(hash, member);
    Ok(Json(body))
}

async fn get_member(
    State(state): State<AppState>,
    Path((list_id, hash)): Path<(String, String)>,
) -> Result<Json<Value>, ApiProblem> {
    let store = state.store.read().await;
    let member = store
        .lists
        .get(&list_id)
        .and_then(|l| l.members.get(&hash))
        .ok_or_else(ApiProblem::not_found)?;
    Ok(Json(member_json(&list_id, &hash, member)))
}

async fn update_member(
    State(state): State<AppState>,
    Path((list_id, hash)): Path<(String, String)>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiProblem> {
    let status = validate_status(&input, false).map_err(|e| ApiProblem::invalid(vec![e]))?;

    let mut store = state.store.write().await;
    let member = store
        .lists
        .get_mut(&list_id)
        .and_then(|l| l.members.get_mut(&hash))
        .ok_or_else(ApiProblem::not_found)?;

    if let Some(status) = status {
        member.status = status;
    }
    if let Some(Value::Object(fields)) = input.get("merge_fields") {
        if let Value::Object(existing) = &mut member.merge_fields {
            existing.extend(fields.clone());
        }
    }
    if let Some(language) = input.get("language").and_then(Value::as_str) {
        member.language = language.to_string();
    }
    if let Some(vip) = input.get("vip").and_then(Value::as_bool) {
        member.vip = vip;
    }
    member.last_changed = now();

    Ok(Json(member_json(&list_id, &hash, member)))
}

/// DELETE on a member archives it; it stays retrievable.
async fn archive_member(
    State(state): State<AppState>,
    Path((list_id, hash)): Path<(String, String)>,
) -> Result<StatusCode, ApiProblem> {
    let mut store = state.store.write().await;
    let member = store
        .lists
        .get_mut(&list_id)
        .and_then(|l| l.members.get_mut(&hash))
        .ok_or_else(ApiProblem::not_found)?;
    member.status = "archived".to_string();
    member.last_changed = now();
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_member_permanent(
    State(state): State<AppState>,
    Path((list_id, hash)): Path<(String, String)>,
) -> Result<StatusCode, ApiProblem> {
    let mut store = state.store.write().await;
    store
        .lists
        .get_mut(&list_id)
        .and_then(|l| l.members.remove(&hash))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(ApiProblem::not_found)
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TagChange {
    name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TagChanges {
    tags: Vec<TagChange>,
}

async fn list_tags(
    State(state): State<AppState>,
    Path((list_id, hash)): Path<(String, String)>,
) -> Result<Json<Value>, ApiProblem> {
    let store = state.store.read().await;
    let member = store
        .lists
        .get(&list_id)
        .and_then(|l| l.members.get(&hash))
        .ok_or_else(ApiProblem::not_found)?;
    let tags: Vec<Value> = member
        .tags
        .iter()
        .map(|t| json!({ "id": t.id, "name": t.name, "date_added": t.date_added }))
        .collect();
    let total = tags.len();
    Ok(Json(json!({ "tags": tags, "total_items": total })))
}

/// Activates or deactivates the named tags. Tags not mentioned are untouched.
async fn update_tags(
    State(state): State<AppState>,
    Path((list_id, hash)): Path<(String, String)>,
    Json(input): Json<TagChanges>,
) -> Result<StatusCode, ApiProblem> {
    if let Some(bad) = input
        .tags
        .iter()
        .find(|t| t.status != "active" && t.status != "inactive")
    {
        return Err(ApiProblem::invalid(vec![FieldError {
            field: "tags".to_string(),
            message: format!("Tag status \"{}\" must be active or inactive.", bad.status),
        }]));
    }

    let mut store = state.store.write().await;
    let list = store.lists.get_mut(&list_id).ok_or_else(ApiProblem::not_found)?;
    if !list.members.contains_key(&hash) {
        return Err(ApiProblem::not_found());
    }

    for change in input.tags {
        let next_id = list.tag_ids.len() as u64 + 1;
        let id = *list.tag_ids.entry(change.name.clone()).or_insert(next_id);
        let Some(member) = list.members.get_mut(&hash) else {
            break;
        };
        let present = member.tags.iter().position(|t| t.name == change.name);
        match (change.status.as_str(), present) {
            ("active", None) => member.tags.push(TagRecord {
                id,
                name: change.name,
                date_added: now(),
            }),
            ("inactive", Some(index)) => {
                member.tags.remove(index);
            }
            _ => {}
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
