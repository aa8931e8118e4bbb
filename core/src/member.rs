//! Audience members: the factory, the resource, and the subscriber hash.
//!
//! Per-member endpoints are addressed by the subscriber hash of the email
//! address, never by the opaque `id` the API also returns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::audience::Audience;
use crate::client::{decode, Client};
use crate::error::Result;
use crate::tag::{Tag, TagFactory};
use crate::types::{deserialize_timestamp, Link, Timestamp};

/// MD5 of the trimmed, lower-cased email address, as lowercase hex.
pub fn subscriber_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.trim().to_lowercase()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
    Unsubscribed,
    Cleaned,
    Pending,
    Transactional,
    Archived,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Subscribed => "subscribed",
            MemberStatus::Unsubscribed => "unsubscribed",
            MemberStatus::Cleaned => "cleaned",
            MemberStatus::Pending => "pending",
            MemberStatus::Transactional => "transactional",
            MemberStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge tags stored on a member. The four default tags get named fields;
/// any audience-specific tags land in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeFields {
    #[serde(rename = "FNAME", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "LNAME", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Either an address object or an empty string, depending on the audience.
    #[serde(rename = "ADDRESS", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Value>,
    #[serde(rename = "PHONE", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemberStats {
    pub avg_open_rate: f64,
    pub avg_click_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub gmtoff: i32,
    pub dstoff: i32,
    pub country_code: String,
    pub timezone: String,
}

/// Snapshot of a member as returned by the API.
///
/// `id`, `email_address` and `status` are required; an unknown status is a
/// deserialization error. Everything else defaults when absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberData {
    pub id: String,
    pub email_address: String,
    pub status: MemberStatus,
    #[serde(default)]
    pub unique_email_id: String,
    #[serde(default)]
    pub web_id: u64,
    #[serde(default)]
    pub email_type: String,
    #[serde(default)]
    pub merge_fields: MergeFields,
    #[serde(default)]
    pub stats: MemberStats,
    #[serde(default)]
    pub ip_signup: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp_signup: Timestamp,
    #[serde(default)]
    pub ip_opt: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp_opt: Timestamp,
    #[serde(default)]
    pub member_rating: u32,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub last_changed: Timestamp,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub vip: bool,
    #[serde(default)]
    pub email_client: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub tags_count: u32,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub list_id: String,
    #[serde(default, rename = "_links")]
    pub links: Vec<Link>,
}

/// A member bound to its client and owning audience.
#[derive(Debug, Clone)]
pub struct Member {
    client: Client,
    audience: Arc<Audience>,
    data: MemberData,
}

impl Member {
    pub fn new(client: Client, audience: Arc<Audience>, data: MemberData) -> Self {
        Self {
            client,
            audience,
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn email_address(&self) -> &str {
        &self.data.email_address
    }

    pub fn status(&self) -> MemberStatus {
        self.data.status
    }

    /// The subscriber hash used to address this member.
    pub fn hash(&self) -> String {
        subscriber_hash(&self.data.email_address)
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn data(&self) -> &MemberData {
        &self.data
    }

    pub fn into_data(self) -> MemberData {
        self.data
    }

    /// Tag factory scoped to this member.
    pub fn tags(&self) -> TagFactory {
        TagFactory::new(self.client.clone(), self.clone())
    }
}

/// Parameters for adding a member to an audience.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMember {
    pub email_address: String,
    pub status: MemberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_fields: Option<MergeFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CreateMember {
    pub fn new(email_address: impl Into<String>, status: MemberStatus) -> Self {
        Self {
            email_address: email_address.into(),
            status,
            email_type: None,
            merge_fields: None,
            language: None,
            vip: None,
            tags: Vec::new(),
        }
    }
}

/// Partial update for a member. Omitted fields stay unchanged remotely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MemberStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_fields: Option<MergeFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<bool>,
}

#[derive(Deserialize)]
struct MemberCollection {
    members: Vec<MemberData>,
}

/// CRUD and archive transitions over `lists/{audience}/members`.
#[derive(Debug, Clone)]
pub struct MemberFactory {
    client: Client,
    audience: Arc<Audience>,
}

impl MemberFactory {
    pub fn new(client: Client, audience: Arc<Audience>) -> Self {
        Self { client, audience }
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn get_all(&self) -> Result<Vec<Member>> {
        let collection: MemberCollection = decode(self.client.get(&self.endpoint(None))?)?;
        Ok(collection
            .members
            .into_iter()
            .map(|data| self.bind(data))
            .collect())
    }

    pub fn get_by_email(&self, email: &str) -> Result<Member> {
        let data = decode(self.client.get(&self.endpoint(Some(email)))?)?;
        Ok(self.bind(data))
    }

    pub fn create<P: Serialize + ?Sized>(&self, parameters: &P) -> Result<Member> {
        let data = decode(self.client.post(&self.endpoint(None), parameters)?)?;
        Ok(self.bind(data))
    }

    pub fn update<P: Serialize + ?Sized>(&self, email: &str, parameters: &P) -> Result<Member> {
        let data = decode(self.client.patch(&self.endpoint(Some(email)), parameters)?)?;
        Ok(self.bind(data))
    }

    /// Archive the member. The API keeps archived members retrievable.
    pub fn archive(&self, email: &str) -> Result<()> {
        self.client.delete(&self.endpoint(Some(email)))?;
        Ok(())
    }

    /// Move an archived member back to `subscribed`.
    pub fn unarchive(&self, email: &str) -> Result<Member> {
        self.update(email, &json!({ "status": MemberStatus::Subscribed }))
    }

    /// Permanently erase the member. Irreversible.
    pub fn delete(&self, email: &str) -> Result<()> {
        let endpoint = format!("{}/actions/delete-permanent", self.endpoint(Some(email)));
        self.client.post(&endpoint, &json!({}))?;
        Ok(())
    }

    fn endpoint(&self, email: Option<&str>) -> String {
        let base = format!("lists/{}/members", self.audience.id());
        match email {
            Some(email) => format!("{base}/{}", subscriber_hash(email)),
            None => base,
        }
    }

    fn bind(&self, data: MemberData) -> Member {
        Member::new(self.client.clone(), Arc::clone(&self.audience), data)
    }
}
