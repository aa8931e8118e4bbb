//! Audiences (mailing lists): the factory and the resource it returns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{decode, Client};
use crate::error::Result;
use crate::member::MemberFactory;
use crate::types::{deserialize_timestamp, Link, Timestamp};

/// Postal contact shown in the footer of campaigns sent to the audience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub company: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignDefaults {
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AudienceStats {
    pub member_count: u64,
    pub unsubscribe_count: u64,
    pub cleaned_count: u64,
    pub member_count_since_send: u64,
    pub unsubscribe_count_since_send: u64,
    pub cleaned_count_since_send: u64,
    pub campaign_count: u64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub campaign_last_sent: Timestamp,
    pub merge_field_count: u64,
    pub avg_sub_rate: f64,
    pub avg_unsub_rate: f64,
    pub target_sub_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_sub_date: Timestamp,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub last_unsub_date: Timestamp,
}

/// Snapshot of an audience as returned by the API.
///
/// `id` and `name` are required; every other field defaults when absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudienceData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_id: u64,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub permission_reminder: String,
    #[serde(default)]
    pub use_archive_bar: bool,
    #[serde(default)]
    pub campaign_defaults: CampaignDefaults,
    #[serde(default)]
    pub notify_on_subscribe: String,
    #[serde(default)]
    pub notify_on_unsubscribe: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_created: Timestamp,
    #[serde(default)]
    pub list_rating: u32,
    #[serde(default)]
    pub email_type_option: bool,
    #[serde(default)]
    pub subscribe_url_short: String,
    #[serde(default)]
    pub subscribe_url_long: String,
    #[serde(default)]
    pub beamer_address: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub double_optin: bool,
    #[serde(default)]
    pub has_welcome: bool,
    #[serde(default)]
    pub marketing_permissions: bool,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub stats: AudienceStats,
    #[serde(default, rename = "_links")]
    pub links: Vec<Link>,
}

/// An audience bound to the client that fetched it.
#[derive(Debug, Clone)]
pub struct Audience {
    client: Client,
    data: AudienceData,
}

impl Audience {
    pub fn new(client: Client, data: AudienceData) -> Self {
        Self { client, data }
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn data(&self) -> &AudienceData {
        &self.data
    }

    pub fn into_data(self) -> AudienceData {
        self.data
    }

    /// Member factory scoped to this audience.
    pub fn members(&self) -> MemberFactory {
        MemberFactory::new(self.client.clone(), Arc::new(self.clone()))
    }
}

/// Parameters for creating an audience. The API validates them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateAudience {
    pub name: String,
    pub contact: Contact,
    pub permission_reminder: String,
    pub campaign_defaults: CampaignDefaults,
    pub email_type_option: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_archive_bar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_subscribe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_on_unsubscribe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_optin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing_permissions: Option<bool>,
}

/// Partial update for an audience. Omitted fields stay unchanged remotely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateAudience {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_reminder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_defaults: Option<CampaignDefaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_type_option: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_archive_bar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_optin: Option<bool>,
}

#[derive(Deserialize)]
struct AudienceCollection {
    lists: Vec<AudienceData>,
}

/// CRUD over the `lists` endpoint.
#[derive(Debug, Clone)]
pub struct AudienceFactory {
    client: Client,
}

impl AudienceFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn get_all(&self) -> Result<Vec<Audience>> {
        let collection: AudienceCollection = decode(self.client.get(&endpoint(None))?)?;
        Ok(collection
            .lists
            .into_iter()
            .map(|data| self.bind(data))
            .collect())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Audience> {
        let data = decode(self.client.get(&endpoint(Some(id)))?)?;
        Ok(self.bind(data))
    }

    pub fn create<P: Serialize + ?Sized>(&self, parameters: &P) -> Result<Audience> {
        let data = decode(self.client.post(&endpoint(None), parameters)?)?;
        Ok(self.bind(data))
    }

    pub fn update<P: Serialize + ?Sized>(&self, id: &str, parameters: &P) -> Result<Audience> {
        let data = decode(self.client.patch(&endpoint(Some(id)), parameters)?)?;
        Ok(self.bind(data))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&endpoint(Some(id)))?;
        Ok(())
    }

    fn bind(&self, data: AudienceData) -> Audience {
        Audience::new(self.client.clone(), data)
    }
}

fn endpoint(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("lists/{id}"),
        None => "lists".to_string(),
    }
}
