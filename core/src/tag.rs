//! Tags on a single member.
//!
//! The API has no per-tag endpoints: every change is a POST of `{name, status}`
//! entries to the member's tag collection. Entries marked `inactive` remove the
//! tag; tags left out of the payload are not touched.

use serde::{Deserialize, Serialize};

use crate::client::{decode, Client};
use crate::error::Result;
use crate::member::Member;
use crate::types::{deserialize_timestamp, Timestamp};

/// A tag as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub date_added: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStatus {
    Active,
    Inactive,
}

/// One entry of a tag update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUpdate {
    pub name: String,
    pub status: TagStatus,
}

impl TagUpdate {
    pub fn active(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TagStatus::Active,
        }
    }

    pub fn inactive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TagStatus::Inactive,
        }
    }
}

#[derive(Serialize)]
struct TagPayload<'a> {
    tags: &'a [TagUpdate],
}

#[derive(Deserialize)]
struct TagCollection {
    tags: Vec<Tag>,
}

/// Tag operations for one member.
#[derive(Debug, Clone)]
pub struct TagFactory {
    client: Client,
    member: Member,
}

impl TagFactory {
    pub fn new(client: Client, member: Member) -> Self {
        Self { client, member }
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    /// Activate each named tag, creating it if needed.
    pub fn add<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let tags: Vec<TagUpdate> = names.iter().map(|n| TagUpdate::active(n.as_ref())).collect();
        self.set(&tags)
    }

    /// Deactivate each named tag.
    pub fn remove<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let tags: Vec<TagUpdate> = names
            .iter()
            .map(|n| TagUpdate::inactive(n.as_ref()))
            .collect();
        self.set(&tags)
    }

    /// Send the given entries as-is; the caller picks each status.
    pub fn set(&self, tags: &[TagUpdate]) -> Result<()> {
        self.client.post(&self.endpoint(), &TagPayload { tags })?;
        Ok(())
    }

    pub fn get_all(&self) -> Result<Vec<Tag>> {
        let collection: TagCollection = decode(self.client.get(&self.endpoint())?)?;
        Ok(collection.tags)
    }

    fn endpoint(&self) -> String {
        format!(
            "lists/{}/members/{}/tags",
            self.member.audience().id(),
            self.member.hash()
        )
    }
}
