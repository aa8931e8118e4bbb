//! Synchronous client for the Mailchimp Marketing API.
//!
//! # Overview
//! Wraps the audience (mailing list), member and tag endpoints behind typed
//! factories and resources:
//!
//! ```text
//! Client ─ audiences() → AudienceFactory → Audience
//!                                         └ members() → MemberFactory → Member
//!                                                                      └ tags() → TagFactory → Tag
//! ```
//!
//! Every call flows through `Client::call`, which builds the request,
//! executes it on a pluggable `Transport`, and turns non-2xx statuses into
//! `MailchimpError`.
//!
//! # Design
//! - `Client` is immutable and cheap to clone; factories and resources hold
//!   their own clone, so nothing is ever observable half-bound.
//! - Resources are snapshots. They never refresh themselves.
//! - Members are addressed by `subscriber_hash(email)` on every per-member
//!   endpoint.
//! - One HTTP round trip per factory call. No retries, no caching.
//!
//! ```rust,no_run
//! use mailchimp_core::{Client, Config, CreateMember, MemberStatus};
//!
//! # fn main() -> mailchimp_core::Result<()> {
//! let client = Client::from_config(Config::new("us6", "0123456789abcdef-us6"));
//! let members = client.members("a1b2c3d4e5")?;
//! let member = members.create(&CreateMember::new("bugs.bunny@example.com", MemberStatus::Subscribed))?;
//! member.tags().add(&["Carrots"])?;
//! # Ok(())
//! # }
//! ```

pub mod audience;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod member;
pub mod tag;
pub mod types;

#[cfg(test)]
mod testing;

pub use audience::{
    Audience, AudienceData, AudienceFactory, AudienceStats, CampaignDefaults, Contact,
    CreateAudience, UpdateAudience,
};
pub use client::Client;
pub use config::Config;
pub use error::{FieldError, MailchimpError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, DEFAULT_TIMEOUT};
#[cfg(feature = "ureq")]
pub use http::UreqTransport;
pub use member::{
    subscriber_hash, CreateMember, Location, Member, MemberData, MemberFactory, MemberStats,
    MemberStatus, MergeFields, UpdateMember,
};
pub use tag::{Tag, TagFactory, TagStatus, TagUpdate};
pub use types::{Link, Timestamp};
