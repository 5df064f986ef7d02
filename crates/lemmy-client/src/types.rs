//! Lemmy v3 wire types
//!
//! Only the fields this client reads are modelled; everything else in the
//! responses is ignored by serde.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `type_` filter of `community/list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListingType {
    All,
    Local,
    #[default]
    Subscribed,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::All => "All",
            ListingType::Local => "Local",
            ListingType::Subscribed => "Subscribed",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow state reported by the instance for the logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribedType {
    Subscribed,
    NotSubscribed,
    Pending,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username_or_email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_2fa_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    /// Absent when registration still awaits approval or email verification
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommunityView {
    pub community: Community,
    #[serde(default)]
    pub subscribed: Option<SubscribedType>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListCommunitiesResponse {
    pub communities: Vec<CommunityView>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveObjectResponse {
    #[serde(default)]
    pub community: Option<CommunityView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FollowCommunity<'a> {
    pub community_id: i64,
    pub follow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommunityResponse {
    pub community_view: CommunityView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub ap_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub name: String,
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentView {
    pub comment: Comment,
    pub creator: Person,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetCommentsResponse {
    pub comments: Vec<CommentView>,
}
