//! Per-account session
//!
//! Wraps the executor with one account's site and bearer token. The
//! subscription set is an explicit cache: `subscriptions()` fills it on first
//! use, `refresh_subscriptions()` forces a refetch, and successful follows
//! grow it so a later sync in the same process sees them.

use std::collections::HashSet;

use common::Secret;
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::community::CommunityRef;
use crate::constants::{
    COMMENT_LIST_PATH, COMMUNITY_FOLLOW_PATH, COMMUNITY_LIST_PATH, DEFAULT_MAX_PAGE_ATTEMPTS,
    LOGIN_PATH, PAGE_SIZE, RESOLVE_OBJECT_PATH,
};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::site::SiteIdentity;
use crate::types::{
    CommentView, CommunityResponse, FollowCommunity, GetCommentsResponse,
    ListCommunitiesResponse, ListingType, LoginRequest, LoginResponse, ResolveObjectResponse,
    SubscribedType,
};

/// Behaviour switches for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Skip follow calls and report them as simulated
    pub dry_run: bool,
    pub page_size: u32,
    /// Failed page fetches tolerated within one listing
    pub max_page_attempts: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            page_size: PAGE_SIZE,
            max_page_attempts: DEFAULT_MAX_PAGE_ATTEMPTS,
        }
    }
}

/// Result of a follow request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Subscribed,
    /// Accepted, waiting for the remote instance to confirm
    Pending,
    /// Already in the cached subscription set; nothing was sent
    AlreadySubscribed,
    /// Dry run; nothing was sent
    Simulated,
}

/// One logged-in (or anonymous) account on one instance.
pub struct AccountSession {
    name: String,
    site: SiteIdentity,
    executor: Executor,
    options: SessionOptions,
    token: Option<Secret<String>>,
    subscriptions: Option<HashSet<String>>,
}

impl AccountSession {
    /// `name` labels the account in logs; it is usually the config section.
    pub fn new(
        name: impl Into<String>,
        site: SiteIdentity,
        executor: Executor,
        options: SessionOptions,
    ) -> Self {
        Self {
            name: name.into(),
            site,
            executor,
            options,
            token: None,
            subscriptions: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn site(&self) -> &SiteIdentity {
        &self.site
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn auth_param(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose().as_str())
    }

    /// Log in and keep the returned token for the rest of the session.
    ///
    /// Any failure, including a response without a token, is reported as
    /// `Error::Authentication` wrapping the cause.
    pub async fn login(
        &mut self,
        username: &str,
        password: &Secret<String>,
        totp: Option<&str>,
    ) -> Result<()> {
        let url = self.site.endpoint(LOGIN_PATH);
        let body = serde_json::to_value(LoginRequest {
            username_or_email: username,
            password: password.expose(),
            totp_2fa_token: totp.filter(|t| !t.is_empty()),
        })
        .map_err(|e| {
            Error::Authentication(Box::new(Error::Decode {
                endpoint: url.clone(),
                message: e.to_string(),
            }))
        })?;

        let response: LoginResponse = self
            .executor
            .execute_json(Method::POST, &url, &[], Some(&body), None)
            .await
            .map_err(|e| Error::Authentication(Box::new(e)))?;

        let jwt = response.jwt.filter(|t| !t.is_empty()).ok_or_else(|| {
            Error::Authentication(Box::new(Error::Decode {
                endpoint: url.clone(),
                message: "login response did not include a token".into(),
            }))
        })?;

        self.token = Some(Secret::new(jwt));
        info!(account = %self.name, site = %self.site, user = username, "logged in");
        Ok(())
    }

    /// Subscribed communities, fetched on first call and cached afterwards.
    pub async fn subscriptions(&mut self) -> Result<&HashSet<String>> {
        if self.subscriptions.is_none() {
            let fetched = self.list_communities(ListingType::Subscribed).await?;
            self.subscriptions = Some(fetched);
        }
        Ok(&*self.subscriptions.get_or_insert_with(HashSet::new))
    }

    /// Drop the cache and fetch the subscription set again.
    pub async fn refresh_subscriptions(&mut self) -> Result<&HashSet<String>> {
        self.invalidate_subscriptions();
        self.subscriptions().await
    }

    pub fn invalidate_subscriptions(&mut self) {
        self.subscriptions = None;
    }

    /// Replace the cache with a known set, e.g. one read from a backup.
    pub fn seed_subscriptions(&mut self, communities: HashSet<String>) {
        self.subscriptions = Some(communities);
    }

    /// Record a community as followed without asking the instance.
    pub fn record_subscription(&mut self, actor_id: &str) {
        if let Some(set) = self.subscriptions.as_mut() {
            set.insert(actor_id.to_owned());
        }
    }

    /// Page through `community/list` until a short page comes back.
    ///
    /// A failed page is logged and retried with the same page number. After
    /// `max_page_attempts` failures in total the listing is abandoned with
    /// `Error::ListingAborted`, so a permanently broken endpoint cannot loop
    /// forever.
    pub async fn list_communities(&self, listing_type: ListingType) -> Result<HashSet<String>> {
        let url = self.site.endpoint(COMMUNITY_LIST_PATH);
        let page_size = self.options.page_size.max(1);
        let mut communities = HashSet::new();
        let mut page: u32 = 1;
        let mut failures: u32 = 0;

        loop {
            let mut query = vec![
                ("type_", listing_type.to_string()),
                ("limit", page_size.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(auth) = self.auth_param() {
                query.push(("auth", auth.to_owned()));
            }

            let result: Result<ListCommunitiesResponse> = self
                .executor
                .execute_json(Method::GET, &url, &query, None, self.token.as_ref())
                .await;

            match result {
                Ok(response) => {
                    let fetched = response.communities.len();
                    communities.extend(
                        response
                            .communities
                            .into_iter()
                            .map(|view| view.community.actor_id),
                    );
                    debug!(account = %self.name, page, fetched, total = communities.len(), "fetched community page");
                    if fetched < page_size as usize {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        account = %self.name,
                        page,
                        attempt = failures,
                        error = %e,
                        "failed to fetch community page"
                    );
                    if failures >= self.options.max_page_attempts {
                        return Err(Error::ListingAborted {
                            page,
                            attempts: failures,
                            last_error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            account = %self.name,
            listing = %listing_type,
            communities = communities.len(),
            pages = page,
            "listed communities"
        );
        Ok(communities)
    }

    /// Resolve a canonical actor URL to this instance's community id.
    pub async fn resolve_community(&self, actor_id: &str) -> Result<CommunityRef> {
        let url = self.site.endpoint(RESOLVE_OBJECT_PATH);
        let mut query = vec![("q", actor_id.to_owned())];
        if let Some(auth) = self.auth_param() {
            query.push(("auth", auth.to_owned()));
        }

        debug!(account = %self.name, community = actor_id, "resolving community");

        let wrap = |source: Error| Error::Resolution {
            community: actor_id.to_owned(),
            source: Box::new(source),
        };

        let response: ResolveObjectResponse = self
            .executor
            .execute_json(Method::GET, &url, &query, None, self.token.as_ref())
            .await
            .map_err(wrap)?;

        let view = response.community.ok_or_else(|| {
            wrap(Error::Decode {
                endpoint: url.clone(),
                message: "response has no community object".into(),
            })
        })?;

        Ok(CommunityRef {
            actor_id: actor_id.to_owned(),
            id: view.community.id,
        })
    }

    /// Follow a resolved community.
    ///
    /// Only HTTP 200 counts as success. On success the actor URL is added to
    /// the cached subscription set.
    pub async fn follow(&mut self, community: &CommunityRef) -> Result<FollowOutcome> {
        if self
            .subscriptions
            .as_ref()
            .is_some_and(|set| set.contains(&community.actor_id))
        {
            debug!(account = %self.name, community = %community.actor_id, "already subscribed");
            return Ok(FollowOutcome::AlreadySubscribed);
        }

        if self.options.dry_run {
            info!(
                account = %self.name,
                community = %community.actor_id,
                id = community.id,
                "dry run: would subscribe"
            );
            return Ok(FollowOutcome::Simulated);
        }

        let token = self.token.as_ref().ok_or(Error::NotAuthenticated)?;
        let url = self.site.endpoint(COMMUNITY_FOLLOW_PATH);
        let body = serde_json::to_value(FollowCommunity {
            community_id: community.id,
            follow: true,
            auth: Some(token.expose().as_str()),
        })
        .map_err(|e| Error::Decode {
            endpoint: url.clone(),
            message: e.to_string(),
        })?;

        let response = self
            .executor
            .execute(Method::POST, &url, &[], Some(&body), Some(token))
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(Error::Http {
                endpoint: url,
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let outcome = match response.json::<CommunityResponse>().await {
            Ok(body) if body.community_view.subscribed == Some(SubscribedType::Pending) => {
                FollowOutcome::Pending
            }
            Ok(_) => FollowOutcome::Subscribed,
            Err(e) => {
                debug!(account = %self.name, error = %e, "follow response body not decoded");
                FollowOutcome::Subscribed
            }
        };

        self.record_subscription(&community.actor_id);
        info!(
            account = %self.name,
            community = %community.actor_id,
            id = community.id,
            ?outcome,
            "subscribed"
        );
        Ok(outcome)
    }

    /// Comments of a post, up to `max_depth` levels deep.
    pub async fn comments(
        &self,
        post_id: i64,
        max_depth: u32,
        limit: u32,
    ) -> Result<Vec<CommentView>> {
        let url = self.site.endpoint(COMMENT_LIST_PATH);
        let mut query = vec![
            ("post_id", post_id.to_string()),
            ("max_depth", max_depth.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(auth) = self.auth_param() {
            query.push(("auth", auth.to_owned()));
        }

        let response: GetCommentsResponse = self
            .executor
            .execute_json(Method::GET, &url, &query, None, self.token.as_ref())
            .await?;
        Ok(response.comments)
    }
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSession")
            .field("name", &self.name)
            .field("site", &self.site)
            .field("authenticated", &self.token.is_some())
            .field(
                "cached_subscriptions",
                &self.subscriptions.as_ref().map(HashSet::len),
            )
            .finish()
    }
}
