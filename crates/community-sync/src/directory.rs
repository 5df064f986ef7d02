//! Destination abstraction for the synchronizer
//!
//! `CommunityDirectory` is the slice of an account session the sync loop
//! needs. `AccountSession` implements it by delegating to its own methods;
//! tests use an in-memory directory instead of a live instance.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use lemmy_client::{AccountSession, CommunityRef, FollowOutcome, Result};

/// Boxed future returned by directory methods.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// An account whose subscriptions can be listed and extended.
///
/// Uses `Pin<Box<dyn Future>>` return types so `&mut dyn CommunityDirectory`
/// works.
pub trait CommunityDirectory: Send {
    /// Account label for logs and reports
    fn name(&self) -> &str;

    /// Current subscription set, keyed by canonical actor URL.
    ///
    /// May be cached; successful follows must show up in later calls.
    fn subscriptions(&mut self) -> DirectoryFuture<'_, HashSet<String>>;

    /// Map a canonical actor URL to this instance's community id.
    fn resolve<'a>(&'a self, actor_id: &'a str) -> DirectoryFuture<'a, CommunityRef>;

    /// Follow a community resolved by `resolve`.
    fn follow<'a>(&'a mut self, community: &'a CommunityRef) -> DirectoryFuture<'a, FollowOutcome>;
}

impl CommunityDirectory for AccountSession {
    fn name(&self) -> &str {
        AccountSession::name(self)
    }

    fn subscriptions(&mut self) -> DirectoryFuture<'_, HashSet<String>> {
        Box::pin(async move { AccountSession::subscriptions(self).await.cloned() })
    }

    fn resolve<'a>(&'a self, actor_id: &'a str) -> DirectoryFuture<'a, CommunityRef> {
        Box::pin(self.resolve_community(actor_id))
    }

    fn follow<'a>(&'a mut self, community: &'a CommunityRef) -> DirectoryFuture<'a, FollowOutcome> {
        Box::pin(AccountSession::follow(self, community))
    }
}
