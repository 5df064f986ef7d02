//! Subscription synchronizer
//!
//! Computes the communities a destination is missing relative to a source
//! set and follows each one. Item failures (resolve or follow) are recorded
//! in the report and never stop the batch; only failing to list the
//! destination's own subscriptions aborts the sync.

use std::collections::HashSet;

use lemmy_client::FollowOutcome;
use serde::Serialize;
use tracing::{info, warn};

use crate::directory::CommunityDirectory;
use crate::error::Result;
use crate::exclusion::Exclusions;

/// Per-sync switches.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub exclusions: Exclusions,
    /// Resolve candidates but never call follow.
    ///
    /// Resolution still runs, so a candidate the destination cannot resolve
    /// is counted in `failed`, not `simulated`. `simulated` is therefore the
    /// number of non-excluded candidates that would actually be followed.
    pub dry_run: bool,
}

/// One community that could not be followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub community: String,
    pub error: String,
}

/// Outcome of one sync run against one destination.
///
/// `proposed` counts `source - destination` before exclusions; every proposed
/// community ends up in exactly one of the other counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub destination: String,
    pub proposed: usize,
    pub excluded: usize,
    pub succeeded: usize,
    pub already_subscribed: usize,
    pub failed: usize,
    pub simulated: usize,
    pub excluded_communities: Vec<String>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// Whether every candidate that was not excluded went through without error.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record_failure(&mut self, community: &str, error: String) {
        self.failed += 1;
        self.failures.push(SyncFailure {
            community: community.to_owned(),
            error,
        });
    }
}

/// Communities in `source` that `destination` does not follow.
///
/// Sorted so that logs and follow order are stable between runs; the result
/// of a sync does not depend on it.
pub fn missing(source: &HashSet<String>, destination: &HashSet<String>) -> Vec<String> {
    let mut missing: Vec<String> = source.difference(destination).cloned().collect();
    missing.sort();
    missing
}

/// Follow on `destination` every community of `source` it is missing.
pub async fn sync<D>(
    source: &HashSet<String>,
    destination: &mut D,
    options: &SyncOptions,
) -> Result<SyncReport>
where
    D: CommunityDirectory + ?Sized,
{
    let current = destination.subscriptions().await?;
    let candidates = missing(source, &current);

    let mut report = SyncReport {
        destination: destination.name().to_owned(),
        proposed: candidates.len(),
        ..Default::default()
    };

    info!(
        account = %report.destination,
        source = source.len(),
        destination = current.len(),
        missing = candidates.len(),
        dry_run = options.dry_run,
        "computed missing communities"
    );

    for actor_id in candidates {
        if options.exclusions.excludes(&actor_id) {
            info!(account = %report.destination, community = %actor_id, "excluded, skipping");
            report.excluded += 1;
            report.excluded_communities.push(actor_id);
            continue;
        }

        let community = match destination.resolve(&actor_id).await {
            Ok(community) => community,
            Err(e) => {
                warn!(account = %report.destination, community = %actor_id, error = %e, "resolve failed, skipping");
                report.record_failure(&actor_id, e.to_string());
                continue;
            }
        };

        if options.dry_run {
            info!(
                account = %report.destination,
                community = %actor_id,
                id = community.id,
                "dry run: would subscribe"
            );
            report.simulated += 1;
            continue;
        }

        match destination.follow(&community).await {
            Ok(FollowOutcome::Subscribed | FollowOutcome::Pending) => report.succeeded += 1,
            Ok(FollowOutcome::AlreadySubscribed) => report.already_subscribed += 1,
            Ok(FollowOutcome::Simulated) => report.simulated += 1,
            Err(e) => {
                warn!(account = %report.destination, community = %actor_id, error = %e, "follow failed");
                report.record_failure(&actor_id, e.to_string());
            }
        }
    }

    info!(
        account = %report.destination,
        proposed = report.proposed,
        excluded = report.excluded,
        succeeded = report.succeeded,
        already_subscribed = report.already_subscribed,
        failed = report.failed,
        simulated = report.simulated,
        "sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use lemmy_client::{CommunityRef, Error as ClientError};

    use crate::directory::DirectoryFuture;

    /// In-memory destination: `known` maps actor URLs to local ids; anything
    /// else fails to resolve. Follows succeed unless listed in `reject`.
    #[derive(Default)]
    struct FakeDirectory {
        subscribed: HashSet<String>,
        known: HashMap<String, i64>,
        reject: HashSet<String>,
        fail_listing: bool,
        resolved: std::sync::Mutex<Vec<String>>,
        followed: Vec<String>,
    }

    impl FakeDirectory {
        fn with(subscribed: &[&str], known: &[&str]) -> Self {
            Self {
                subscribed: subscribed.iter().map(|s| s.to_string()).collect(),
                known: known
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (s.to_string(), i as i64 + 1))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl CommunityDirectory for FakeDirectory {
        fn name(&self) -> &str {
            "fake"
        }

        fn subscriptions(&mut self) -> DirectoryFuture<'_, HashSet<String>> {
            Box::pin(async move {
                if self.fail_listing {
                    return Err(ClientError::ListingAborted {
                        page: 1,
                        attempts: 5,
                        last_error: "500".into(),
                    });
                }
                Ok(self.subscribed.clone())
            })
        }

        fn resolve<'a>(&'a self, actor_id: &'a str) -> DirectoryFuture<'a, CommunityRef> {
            self.resolved.lock().unwrap().push(actor_id.to_owned());
            let result = match self.known.get(actor_id) {
                Some(id) => Ok(CommunityRef {
                    actor_id: actor_id.to_owned(),
                    id: *id,
                }),
                None => Err(ClientError::Resolution {
                    community: actor_id.to_owned(),
                    source: Box::new(ClientError::Http {
                        endpoint: "resolve_object".into(),
                        status: 404,
                        body: "couldnt_find_object".into(),
                    }),
                }),
            };
            Box::pin(async move { result })
        }

        fn follow<'a>(
            &'a mut self,
            community: &'a CommunityRef,
        ) -> DirectoryFuture<'a, FollowOutcome> {
            Box::pin(async move {
                self.followed.push(community.actor_id.clone());
                if self.reject.contains(&community.actor_id) {
                    return Err(ClientError::Http {
                        endpoint: "community/follow".into(),
                        status: 400,
                        body: "banned".into(),
                    });
                }
                self.subscribed.insert(community.actor_id.clone());
                Ok(FollowOutcome::Subscribed)
            })
        }
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const A: &str = "https://lemmy.ml/c/a";
    const B: &str = "https://lemmy.ml/c/b";
    const C: &str = "https://lemmy.ml/c/c";

    #[test]
    fn missing_is_set_difference() {
        let a = set(&[A, B, C]);
        let b = set(&[B]);
        assert_eq!(missing(&a, &b), vec![A.to_owned(), C.to_owned()]);
        assert!(missing(&a, &a).is_empty());
        assert_eq!(missing(&a, &HashSet::new()).len(), 3);
        assert!(missing(&HashSet::new(), &a).is_empty());
    }

    #[tokio::test]
    async fn excluded_communities_are_never_followed() {
        let mut dest = FakeDirectory::with(&[B], &[A, B, C]);
        let options = SyncOptions {
            exclusions: Exclusions::parse("c"),
            dry_run: false,
        };

        let report = sync(&set(&[A, B, C]), &mut dest, &options).await.unwrap();

        assert_eq!(report.proposed, 2);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.excluded_communities, vec![C.to_owned()]);
        assert_eq!(report.succeeded, 1);
        assert_eq!(*dest.resolved.lock().unwrap(), vec![A.to_owned()]);
        assert_eq!(dest.followed, vec![A.to_owned()]);
    }

    #[tokio::test]
    async fn resolve_failure_does_not_abort_batch() {
        // A is unknown on the destination, B resolves
        let mut dest = FakeDirectory::with(&[], &[B]);

        let report = sync(&set(&[A, B]), &mut dest, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].community, A);
        assert!(report.failures[0].error.contains("couldnt_find_object"));
        assert_eq!(dest.followed, vec![B.to_owned()]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn follow_failure_is_recorded_and_batch_continues() {
        let mut dest = FakeDirectory::with(&[], &[A, B]);
        dest.reject.insert(A.to_owned());

        let report = sync(&set(&[A, B]), &mut dest, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(dest.followed.len(), 2);
        assert!(!dest.subscribed.contains(A));
    }

    #[tokio::test]
    async fn second_sync_follows_nothing() {
        let mut dest = FakeDirectory::with(&[], &[A, B, C]);
        let source = set(&[A, B, C]);

        let first = sync(&source, &mut dest, &SyncOptions::default()).await.unwrap();
        assert_eq!(first.succeeded, 3);

        let second = sync(&source, &mut dest, &SyncOptions::default()).await.unwrap();
        assert_eq!(second.proposed, 0);
        assert_eq!(second.succeeded, 0);
        assert_eq!(dest.followed.len(), 3);
    }

    #[tokio::test]
    async fn dry_run_simulates_without_following() {
        let mut dest = FakeDirectory::with(&[B], &[A, B, C]);
        let options = SyncOptions {
            exclusions: Exclusions::parse("c"),
            dry_run: true,
        };

        let report = sync(&set(&[A, B, C]), &mut dest, &options).await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.simulated, 1);
        assert!(dest.followed.is_empty());
        assert_eq!(dest.subscribed, set(&[B]));
    }

    #[tokio::test]
    async fn dry_run_counts_unresolvable_as_failed() {
        // A is unknown on the destination, B resolves
        let mut dest = FakeDirectory::with(&[], &[B]);
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = sync(&set(&[A, B]), &mut dest, &options).await.unwrap();

        assert_eq!(report.proposed, 2);
        assert_eq!(report.excluded, 0);
        assert_eq!(report.simulated, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].community, A);
        assert!(dest.followed.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_aborts_sync() {
        let mut dest = FakeDirectory::with(&[], &[A]);
        dest.fail_listing = true;

        let err = sync(&set(&[A]), &mut dest, &SyncOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("listing aborted"));
        assert!(dest.followed.is_empty());
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let mut fake = FakeDirectory::with(&[], &[A]);
        let dest: &mut dyn CommunityDirectory = &mut fake;

        let report = sync(&set(&[A]), dest, &SyncOptions::default()).await.unwrap();
        assert_eq!(report.destination, "fake");
        assert_eq!(report.succeeded, 1);
    }

    #[test]
    fn report_serializes_for_summaries() {
        let report = SyncReport {
            destination: "alt".into(),
            proposed: 2,
            failed: 1,
            failures: vec![SyncFailure {
                community: A.into(),
                error: "boom".into(),
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["destination"], "alt");
        assert_eq!(json["failures"][0]["community"], A);
    }
}
