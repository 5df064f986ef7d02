//! Community references
//!
//! A community has two identities: the canonical actor URL, which is the same
//! on every instance, and the numeric id, which only means something on the
//! instance that issued it. Cross-account comparisons key on the actor URL;
//! the id is only ever used for the follow call on the instance that resolved
//! it.

use serde::{Deserialize, Serialize};

use crate::constants::COMMUNITY_PATH_MARKER;

/// A community as seen from one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunityRef {
    /// Canonical actor URL, e.g. `https://lemmy.ml/c/rust`
    pub actor_id: String,
    /// Instance-local id on the instance that resolved this reference
    pub id: i64,
}

/// Local name of a community actor URL: the part after `/c/`.
///
/// Falls back to the last non-empty path segment for actor URLs that do not
/// use the `/c/` convention. Returns `None` when nothing usable is left.
pub fn local_name(actor_id: &str) -> Option<&str> {
    let tail = match actor_id.find(COMMUNITY_PATH_MARKER) {
        Some(idx) => &actor_id[idx + COMMUNITY_PATH_MARKER.len()..],
        None => actor_id.rsplit('/').find(|s| !s.is_empty())?,
    };
    let name = tail.split(['/', '?', '#']).next().unwrap_or_default();
    (!name.is_empty()).then_some(name)
}
