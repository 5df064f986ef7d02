//! In-process Lemmy instance for downstream tests
//!
//! Serves login, community listing, object resolution and follow over plain
//! HTTP on 127.0.0.1. Subscriptions are real state: a follow adds the
//! community to the set later listings return, so repeated syncs observe
//! their own effects.
//!
//! Conventions:
//! - the password [`REJECTED_PASSWORD`] fails login, anything else succeeds
//! - actor URLs containing [`UNRESOLVABLE_MARKER`] answer 404 on resolve
//! - community ids are assigned in first-seen order starting at 1

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::constants::{
    API_BASE, COMMUNITY_FOLLOW_PATH, COMMUNITY_LIST_PATH, LOGIN_PATH, PAGE_SIZE,
    RESOLVE_OBJECT_PATH,
};
use crate::site::SiteIdentity;

pub const REJECTED_PASSWORD: &str = "wrong";
pub const UNRESOLVABLE_MARKER: &str = "/c/missing";

#[derive(Default)]
struct MockState {
    subscribed: Mutex<BTreeSet<String>>,
    known: Mutex<Vec<String>>,
    followed: Mutex<Vec<String>>,
    login_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    /// Instance-local id for an actor URL, assigned on first sight.
    fn id_for(&self, actor_id: &str) -> i64 {
        let mut known = lock(&self.known);
        let index = match known.iter().position(|k| k == actor_id) {
            Some(index) => index,
            None => {
                known.push(actor_id.to_owned());
                known.len() - 1
            }
        };
        index as i64 + 1
    }

    fn actor_for(&self, id: i64) -> Option<String> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        lock(&self.known).get(index).cloned()
    }

    fn view(&self, actor_id: &str, subscribed: bool) -> serde_json::Value {
        let name = actor_id.rsplit('/').next().unwrap_or(actor_id);
        serde_json::json!({
            "community": {"id": self.id_for(actor_id), "name": name, "actor_id": actor_id},
            "subscribed": if subscribed { "Subscribed" } else { "NotSubscribed" },
        })
    }
}

/// A running mock instance. Clones share state.
#[derive(Clone)]
pub struct MockInstance {
    base_url: String,
    state: Arc<MockState>,
}

impl MockInstance {
    /// Bind an ephemeral port and serve with `subscribed` as the account's
    /// initial subscriptions.
    pub async fn start(subscribed: &[&str]) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockState::default());
        lock(&state.subscribed).extend(subscribed.iter().map(|s| (*s).to_owned()));

        let app = axum::Router::new()
            .route(&format!("/{API_BASE}/{LOGIN_PATH}"), post(login))
            .route(&format!("/{API_BASE}/{COMMUNITY_LIST_PATH}"), get(list))
            .route(&format!("/{API_BASE}/{RESOLVE_OBJECT_PATH}"), get(resolve))
            .route(&format!("/{API_BASE}/{COMMUNITY_FOLLOW_PATH}"), post(follow))
            .with_state(Arc::clone(&state));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "mock instance stopped");
            }
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
        })
    }

    /// `http://127.0.0.1:<port>`, suitable as a config `site` value.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn site(&self) -> SiteIdentity {
        SiteIdentity::plain_http(&self.base_url)
    }

    /// Current subscriptions, including any added by follows.
    pub fn subscribed(&self) -> BTreeSet<String> {
        lock(&self.state.subscribed).clone()
    }

    /// Actor URLs followed so far, in request order.
    pub fn followed(&self) -> Vec<String> {
        lock(&self.state.followed).clone()
    }

    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }
}

async fn login(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] == REJECTED_PASSWORD {
        return (StatusCode::BAD_REQUEST, r#"{"error":"incorrect_login"}"#).into_response();
    }
    Json(serde_json::json!({"jwt": "mock-jwt"})).into_response()
}

async fn list(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    let page: usize = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let limit: usize = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(PAGE_SIZE as usize);

    let subscribed = lock(&state.subscribed).clone();
    let communities: Vec<_> = subscribed
        .iter()
        .skip(page.saturating_sub(1) * limit)
        .take(limit)
        .map(|actor_id| state.view(actor_id, true))
        .collect();
    Json(serde_json::json!({ "communities": communities })).into_response()
}

async fn resolve(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(q) = params.get("q") else {
        return (StatusCode::BAD_REQUEST, r#"{"error":"no_q"}"#).into_response();
    };
    if q.contains(UNRESOLVABLE_MARKER) {
        return (StatusCode::NOT_FOUND, r#"{"error":"couldnt_find_object"}"#).into_response();
    }
    let subscribed = lock(&state.subscribed).contains(q);
    Json(serde_json::json!({ "community": state.view(q, subscribed) })).into_response()
}

async fn follow(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let Some(actor_id) = body["community_id"]
        .as_i64()
        .and_then(|id| state.actor_for(id))
    else {
        return (StatusCode::NOT_FOUND, r#"{"error":"couldnt_find_community"}"#).into_response();
    };

    let follow = body["follow"].as_bool().unwrap_or(true);
    if follow {
        lock(&state.subscribed).insert(actor_id.clone());
        lock(&state.followed).push(actor_id.clone());
    } else {
        lock(&state.subscribed).remove(&actor_id);
    }
    Json(serde_json::json!({ "community_view": state.view(&actor_id, follow) })).into_response()
}
