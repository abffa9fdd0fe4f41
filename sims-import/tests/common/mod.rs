//! Shared test fixtures: in-memory identity provider and store with call
//! counters, plus request helpers for driving the router.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sims_common::AppRole;
use sims_import::models::{AccountId, NewAccount, ProfileRecord, RoleAssignment};
use sims_import::services::{
    BatchImporter, Clock, IdentityProvider, RelationalStore, RoleTableAuthorizer,
};
use sims_import::{build_router, AppState, UpstreamError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "admin-session-token";
pub const GURU_TOKEN: &str = "guru-session-token";
pub const ORPHAN_TOKEN: &str = "no-role-session-token";
pub const FIXED_MILLIS: i64 = 1_730_000_000_000;

pub const DUPLICATE_EMAIL_MESSAGE: &str =
    "A user with this email address has already been registered";

/// Identity provider that remembers created accounts by email
#[derive(Default)]
pub struct FakeIdentity {
    tokens: Mutex<HashMap<String, AccountId>>,
    accounts: Mutex<HashMap<String, AccountId>>,
    panic_emails: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    pub resolve_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn with_token(&self, token: &str) -> AccountId {
        let id = Uuid::new_v4();
        self.tokens.lock().unwrap().insert(token.to_string(), id);
        id
    }

    /// Pretend an account already exists for `email`
    pub fn existing_account(&self, email: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), Uuid::new_v4());
    }

    pub fn panic_on(&self, email: &str) {
        self.panic_emails.lock().unwrap().insert(email.to_string());
    }

    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    pub fn account_for(&self, email: &str) -> Option<AccountId> {
        self.accounts.lock().unwrap().get(email).copied()
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn resolve_token(&self, token: &str) -> Result<Option<AccountId>, UpstreamError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(UpstreamError::Network("connection refused".into()));
        }
        Ok(self.tokens.lock().unwrap().get(token).copied())
    }

    async fn create_confirmed_account(
        &self,
        account: NewAccount<'_>,
    ) -> Result<AccountId, UpstreamError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.panic_emails.lock().unwrap().contains(account.email) {
            panic!("identity adapter blew up for {}", account.email);
        }

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(account.email) {
            return Err(UpstreamError::Rejected {
                status: 422,
                message: DUPLICATE_EMAIL_MESSAGE.to_string(),
            });
        }
        let id = Uuid::new_v4();
        accounts.insert(account.email.to_string(), id);
        Ok(id)
    }
}

/// Store that keeps inserted rows in memory
#[derive(Default)]
pub struct FakeStore {
    roles: Mutex<HashMap<AccountId, AppRole>>,
    pub assignments: Mutex<Vec<RoleAssignment>>,
    pub profiles: Mutex<Vec<ProfileRecord>>,
    fail_role_inserts: AtomicBool,
    fail_profile_tables: Mutex<HashSet<&'static str>>,
    pub write_calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_role(&self, account: AccountId, role: AppRole) {
        self.roles.lock().unwrap().insert(account, role);
    }

    pub fn fail_role_inserts(&self, fail: bool) {
        self.fail_role_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profiles_in(&self, table: &'static str) {
        self.fail_profile_tables.lock().unwrap().insert(table);
    }

    pub fn writes(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> Vec<ProfileRecord> {
        self.profiles.lock().unwrap().clone()
    }

    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.assignments.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelationalStore for FakeStore {
    async fn role_of(&self, account: AccountId) -> Result<Option<AppRole>, UpstreamError> {
        Ok(self.roles.lock().unwrap().get(&account).copied())
    }

    async fn insert_role_assignment(
        &self,
        assignment: &RoleAssignment,
    ) -> Result<(), UpstreamError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_role_inserts.load(Ordering::SeqCst) {
            return Err(UpstreamError::Database(
                "permission denied for table user_roles".into(),
            ));
        }
        self.roles
            .lock()
            .unwrap()
            .insert(assignment.user_id, assignment.role);
        self.assignments.lock().unwrap().push(assignment.clone());
        Ok(())
    }

    async fn insert_profile(&self, profile: &ProfileRecord) -> Result<(), UpstreamError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile_tables.lock().unwrap().contains(profile.table()) {
            return Err(UpstreamError::Database(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                profile.table()
            )));
        }
        self.profiles.lock().unwrap().push(profile.clone());
        Ok(())
    }
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

pub struct Harness {
    pub identity: Arc<FakeIdentity>,
    pub store: Arc<FakeStore>,
    pub app: Router,
}

/// Router over fakes with an admin caller, a guru caller and a caller
/// without a role
pub fn harness() -> Harness {
    let identity = Arc::new(FakeIdentity::default());
    let store = Arc::new(FakeStore::default());

    let admin = identity.with_token(ADMIN_TOKEN);
    store.with_role(admin, AppRole::Admin);
    let guru = identity.with_token(GURU_TOKEN);
    store.with_role(guru, AppRole::Guru);
    identity.with_token(ORPHAN_TOKEN);

    let authorizer = RoleTableAuthorizer::new(identity.clone(), store.clone());
    let importer = BatchImporter::new(identity.clone(), store.clone())
        .with_clock(Arc::new(FixedClock(FIXED_MILLIS)));
    let app = build_router(AppState::from_parts(Arc::new(authorizer), importer));

    Harness {
        identity,
        store,
        app,
    }
}

pub fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    post_raw(uri, token, "application/json", body.to_string())
}

pub fn post_raw(
    uri: &str,
    token: Option<&str>,
    content_type: &str,
    body: String,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Should parse JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Should be UTF-8")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body")
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}
