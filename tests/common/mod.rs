#![allow(dead_code)]

use axum::body::Body;
use http::{Method, Request, StatusCode};
use partyserver::db;
use partyserver::middleware::auth::{hash_password, GUEST_TOKEN_HEADER};
use partyserver::models::admin::Admin;
use partyserver::models::guest::{Guest, JoinParty};
use partyserver::models::invite::InviteCode;
use partyserver::models::item_type::{CreateItemType, ItemType};
use partyserver::models::party::{CreateParty, Party};
use partyserver::routes;
use partyserver::state::AppState;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tower::ServiceExt;

/// An admin created for testing, bundling the record with its raw token.
pub struct TestAdmin {
    pub admin: Admin,
    pub token: String,
}

impl TestAdmin {
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// A guest admitted for testing, with the capability token issued at join.
pub struct TestGuest {
    pub guest: Guest,
    pub token: String,
}

/// Test server backed by its own SQLite file, so concurrent connections share
/// one database the way they do in production. Each instance is isolated and
/// removes its files on drop.
pub struct TestServer {
    pub state: AppState,
    db_path: PathBuf,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_options(0, true).await
    }

    pub async fn with_options(rate_limit_per_minute: u32, allow_registration: bool) -> Self {
        let db_path = std::env::temp_dir().join(format!(
            "partyserver-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        let url = format!("sqlite://{}", db_path.display());

        let pool = db::create_pool(&url, 5)
            .await
            .expect("failed to create test pool");

        let state = AppState::new(pool, rate_limit_per_minute, allow_registration);
        Self { state, db_path }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    /// Send a request through the router and decode the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        (status, parse_body(response).await)
    }

    /// Create an admin with a bearer token.
    pub async fn create_admin(&self, username: &str) -> TestAdmin {
        let hash = hash_password("correct horse battery").expect("failed to hash password");
        let admin = db::admins::create_admin(self.pool(), username, &hash)
            .await
            .expect("failed to create test admin");
        let token = db::admins::create_token(self.pool(), &admin.id)
            .await
            .expect("failed to create admin token");
        TestAdmin { admin, token }
    }

    /// Create a potluck party starting tomorrow, with its invite code.
    pub async fn create_party(&self, admin: &TestAdmin, title: &str) -> (Party, InviteCode) {
        let starts_at = chrono::Utc::now() + chrono::Duration::days(1);
        db::parties::create_party(
            self.pool(),
            &admin.admin.id,
            &CreateParty {
                title: Some(title.to_string()),
                starts_at: Some(starts_at.to_rfc3339()),
                is_potluck: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("failed to create test party")
    }

    pub async fn admit_guest(&self, party_id: &str, name: &str) -> TestGuest {
        self.admit_guest_sized(party_id, name, 1).await
    }

    pub async fn admit_guest_sized(&self, party_id: &str, name: &str, party_size: i64) -> TestGuest {
        let joined = db::guests::admit_guest(
            self.pool(),
            party_id,
            &JoinParty {
                display_name: Some(name.to_string()),
                party_size: Some(party_size),
                ..Default::default()
            },
        )
        .await
        .expect("failed to admit test guest");
        TestGuest {
            guest: joined.guest,
            token: joined.token,
        }
    }

    pub async fn define_item_type(&self, party_id: &str, name: &str, capacity: i64) -> ItemType {
        db::item_types::define_item_type(
            self.pool(),
            party_id,
            &CreateItemType {
                name: Some(name.to_string()),
                capacity: Some(capacity),
                sort_order: None,
            },
        )
        .await
        .expect("failed to define test item type")
    }

    /// Count selections on an item type straight from the table.
    pub async fn selection_count(&self, item_type_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM selections WHERE item_type_id = ?")
            .bind(item_type_id)
            .fetch_one(self.pool())
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.db_path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

// ---------------------------------------------------------------------------
// Request builder helpers
// ---------------------------------------------------------------------------

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Build an unauthenticated request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build an admin request with no body.
pub fn admin_request(method: Method, uri: &str, admin: &TestAdmin) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", admin.auth_header())
        .body(Body::empty())
        .unwrap()
}

/// Build an admin request with a JSON body.
pub fn admin_json_request(
    method: Method,
    uri: &str,
    admin: &TestAdmin,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", admin.auth_header())
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build a guest request with no body.
pub fn guest_request(method: Method, uri: &str, guest: &TestGuest) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(GUEST_TOKEN_HEADER, &guest.token)
        .body(Body::empty())
        .unwrap()
}

/// Build a guest request with a JSON body.
pub fn guest_json_request(
    method: Method,
    uri: &str,
    guest: &TestGuest,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(GUEST_TOKEN_HEADER, &guest.token)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`. Non-JSON bodies come
/// back as a JSON string.
pub async fn parse_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
