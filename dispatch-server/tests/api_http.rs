//! HTTP API tests driven in-process through the full middleware stack

use axum::Router;
use axum::body::Body;
use dispatch_server::auth::UserRole;
use dispatch_server::{Config, ServerState, api::build_app};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use shared::models::BranchScope;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    state: ServerState,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::with_overrides(dir.path().to_string_lossy(), 0).unwrap();
        let state = ServerState::initialize(&config).unwrap();
        Self {
            app: build_app(state.clone()),
            state,
            _dir: dir,
        }
    }

    fn token(&self, user_id: &str, role: UserRole, scope: Option<(&str, &str)>) -> String {
        let scope = scope.map(|(h, b)| BranchScope::new(h, b));
        self.state
            .jwt_service
            .generate_token(user_id, user_id, role, scope.as_ref())
            .unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_staff(&self, admin: &str, id: &str, role: &str, capacity: u32) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/staff",
                Some(admin),
                Some(json!({
                    "id": id,
                    "hotel_id": "h1",
                    "branch_id": "b1",
                    "name": id,
                    "role": role,
                    "max_orders_capacity": capacity,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.send(Method::GET, "/health/detailed", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduler"], "idle");
    assert_eq!(body["storage"]["staff_count"], 0);
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::GET, "/api/staff?hotel_id=h1&branch_id=b1", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1001);

    let (status, _) = app
        .send(
            Method::GET,
            "/api/staff?hotel_id=h1&branch_id=b1",
            Some("not-a-token"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let app = TestApp::new();
    let admin = app.token("root", UserRole::Admin, None);
    let manager = app.token("m-1", UserRole::Manager, Some(("h1", "b1")));

    app.create_staff(&admin, "w-a", "waiter", 1).await;
    app.create_staff(&admin, "w-b", "waiter", 1).await;
    app.create_staff(&admin, "m-1", "manager", 5).await;

    // o1 -> w-a, o2 -> w-b
    for (order_id, expected) in [("o1", "w-a"), ("o2", "w-b")] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/orders",
                Some(&manager),
                Some(json!({"id": order_id, "hotel_id": "h1", "branch_id": "b1", "table_id": "T4"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["assigned_staff_id"], expected);
    }

    // Everyone is full: the order stays pending
    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(&manager),
            Some(json!({"id": "o3", "hotel_id": "h1", "branch_id": "b1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"]["assigned_staff_id"].is_null());

    // The assignee acknowledges; someone else may not
    let waiter_a = app.token("w-a", UserRole::Staff, Some(("h1", "b1")));
    let waiter_b = app.token("w-b", UserRole::Staff, Some(("h1", "b1")));
    let (status, _) = app
        .send(Method::PUT, "/api/orders/o1/viewed", Some(&waiter_b), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .send(Method::PUT, "/api/orders/o1/viewed", Some(&waiter_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["acknowledged_at"].is_i64());

    // Completing o1 frees w-a
    for next in ["preparing", "ready", "served", "completed"] {
        let (status, body) = app
            .send(
                Method::PUT,
                "/api/orders/o1/status",
                Some(&waiter_a),
                Some(json!({"status": next})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    // Retry o3: the pointer sits on w-b, w-a is next and has room again
    let (status, body) = app
        .send(Method::PUT, "/api/orders/o3/assign", Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["assigned_staff_id"], "w-a");

    let (_, body) = app
        .send(Method::GET, "/api/staff/w-a", Some(&manager), None)
        .await;
    assert_eq!(body["data"]["active_order_count"], 1);
}

#[tokio::test]
async fn test_manual_operations_need_manager() {
    let app = TestApp::new();
    let admin = app.token("root", UserRole::Admin, None);
    let manager = app.token("m-1", UserRole::Manager, Some(("h1", "b1")));
    let waiter = app.token("w-a", UserRole::Staff, Some(("h1", "b1")));

    app.create_staff(&admin, "w-a", "waiter", 2).await;
    app.create_staff(&admin, "w-b", "waiter", 2).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(&waiter),
            Some(json!({"id": "o1", "hotel_id": "h1", "branch_id": "b1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/orders/o1/reassign/w-b",
            Some(&waiter),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2002);

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/orders/o1/reassign/w-b",
            Some(&manager),
            Some(json!({"reason": "section change"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["assigned_staff_id"], "w-b");

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/orders/o1/unassign",
            Some(&manager),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["assigned_staff_id"].is_null());

    let (_, body) = app
        .send(Method::GET, "/api/staff/w-b", Some(&manager), None)
        .await;
    assert_eq!(body["data"]["active_order_count"], 0);
}

#[tokio::test]
async fn test_branch_scope_enforced() {
    let app = TestApp::new();
    let admin = app.token("root", UserRole::Admin, None);
    let outsider = app.token("m-9", UserRole::Manager, Some(("h1", "b2")));

    app.create_staff(&admin, "w-a", "waiter", 2).await;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/staff?hotel_id=h1&branch_id=b1",
            Some(&outsider),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2004);

    let (status, _) = app
        .send(Method::DELETE, "/api/staff/w-a", Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_capacity_validation() {
    let app = TestApp::new();
    let admin = app.token("root", UserRole::Admin, None);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/staff",
            Some(&admin),
            Some(json!({
                "hotel_id": "h1",
                "branch_id": "b1",
                "name": "Zero",
                "role": "waiter",
                "max_orders_capacity": 0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_pointer_endpoints() {
    let app = TestApp::new();
    let admin = app.token("root", UserRole::Admin, None);
    let manager = app.token("m-1", UserRole::Manager, Some(("h1", "b1")));

    app.create_staff(&admin, "w-a", "waiter", 5).await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(&manager),
            Some(json!({"id": "o1", "hotel_id": "h1", "branch_id": "b1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::GET, "/api/assignment/pointers", Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["last_staff_id"], "w-a");

    // Platform-wide reset is admin only
    let (status, body) = app
        .send(Method::DELETE, "/api/assignment/pointers", Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2003);

    let (status, body) = app
        .send(
            Method::DELETE,
            "/api/assignment/pointers/h1/b1",
            Some(&manager),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["cleared"], 1);

    let (status, body) = app
        .send(Method::GET, "/api/assignment/schedule", Some(&manager), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phase"], "idle");
}

#[tokio::test]
async fn test_scope_ids_reject_separator() {
    let app = TestApp::new();
    let admin = app.token("root", UserRole::Admin, None);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(&admin),
            Some(json!({"id": "o1", "hotel_id": "h:1", "branch_id": "b"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], 2);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/staff",
            Some(&admin),
            Some(json!({
                "hotel_id": "h",
                "branch_id": "1:b",
                "name": "Colon",
                "role": "waiter",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = app
        .send(Method::DELETE, "/api/assignment/pointers/h1:b1", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
