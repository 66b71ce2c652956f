//! Shared harness for hmt-api integration tests
//!
//! Builds the full router over a database with one regular user and one
//! admin, and drives it with `tower::ServiceExt::oneshot`. Most suites use the
//! in-memory database; `on_disk` gives the pooled WAL database the binary runs on.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use hmt_api::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::Path;
use tower::util::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub user_id: Uuid,
    pub user_token: String,
    pub admin_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = hmt_common::db::init_memory_database()
            .await
            .expect("in-memory database");
        Self::with_pool(pool).await
    }

    /// Harness over an on-disk database at `db_path`
    pub async fn on_disk(db_path: &Path) -> Self {
        let pool = hmt_common::db::init_database(db_path)
            .await
            .expect("on-disk database");
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Self {
        let (user, user_token) = hmt_api::db::users::create_user(&pool, "homeowner", false)
            .await
            .expect("create user");
        let (_, admin_token) = hmt_api::db::users::create_user(&pool, "curator", true)
            .await
            .expect("create admin");

        Self {
            app: build_router(AppState::new(pool.clone())),
            pool,
            user_id: user.id,
            user_token,
            admin_token,
        }
    }

    /// Create another non-admin user and return its token
    pub async fn add_user(&self, username: &str) -> String {
        hmt_api::db::users::create_user(&self.pool, username, false)
            .await
            .expect("create user")
            .1
    }

    /// Send a request and return the status with the JSON body (`Null` when not JSON)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&self.user_token), None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&self.user_token), Some(body))
            .await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(&self.user_token), Some(body))
            .await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(&self.admin_token), body).await
    }

    /// Author a template and move it to VERIFIED; returns its id
    pub async fn verified_template(&self, content: Value) -> String {
        let (status, template) = self.admin(Method::POST, "/templates", Some(content)).await;
        assert_eq!(status, StatusCode::CREATED, "create template: {}", template);
        let id = template["id"].as_str().unwrap().to_string();

        let (status, _) = self
            .admin(
                Method::POST,
                &format!("/templates/{}/state", id),
                Some(json!({ "state": "VERIFIED" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    /// Replace a template's content (bumping its version); returns the new version
    pub async fn revise_template(&self, template_id: &str, content: Value) -> i64 {
        let (status, template) = self
            .admin(Method::PUT, &format!("/templates/{}", template_id), Some(content))
            .await;
        assert_eq!(status, StatusCode::OK, "revise template: {}", template);
        template["version"].as_i64().unwrap()
    }

    /// Instantiate a template for the regular user; returns the task id
    pub async fn task_from_template(&self, template_id: &str) -> String {
        let (status, task) = self
            .post("/tasks/from-template", json!({ "templateId": template_id }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "from template: {}", task);
        task["id"].as_str().unwrap().to_string()
    }

    /// Template v3 {"Replace filter", 15 min} and a task synced at v1 whose
    /// title is overridden to "My custom title" and whose time is still 10
    pub async fn filter_example(&self) -> (String, String) {
        let template_id = self
            .verified_template(json!({ "title": "Replace filter", "estimatedTimeMinutes": 10 }))
            .await;
        let task_id = self.task_from_template(&template_id).await;

        let (status, _) = self
            .patch(&format!("/tasks/{}", task_id), json!({ "title": "My custom title" }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let revised = json!({ "title": "Replace filter", "estimatedTimeMinutes": 15 });
        self.revise_template(&template_id, revised.clone()).await;
        let version = self.revise_template(&template_id, revised).await;
        assert_eq!(version, 3);

        (template_id, task_id)
    }
}
