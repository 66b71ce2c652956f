//! Concurrent reconciliation on the on-disk WAL database
//!
//! The in-memory harness has a single connection, so these suites run against
//! the pooled database the binary opens to exercise writers racing each other.

mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use helpers::TestApp;
use hmt_api::services::template_sync::{
    apply_template_updates, pending_updates, ApplyRequest, ApplyResult,
};
use hmt_common::{OverridePolicy, TaskField};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

/// Verified template at v2 and `count` tasks created from it at v1
async fn tasks_behind_template(app: &TestApp, count: usize) -> Vec<String> {
    let template_id = app
        .verified_template(json!({ "title": "Test smoke detectors", "estimatedTimeMinutes": 5 }))
        .await;

    let mut task_ids = Vec::with_capacity(count);
    for _ in 0..count {
        task_ids.push(app.task_from_template(&template_id).await);
    }

    let version = app
        .revise_template(
            &template_id,
            json!({ "title": "Test smoke detectors", "estimatedTimeMinutes": 10 }),
        )
        .await;
    assert_eq!(version, 2);

    task_ids
}

fn apply_all(task_id: &str) -> ApplyRequest {
    ApplyRequest {
        user_task_id: task_id.to_string(),
        fields: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_applies_and_edits_all_succeed() {
    let dir = TempDir::new().unwrap();
    let app = Arc::new(TestApp::on_disk(&dir.path().join("hmt.db")).await);
    let task_ids = tasks_behind_template(&app, 30).await;
    let (to_apply, to_edit) = task_ids.split_at(20);

    let mut applies = Vec::new();
    for task_id in to_apply {
        let pool = app.pool.clone();
        let user_id = app.user_id;
        let request = apply_all(task_id);
        applies.push(tokio::spawn(async move {
            apply_template_updates(&pool, user_id, &[request], OverridePolicy::RespectOverrides)
                .await
        }));
    }

    let mut edits = Vec::new();
    for (i, task_id) in to_edit.iter().enumerate() {
        let app = Arc::clone(&app);
        let uri = format!("/tasks/{}", task_id);
        edits.push(tokio::spawn(async move {
            app.patch(&uri, json!({ "description": format!("Hallway unit {}", i) }))
                .await
                .0
        }));
    }

    for (handle, task_id) in applies.into_iter().zip(to_apply) {
        let results = handle.await.unwrap().expect("apply must not fail under contention");
        assert_eq!(
            results,
            vec![ApplyResult::Applied {
                user_task_id: task_id.clone(),
                applied_fields: TaskField::ALL.to_vec(),
                new_version: 2,
            }]
        );
    }
    for handle in edits {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    // Only the edited tasks are still behind the template
    let pending = pending_updates(&app.pool, app.user_id, None).await.unwrap();
    let mut pending_ids: Vec<String> = pending.iter().map(|p| p.user_task_id.to_string()).collect();
    let mut expected: Vec<String> = to_edit.to_vec();
    pending_ids.sort();
    expected.sort();
    assert_eq!(pending_ids, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_applies_to_one_task_last_writer_wins() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::on_disk(&dir.path().join("hmt.db")).await;
    let task_id = tasks_behind_template(&app, 1).await.remove(0);

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let pool = app.pool.clone();
            let user_id = app.user_id;
            let request = apply_all(&task_id);
            tokio::spawn(async move {
                apply_template_updates(&pool, user_id, &[request], OverridePolicy::ForceAll).await
            })
        })
        .collect();

    for handle in handles {
        let results = handle.await.unwrap().expect("apply must not fail under contention");
        assert!(matches!(results[0], ApplyResult::Applied { new_version: 2, .. }));
    }

    let (status, task) = app.get(&format!("/tasks/{}", task_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["sourceTemplateVersion"], 2);
    assert_eq!(task["estimatedTimeMinutes"], 10);

    // Every apply is audited, whichever order they committed in
    let (_, body) = app
        .get(&format!("/tasks/{}/template-history", task_id))
        .await;
    assert_eq!(body["history"].as_array().unwrap().len(), 12);

    assert!(pending_updates(&app.pool, app.user_id, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_pending_updates_on_disk_pairs_task_with_template() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::on_disk(&dir.path().join("hmt.db")).await;
    let task_id = tasks_behind_template(&app, 1).await.remove(0);

    let pending = pending_updates(&app.pool, app.user_id, None).await.unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].user_task_id, Uuid::parse_str(&task_id).unwrap());
    assert_eq!(pending[0].current_version, 1);
    assert_eq!(pending[0].latest_version, 2);
    assert_eq!(
        pending[0].changed_fields,
        vec![TaskField::EstimatedTimeMinutes]
    );
    assert!(!pending[0].is_overridden);
}
