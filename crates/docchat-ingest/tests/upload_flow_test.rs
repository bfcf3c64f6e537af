//! Folder upload against a mock HTTP server.

use std::sync::Arc;

use docchat_client::{ClientConfig, HttpApi};
use docchat_core::{IgnoreRules, KnowledgeApi, UploadStatus};
use docchat_ingest::{UploadConfig, UploadEvent, UploadOrchestrator};
use docchat_session::{SessionState, StateSync};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_store_routes(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/stores"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stores": [{"id": "fileSearchStores/lib", "name": "My Library", "file_count": 2}],
            "active_store_id": "fileSearchStores/lib"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/store/fileSearchStores/lib/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"uri": "files/1", "name": "notes.md"},
                {"uri": "files/2", "name": "report.txt"}
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/store/fileSearchStores/lib/suggestions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"questions": []})))
        .mount(server)
        .await;
}

fn orchestrator(server: &MockServer) -> UploadOrchestrator {
    let api: Arc<dyn KnowledgeApi> =
        Arc::new(HttpApi::new(ClientConfig::default().with_base_url(server.uri())).unwrap());
    let sync = StateSync::new(api, Arc::new(SessionState::default()));
    UploadOrchestrator::new(sync, IgnoreRules::default(), UploadConfig::default())
}

#[tokio::test]
async fn test_folder_upload_skips_ignored_and_isolates_failure() {
    let server = MockServer::start().await;
    mount_store_routes(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("filename=\"broken.pdf\""))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "indexing failed"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success", "store_id": "fileSearchStores/lib"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("sub")).unwrap();
    std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    std::fs::write(root.join("notes.md"), "# notes").unwrap();
    std::fs::write(root.join("sub/report.txt"), "quarterly report").unwrap();
    std::fs::write(root.join("sub/broken.pdf"), "%PDF").unwrap();
    std::fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
    std::fs::write(root.join(".DS_Store"), "").unwrap();

    let orch = orchestrator(&server);
    let mut events = orch.events();
    let report = orch.upload_tree(root).await.unwrap();

    assert_eq!(report.tasks.len(), 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.ignored, 1);

    let broken = report
        .tasks
        .iter()
        .find(|t| t.name == "broken.pdf")
        .unwrap();
    assert_eq!(broken.status, UploadStatus::Error);
    assert_eq!(broken.error.as_deref(), Some("indexing failed"));

    // Empty suggestions fall back to the built-in set.
    assert_eq!(report.suggestions.len(), 3);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let UploadEvent::BatchFinished { succeeded, failed } = event {
            finished = Some((succeeded, failed));
        }
    }
    assert_eq!(finished, Some((2, 1)));
}

#[tokio::test]
async fn test_upload_without_store_creates_default() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/stores"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stores": []})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/stores"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success", "id": "fileSearchStores/lib", "name": "My Library"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/stores/active"))
        .and(body_string_contains("fileSearchStores/lib"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_store_routes(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.md");
    std::fs::write(&file, "# notes").unwrap();

    let report = orchestrator(&server)
        .upload_files(vec![docchat_ingest::FileSource::from_path(&file)])
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
}
