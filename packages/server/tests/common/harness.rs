//! Test harness: the real router wired to a scripted messaging client and a
//! temporary workspace root.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pair_core::domains::pairing::WorkspaceRoot;
use pair_core::kernel::test_dependencies::{fast_pairing_settings, MockMessagingClient};
use pair_core::kernel::ServerDeps;
use pair_core::server::build_app;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestHarness {
    pub mock: MockMessagingClient,
    pub deps: ServerDeps,
    app: Router,
    root: TempDir,
}

impl TestHarness {
    pub fn new(mock: MockMessagingClient) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let root = tempfile::tempdir().expect("tempdir");
        let mock = mock.with_workspace_probe(root.path());
        let deps = ServerDeps::new(
            Arc::new(mock.clone()),
            WorkspaceRoot::new(root.path()),
            fast_pairing_settings(),
        );
        let app = build_app(deps.clone());

        Self {
            mock,
            deps,
            app,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Number of session directories currently under the workspace root
    pub fn workspace_count(&self) -> usize {
        std::fs::read_dir(self.root.path())
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Wait until every background session has finished and released its workspace.
    pub async fn wait_for_cleanup(&self) {
        let settled = tokio::time::timeout(Duration::from_secs(5), async {
            while self.deps.active_sessions.count() > 0 || self.workspace_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(
            settled.is_ok(),
            "sessions still running: active={}, workspaces={}",
            self.deps.active_sessions.count(),
            self.workspace_count()
        );
    }
}
