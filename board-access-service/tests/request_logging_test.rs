mod common;

use axum::http::{Method, StatusCode};
use board_access_service::models::AccessType;
use common::TestApp;
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn invitation_token_never_reaches_request_logs() {
    let app = TestApp::spawn();
    let board_id = app.seed_board("roadmap", false, AccessType::InviteOnly);
    let admin = app.board_admin(board_id, "admin@example.com").await;
    let token = app.invite(board_id, &admin, "a@x.com", "member").await;
    let (session, _) = app.register("a@x.com").await;

    let (logs, _guard) = capture();

    let preview = app
        .request(Method::GET, &format!("/invitations/{}", token), None, None)
        .await;
    assert_eq!(preview.status, StatusCode::OK);

    let accepted = app
        .action(json!({
            "action": "accept-invitation",
            "invitation_token": token,
            "session_token": session,
        }))
        .await;
    assert_eq!(accepted.status, StatusCode::OK);

    let output = logs.contents();
    assert!(output.contains("/invitations/:token"), "{}", output);
    assert!(!output.contains(&token));
    assert!(!output.contains(&session));
}

#[tokio::test]
async fn unmatched_paths_are_not_echoed_into_logs() {
    let app = TestApp::spawn();
    let (logs, _guard) = capture();

    let res = app
        .request(Method::GET, "/no-such-route/secret-looking-value", None, None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let output = logs.contents();
    assert!(output.contains("unmatched"), "{}", output);
    assert!(!output.contains("secret-looking-value"));
}
