use std::time::Duration;

use rust_photo_gallery::config::GestureConfig;
use rust_photo_gallery::events::{GestureEvent, GestureStatus};
use rust_photo_gallery::tasks::gesture::GestureSession;
use tempfile::tempdir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

fn frame_line(thumb_y: f32, pinched: bool) -> String {
    let index_x = if pinched { 0.52 } else { 0.8 };
    let mut points: Vec<String> = (0..21).map(|_| r#"{"x":0.0,"y":0.0}"#.to_string()).collect();
    points[4] = format!(r#"{{"x":0.5,"y":{thumb_y}}}"#);
    points[8] = format!(r#"{{"x":{index_x},"y":{thumb_y}}}"#);
    format!("{{\"hands\":[[{}]]}}\n", points.join(","))
}

async fn next(rx: &mut mpsc::Receiver<GestureEvent>) -> GestureEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for gesture event")
        .expect("gesture channel closed")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pinch_over_socket_emits_scaled_deltas() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("hands.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let cfg = GestureConfig {
        enabled: true,
        landmark_socket: socket.clone(),
        ..GestureConfig::default()
    };
    let (tx, mut rx) = mpsc::channel(32);
    let root = CancellationToken::new();
    let session = GestureSession::connect(&Handle::current(), &cfg, tx, &root);

    let (mut stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert_eq!(next(&mut rx).await, GestureEvent::Status(GestureStatus::Loading));

    let mut script = String::new();
    script.push_str(&frame_line(0.40, false));
    script.push_str("not json\n");
    script.push_str(&frame_line(0.40, true));
    script.push_str(&frame_line(0.45, true));
    stream.write_all(script.as_bytes()).await.unwrap();

    assert_eq!(next(&mut rx).await, GestureEvent::Status(GestureStatus::Active));
    let mut deltas = Vec::new();
    while deltas.len() < 2 {
        if let GestureEvent::Scroll { delta, .. } = next(&mut rx).await {
            deltas.push(delta);
        }
    }
    assert!(deltas[0].abs() < 1e-6);
    assert!((deltas[1] - 0.4).abs() < 1e-4);

    // Closing the stream ends the session with an error status.
    drop(stream);
    assert_eq!(next(&mut rx).await, GestureEvent::Status(GestureStatus::Error));
    drop(session);
}

#[tokio::test]
async fn missing_socket_reports_error() {
    let dir = tempdir().unwrap();
    let cfg = GestureConfig {
        enabled: true,
        landmark_socket: dir.path().join("absent.sock"),
        ..GestureConfig::default()
    };
    let (tx, mut rx) = mpsc::channel(8);
    let session = GestureSession::connect(&Handle::current(), &cfg, tx, &CancellationToken::new());

    assert_eq!(next(&mut rx).await, GestureEvent::Status(GestureStatus::Loading));
    assert_eq!(next(&mut rx).await, GestureEvent::Status(GestureStatus::Error));
    session.stop().unwrap().await.unwrap();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn root_cancellation_stops_session() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("hands.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let cfg = GestureConfig {
        enabled: true,
        landmark_socket: socket,
        ..GestureConfig::default()
    };
    let (tx, mut rx) = mpsc::channel(8);
    let root = CancellationToken::new();
    let session = GestureSession::connect(&Handle::current(), &cfg, tx, &root);
    let (_stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    assert_eq!(next(&mut rx).await, GestureEvent::Status(GestureStatus::Loading));

    root.cancel();
    let task = session.stop().unwrap();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert!(rx.recv().await.is_none());
}
