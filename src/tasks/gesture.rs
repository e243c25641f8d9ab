//! Hand-gesture scrolling.
//!
//! A hand tracker publishes normalized landmark frames; a pinch between
//! thumb and index finger followed by vertical thumb movement becomes a
//! stream of scroll deltas. The adapter only talks to the viewer through
//! [`GestureEvent`]s and never touches gallery state itself.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GestureConfig;
use crate::events::{GestureEvent, GestureStatus};

pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One detection result: zero or more hands, each a list of landmarks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandFrame {
    #[serde(default)]
    pub hands: Vec<Vec<Landmark>>,
}

impl HandFrame {
    pub fn first_hand(&self) -> Option<&[Landmark]> {
        self.hands.first().map(Vec::as_slice)
    }

    /// Parse one NDJSON line. Anything unreadable counts as "no hand".
    pub fn parse_line(line: &str) -> Self {
        match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "malformed landmark frame");
                HandFrame::default()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GestureError {
    #[error("failed to connect to hand tracker at {path}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("hand tracker stream failed")]
    Stream(#[from] std::io::Error),
}

/// Pinch detection and per-sample delta extraction.
#[derive(Debug, Clone)]
pub struct PinchTracker {
    threshold: f32,
    sensitivity: f32,
    reference: Option<f32>,
}

impl PinchTracker {
    pub fn new(threshold: f32, sensitivity: f32) -> Self {
        Self {
            threshold,
            sensitivity,
            reference: None,
        }
    }

    pub fn from_config(cfg: &GestureConfig) -> Self {
        Self::new(cfg.pinch_threshold, cfg.sensitivity)
    }

    pub fn is_pinching(&self) -> bool {
        self.reference.is_some()
    }

    /// Feed one frame's first hand. Returns the scaled delta while pinching.
    pub fn observe(&mut self, hand: Option<&[Landmark]>) -> Option<f32> {
        let tips = hand
            .and_then(|h| Some((*h.get(THUMB_TIP)?, *h.get(INDEX_TIP)?)))
            .filter(|(thumb, index)| thumb.is_finite() && index.is_finite());
        let Some((thumb, index)) = tips else {
            self.reference = None;
            return None;
        };

        let distance = (thumb.x - index.x).hypot(thumb.y - index.y);
        let pinching = distance < self.threshold;
        if !pinching {
            if self.reference.take().is_some() {
                debug!("pinch released");
            }
            return None;
        }

        let reference = *self.reference.get_or_insert_with(|| {
            debug!(y = thumb.y, "pinch started");
            thumb.y
        });
        self.reference = Some(thumb.y);
        Some((thumb.y - reference) * self.sensitivity)
    }
}

/// Source of landmark frames. `Ok(None)` means the stream has ended.
pub trait HandTracker: Send {
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<HandFrame>, GestureError>> + Send;
}

/// Newline-delimited JSON frames read from a Unix domain socket.
pub struct SocketTracker {
    lines: Lines<BufReader<UnixStream>>,
}

impl SocketTracker {
    pub async fn connect(path: &Path) -> Result<Self, GestureError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| GestureError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        info!(socket = %path.display(), "connected to hand tracker");
        Ok(Self {
            lines: BufReader::new(stream).lines(),
        })
    }
}

impl HandTracker for SocketTracker {
    async fn next_frame(&mut self) -> Result<Option<HandFrame>, GestureError> {
        let line = self.lines.next_line().await?;
        Ok(line.map(|l| HandFrame::parse_line(&l)))
    }
}

async fn emit(events: &Sender<GestureEvent>, event: GestureEvent) -> bool {
    events.send(event).await.is_ok()
}

/// Acquire a tracker and translate its frames until cancelled or failed.
/// The tracker is dropped on every exit path.
pub async fn run<T, A>(
    acquire: A,
    mut pinch: PinchTracker,
    events: Sender<GestureEvent>,
    cancel: CancellationToken,
) where
    T: HandTracker,
    A: Future<Output = Result<T, GestureError>>,
{
    if !emit(&events, GestureEvent::Status(GestureStatus::Loading)).await {
        return;
    }

    let mut tracker = select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("gesture session cancelled during acquisition");
            return;
        }
        res = acquire => match res {
            Ok(tracker) => tracker,
            Err(err) => {
                warn!(error = %err, "hand tracker unavailable");
                emit(&events, GestureEvent::Status(GestureStatus::Error)).await;
                return;
            }
        },
    };

    let mut active = false;
    loop {
        let frame = select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("gesture session stopped");
                break;
            }
            frame = tracker.next_frame() => frame,
        };

        match frame {
            Ok(Some(frame)) => {
                if !active {
                    active = true;
                    info!("hand tracking active");
                    if !emit(&events, GestureEvent::Status(GestureStatus::Active)).await {
                        break;
                    }
                }
                if let Some(delta) = pinch.observe(frame.first_hand()) {
                    let event = GestureEvent::Scroll {
                        delta,
                        at: Instant::now(),
                    };
                    if !emit(&events, event).await {
                        break;
                    }
                }
            }
            Ok(None) => {
                warn!("hand tracker stream ended");
                emit(&events, GestureEvent::Status(GestureStatus::Error)).await;
                break;
            }
            Err(err) => {
                warn!(error = %err, "hand tracker stream failed");
                emit(&events, GestureEvent::Status(GestureStatus::Error)).await;
                break;
            }
        }
    }
    drop(tracker);
}

/// A running gesture adapter. Stopping or dropping it cancels the task.
pub struct GestureSession {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GestureSession {
    pub fn spawn<T, A>(
        runtime: &Handle,
        acquire: A,
        pinch: PinchTracker,
        events: Sender<GestureEvent>,
        parent: &CancellationToken,
    ) -> Self
    where
        T: HandTracker + 'static,
        A: Future<Output = Result<T, GestureError>> + Send + 'static,
    {
        let cancel = parent.child_token();
        let task = runtime.spawn(run(acquire, pinch, events, cancel.clone()));
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Start a session against the configured landmark socket.
    pub fn connect(
        runtime: &Handle,
        cfg: &GestureConfig,
        events: Sender<GestureEvent>,
        parent: &CancellationToken,
    ) -> Self {
        let path = cfg.landmark_socket.clone();
        Self::spawn(
            runtime,
            async move { SocketTracker::connect(&path).await },
            PinchTracker::from_config(cfg),
            events,
            parent,
        )
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the session and hand back its task for joining.
    pub fn stop(mut self) -> Option<JoinHandle<()>> {
        self.cancel.cancel();
        self.task.take()
    }
}

impl Drop for GestureSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    fn hand(thumb: (f32, f32), index: (f32, f32)) -> Vec<Landmark> {
        let mut points = vec![Landmark::default(); 21];
        points[THUMB_TIP] = Landmark {
            x: thumb.0,
            y: thumb.1,
            z: 0.0,
        };
        points[INDEX_TIP] = Landmark {
            x: index.0,
            y: index.1,
            z: 0.0,
        };
        points
    }

    fn pinched(y: f32) -> Vec<Landmark> {
        hand((0.5, y), (0.52, y))
    }

    fn open(y: f32) -> Vec<Landmark> {
        hand((0.3, y), (0.6, y))
    }

    struct FakeTracker {
        frames: VecDeque<Result<Option<HandFrame>, GestureError>>,
        released: Arc<AtomicBool>,
        hang_when_empty: bool,
    }

    impl Drop for FakeTracker {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl HandTracker for FakeTracker {
        async fn next_frame(&mut self) -> Result<Option<HandFrame>, GestureError> {
            match self.frames.pop_front() {
                Some(frame) => frame,
                None if self.hang_when_empty => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    fn frame(hand: Vec<Landmark>) -> Result<Option<HandFrame>, GestureError> {
        Ok(Some(HandFrame { hands: vec![hand] }))
    }

    fn drain(rx: &mut mpsc::Receiver<GestureEvent>) -> Vec<GestureEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn deltas(events: &[GestureEvent]) -> Vec<f32> {
        events
            .iter()
            .filter_map(|e| match e {
                GestureEvent::Scroll { delta, .. } => Some(*delta),
                GestureEvent::Status(_) => None,
            })
            .collect()
    }

    #[test]
    fn pinch_emits_per_sample_deltas() {
        let mut pinch = PinchTracker::new(0.1, 8.0);
        assert_eq!(pinch.observe(Some(&open(0.5))), None);
        assert_eq!(pinch.observe(Some(&pinched(0.5))), Some(0.0));
        assert!(pinch.is_pinching());
        let d = pinch.observe(Some(&pinched(0.55))).unwrap();
        assert!((d - 0.4).abs() < 1e-5);
        let d = pinch.observe(Some(&pinched(0.50))).unwrap();
        assert!((d + 0.4).abs() < 1e-5);
    }

    #[test]
    fn release_clears_reference() {
        let mut pinch = PinchTracker::new(0.1, 8.0);
        pinch.observe(Some(&pinched(0.2)));
        assert_eq!(pinch.observe(Some(&open(0.9))), None);
        assert!(!pinch.is_pinching());
        // Re-latches at the new position instead of jumping.
        assert_eq!(pinch.observe(Some(&pinched(0.9))), Some(0.0));
    }

    #[test]
    fn missing_hand_or_short_landmarks_reset_pinch() {
        let mut pinch = PinchTracker::new(0.1, 8.0);
        pinch.observe(Some(&pinched(0.2)));
        assert_eq!(pinch.observe(None), None);
        assert!(!pinch.is_pinching());

        pinch.observe(Some(&pinched(0.2)));
        let short = vec![Landmark::default(); 5];
        assert_eq!(pinch.observe(Some(&short)), None);
        assert!(!pinch.is_pinching());
    }

    #[test]
    fn out_of_range_landmarks_count_as_no_hand() {
        let mut points = vec![r#"{"x":0.5,"y":0.5}"#; 21];
        points[THUMB_TIP] = r#"{"x":0.5,"y":1e39}"#;
        points[INDEX_TIP] = r#"{"x":0.5,"y":1e39}"#;
        let frame = HandFrame::parse_line(&format!(r#"{{"hands":[[{}]]}}"#, points.join(",")));
        let hand = frame.first_hand().unwrap();
        assert!(!hand[THUMB_TIP].is_finite());

        let mut pinch = PinchTracker::new(0.1, 8.0);
        pinch.observe(Some(&pinched(0.2)));
        assert_eq!(pinch.observe(Some(hand)), None);
        assert!(!pinch.is_pinching());
    }

    #[test]
    fn malformed_lines_parse_as_no_hand() {
        assert!(HandFrame::parse_line("{not json").first_hand().is_none());
        assert!(HandFrame::parse_line("{}").first_hand().is_none());
        let frame = HandFrame::parse_line(r#"{"hands":[[{"x":0.1,"y":0.2}]]}"#);
        assert_eq!(frame.first_hand().map(<[Landmark]>::len), Some(1));
    }

    #[tokio::test]
    async fn reports_active_then_scroll_then_error_on_end() {
        let released = Arc::new(AtomicBool::new(false));
        let tracker = FakeTracker {
            frames: VecDeque::from([
                frame(open(0.5)),
                frame(pinched(0.5)),
                frame(pinched(0.6)),
            ]),
            released: released.clone(),
            hang_when_empty: false,
        };
        let (tx, mut rx) = mpsc::channel(16);
        run(
            async { Ok(tracker) },
            PinchTracker::new(0.1, 8.0),
            tx,
            CancellationToken::new(),
        )
        .await;

        let events = drain(&mut rx);
        assert_eq!(events[0], GestureEvent::Status(GestureStatus::Loading));
        assert_eq!(events[1], GestureEvent::Status(GestureStatus::Active));
        assert_eq!(
            events.last(),
            Some(&GestureEvent::Status(GestureStatus::Error))
        );
        let d = deltas(&events);
        assert_eq!(d.len(), 2);
        assert!((d[1] - 0.8).abs() < 1e-5);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn acquisition_failure_reports_error_without_deltas() {
        let (tx, mut rx) = mpsc::channel(16);
        let acquire = async {
            Err::<FakeTracker, _>(GestureError::Connect {
                path: PathBuf::from("/nope"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        };
        run(acquire, PinchTracker::new(0.1, 8.0), tx, CancellationToken::new()).await;
        assert_eq!(
            drain(&mut rx),
            [
                GestureEvent::Status(GestureStatus::Loading),
                GestureEvent::Status(GestureStatus::Error)
            ]
        );
    }

    #[tokio::test]
    async fn stopping_session_releases_tracker() {
        let released = Arc::new(AtomicBool::new(false));
        let tracker = FakeTracker {
            frames: VecDeque::from([frame(open(0.5))]),
            released: released.clone(),
            hang_when_empty: true,
        };
        let (tx, mut rx) = mpsc::channel(16);
        let root = CancellationToken::new();
        let session = GestureSession::spawn(
            &Handle::current(),
            async { Ok(tracker) },
            PinchTracker::new(0.1, 8.0),
            tx,
            &root,
        );

        assert_eq!(
            rx.recv().await,
            Some(GestureEvent::Status(GestureStatus::Loading))
        );
        assert_eq!(
            rx.recv().await,
            Some(GestureEvent::Status(GestureStatus::Active))
        );
        assert!(!session.is_finished());

        session.stop().unwrap().await.unwrap();
        assert!(released.load(Ordering::SeqCst));
        assert!(!root.is_cancelled());
    }
}
