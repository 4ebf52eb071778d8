use std::collections::BTreeMap;
use std::net::TcpListener;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nalgebra::{Point2, Point3, Vector3};

use board_anchor::core::ManualOffset;
use board_anchor::overlay::{MarkerColor, MarkerId, MarkerRole, MarkerScene};
use board_anchor::stream::{CameraFrame, FrameSource, TransportEvent};
use board_anchor::track::{SurfaceHit, SurfaceTracker};
use board_anchor::{CalibrationSession, CalibrationState, SessionConfig};

/// One horizontal tabletop plane: a viewport point (x, y) lands at world
/// (x, y, 0) centimeters, as long as it falls inside the tracked extent.
struct Tabletop {
    reach: f32,
}

impl Tabletop {
    fn unbounded() -> Self {
        Self { reach: f32::MAX }
    }
}

impl SurfaceTracker for Tabletop {
    fn raycast(&self, viewport: Point2<f32>) -> Option<SurfaceHit> {
        (viewport.x <= self.reach).then_some(SurfaceHit {
            position: Point3::new(viewport.x * 0.01, viewport.y * 0.01, 0.0),
            surface: 1,
        })
    }

    fn tracked_surface_count(&self) -> usize {
        1
    }
}

#[derive(Default)]
struct SceneLog {
    next: MarkerId,
    live: BTreeMap<MarkerId, Point3<f32>>,
    spawned: Vec<(MarkerId, MarkerRole, Point3<f32>)>,
    despawned: Vec<MarkerId>,
}

impl MarkerScene for SceneLog {
    fn spawn(&mut self, role: MarkerRole, _color: MarkerColor, position: Point3<f32>) -> MarkerId {
        self.next += 1;
        self.spawned.push((self.next, role, position));
        self.live.insert(self.next, position);
        self.next
    }

    fn set_position(&mut self, id: MarkerId, position: Point3<f32>) {
        *self.live.get_mut(&id).expect("live marker") = position;
    }

    fn despawn(&mut self, id: MarkerId) {
        self.live.remove(&id).expect("live marker");
        self.despawned.push(id);
    }
}

fn corners_payload(points: &[(f32, f32)]) -> TransportEvent {
    let corners: Vec<String> = points
        .iter()
        .map(|(x, y)| format!(r#"{{"center_x":{x},"center_y":{y}}}"#))
        .collect();
    TransportEvent::Message(format!(r#"{{"corners":[{}]}}"#, corners.join(",")).into_bytes())
}

fn square_detection() -> TransportEvent {
    corners_payload(&[(200.0, 100.0), (100.0, 200.0), (100.0, 100.0), (200.0, 200.0)])
}

fn session_with_feed(
    surfaces: Tabletop,
) -> (CalibrationSession<Tabletop, SceneLog>, Sender<TransportEvent>) {
    let (feed, inbound) = mpsc::channel();
    let session =
        CalibrationSession::new(SessionConfig::default(), surfaces, SceneLog::default(), inbound);
    (session, feed)
}

#[test]
fn detections_are_ignored_while_idle() {
    let (mut session, feed) = session_with_feed(Tabletop::unbounded());
    feed.send(square_detection()).unwrap();
    session.tick(0.016);
    assert_eq!(session.state(), CalibrationState::Idle);
    assert!(session.latest_pose().snapshot().is_none());
}

#[test]
fn pipeline_locates_and_places_markers() {
    let (mut session, feed) = session_with_feed(Tabletop::unbounded());
    session.toggle_streaming();
    assert_eq!(session.state(), CalibrationState::Streaming);

    feed.send(square_detection()).unwrap();
    session.tick(0.016);
    assert_eq!(session.state(), CalibrationState::Located);

    let pose = session.latest_pose().snapshot().expect("derived pose");
    assert!((pose.center.x - 1.5).abs() < 1e-4);
    assert!((pose.center.y - 1.5).abs() < 1e-4);
    assert!((pose.size - 1.0).abs() < 1e-4);

    session.place_markers("a1", "h8").unwrap();
    let scene = session.scene();
    assert_eq!(scene.live.len(), 2);
    let (_, _, from_pos) = scene.spawned[0];
    let (_, _, to_pos) = scene.spawned[1];
    let mid = (from_pos.coords + to_pos.coords) / 2.0;
    assert!((mid.x - pose.center.x).abs() < 1e-4);
    assert!((mid.y - pose.center.y).abs() < 1e-4);
}

#[test]
fn placement_before_location_is_rejected() {
    let (mut session, _feed) = session_with_feed(Tabletop::unbounded());
    session.toggle_streaming();
    assert!(session.place_markers("a1", "h8").is_err());
    assert!(session.scene().live.is_empty());
}

#[test]
fn invalid_address_is_rejected_without_markers() {
    let (mut session, feed) = session_with_feed(Tabletop::unbounded());
    session.toggle_streaming();
    feed.send(square_detection()).unwrap();
    session.tick(0.016);

    assert!(session.place_markers("i1", "a2").is_err());
    assert!(session.scene().live.is_empty());
}

#[test]
fn manual_offset_rides_baseline_and_rederivation_replaces_drift() {
    let (mut session, feed) = session_with_feed(Tabletop::unbounded());
    session.toggle_streaming();
    feed.send(square_detection()).unwrap();
    session.tick(0.016);

    let baseline = session.baseline_pose().expect("baseline");
    session.place_markers("e2", "e4").unwrap();
    let placed_ids: Vec<MarkerId> = session.scene().live.keys().copied().collect();

    session.set_manual_offset(ManualOffset {
        translation: Vector3::new(0.5, 0.0, 0.0),
        ..ManualOffset::default()
    });
    let adjusted = session.latest_pose().snapshot().unwrap();
    assert!((adjusted.center.x - (baseline.center.x + 0.5)).abs() < 1e-4);

    // Markers were torn down and rebuilt against the adjusted pose.
    let scene = session.scene();
    assert_eq!(scene.despawned, placed_ids);
    assert_eq!(scene.live.len(), 2);

    // A fresh detection one world unit to the right becomes the new
    // baseline; the old drift does not accumulate on top of it.
    feed.send(corners_payload(&[
        (300.0, 100.0),
        (200.0, 200.0),
        (200.0, 100.0),
        (300.0, 200.0),
    ]))
    .unwrap();
    session.tick(0.016);
    let rederived = session.latest_pose().snapshot().unwrap();
    assert!((rederived.center.x - (baseline.center.x + 1.0 + 0.5)).abs() < 1e-4);
}

#[test]
fn partial_projection_holds_last_pose() {
    // Corners past viewport x = 150 fall off the tracked surface.
    let (mut session, feed) = session_with_feed(Tabletop { reach: 150.0 });
    session.toggle_streaming();

    feed.send(square_detection()).unwrap();
    session.tick(0.016);
    assert_eq!(session.state(), CalibrationState::Locating);
    assert!(session.latest_pose().snapshot().is_none());

    // A quad fully inside the tracked extent locates the board.
    feed.send(corners_payload(&[
        (140.0, 100.0),
        (40.0, 200.0),
        (40.0, 100.0),
        (140.0, 200.0),
    ]))
    .unwrap();
    session.tick(0.016);
    assert_eq!(session.state(), CalibrationState::Located);
    let located = session.latest_pose().snapshot().unwrap();

    // Back to a partially off-surface quad: the pose holds.
    feed.send(square_detection()).unwrap();
    session.tick(0.016);
    assert_eq!(session.latest_pose().snapshot().unwrap(), located);
}

#[test]
fn faults_surface_as_status_not_state() {
    let (mut session, feed) = session_with_feed(Tabletop::unbounded());
    session.toggle_streaming();
    feed.send(square_detection()).unwrap();
    session.tick(0.016);
    let located = session.latest_pose().snapshot().unwrap();

    feed.send(TransportEvent::Message(b"not json at all".to_vec()))
        .unwrap();
    feed.send(corners_payload(&[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]))
        .unwrap();
    feed.send(TransportEvent::Error("send failed".into())).unwrap();
    session.tick(0.016);

    let status = session.status();
    assert_eq!(status.state, CalibrationState::Located);
    assert_eq!(status.decode_faults, 1);
    assert_eq!(status.link_faults, 1);
    assert_eq!(session.latest_pose().snapshot().unwrap(), located);
}

#[test]
fn streaming_toggle_in_located_keeps_board_and_overlays() {
    let (mut session, feed) = session_with_feed(Tabletop::unbounded());
    session.toggle_streaming();
    feed.send(square_detection()).unwrap();
    session.tick(0.016);
    session.place_markers("d4", "d5").unwrap();

    session.toggle_streaming();
    assert_eq!(session.state(), CalibrationState::Located);
    assert_eq!(session.scene().live.len(), 2);
    assert!(session.latest_pose().snapshot().is_some());
}

// --- end to end over a loopback websocket ---

/// Loopback detector: answers every streamed frame with the same four
/// corner detections.
fn spawn_detector_stub() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let endpoint = format!("ws://{}", listener.local_addr().expect("local addr"));
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut socket = tungstenite::accept(stream).expect("ws accept");
        let reply = r#"{"corners":[{"center_x":100.0,"center_y":100.0},{"center_x":200.0,"center_y":100.0},{"center_x":100.0,"center_y":200.0},{"center_x":200.0,"center_y":200.0}]}"#;
        loop {
            match socket.read() {
                Ok(tungstenite::Message::Binary(frame)) => {
                    // Streamed frames are PNG images.
                    assert_eq!(&frame[..8], &b"\x89PNG\r\n\x1a\n"[..]);
                    socket
                        .send(tungstenite::Message::Text(reply.into()))
                        .expect("stub send");
                }
                Ok(tungstenite::Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    });
    (endpoint, handle)
}

struct TestPattern;

impl FrameSource for TestPattern {
    fn try_acquire(&mut self) -> Option<CameraFrame> {
        Some(CameraFrame {
            width: 8,
            height: 8,
            rgba: vec![180; 8 * 8 * 4],
        })
    }
}

#[test]
fn end_to_end_locates_over_the_wire() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (endpoint, stub) = spawn_detector_stub();

    let config = SessionConfig {
        endpoint,
        frame_interval: 0.01,
        ..SessionConfig::default()
    };
    let mut session =
        CalibrationSession::connect(config, TestPattern, Tabletop::unbounded(), SceneLog::default())
            .expect("connect");

    session.toggle_streaming();
    let deadline = Instant::now() + Duration::from_secs(10);
    while session.state() != CalibrationState::Located {
        assert!(Instant::now() < deadline, "never located the board");
        session.tick(0.016);
        std::thread::sleep(Duration::from_millis(5));
    }

    session.place_markers("a1", "h8").expect("markers");
    assert_eq!(session.scene().live.len(), 2);

    session.close();
    stub.join().expect("stub thread");
}
