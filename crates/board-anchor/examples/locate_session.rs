use std::time::Duration;

use board_anchor::core::init_with_level;
use board_anchor::overlay::{MarkerColor, MarkerId, MarkerRole, MarkerScene};
use board_anchor::stream::{CameraFrame, FrameSource};
use board_anchor::track::{SurfaceHit, SurfaceTracker};
use board_anchor::{CalibrationSession, CalibrationState, SessionConfig};
use log::LevelFilter;
use nalgebra::{Point2, Point3};

/// Synthetic flat frame standing in for the camera collaborator.
struct TestPattern;

impl FrameSource for TestPattern {
    fn try_acquire(&mut self) -> Option<CameraFrame> {
        Some(CameraFrame {
            width: 64,
            height: 64,
            rgba: vec![128; 64 * 64 * 4],
        })
    }
}

/// One infinite horizontal plane standing in for the tracking subsystem.
struct Tabletop;

impl SurfaceTracker for Tabletop {
    fn raycast(&self, viewport: Point2<f32>) -> Option<SurfaceHit> {
        Some(SurfaceHit {
            position: Point3::new(viewport.x * 0.01, viewport.y * 0.01, 0.0),
            surface: 1,
        })
    }

    fn tracked_surface_count(&self) -> usize {
        1
    }
}

/// Prints marker operations instead of driving a scene graph.
#[derive(Default)]
struct ConsoleScene {
    next: MarkerId,
}

impl MarkerScene for ConsoleScene {
    fn spawn(&mut self, role: MarkerRole, _color: MarkerColor, position: Point3<f32>) -> MarkerId {
        self.next += 1;
        println!("spawn {role:?} marker {} at {position}", self.next);
        self.next
    }

    fn set_position(&mut self, _id: MarkerId, _position: Point3<f32>) {}

    fn despawn(&mut self, id: MarkerId) {
        println!("despawn marker {id}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_with_level(LevelFilter::Info)?;

    let mut config = SessionConfig::default();
    if let Some(endpoint) = std::env::args().nth(1) {
        config.endpoint = endpoint;
    }
    println!("streaming to {}", config.endpoint);

    let mut session =
        CalibrationSession::connect(config, TestPattern, Tabletop, ConsoleScene::default())?;
    session.toggle_streaming();

    for _ in 0..600 {
        session.tick(1.0 / 60.0);
        if session.state() == CalibrationState::Located {
            session.place_markers("e2", "e4")?;
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    let status = session.status();
    println!(
        "state {:?}, {} img/s, link faults {}, decode faults {}",
        status.state,
        session.frames_per_second(),
        status.link_faults,
        status.decode_faults
    );
    session.close();
    Ok(())
}
