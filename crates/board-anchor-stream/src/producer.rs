use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use log::warn;
use serde::{Deserialize, Serialize};

/// One RGBA frame handed over by the camera collaborator.
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A capture configuration advertised by the camera hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfigDescriptor {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<u32>,
}

/// The capture configuration the session asks the camera for.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PreferredCameraConfig {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl Default for PreferredCameraConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            framerate: 30,
        }
    }
}

/// Pick the first advertised configuration matching the preference exactly.
pub fn select_preferred_config(
    advertised: &[CameraConfigDescriptor],
    preferred: &PreferredCameraConfig,
) -> Option<CameraConfigDescriptor> {
    advertised
        .iter()
        .find(|config| {
            config.width == preferred.width
                && config.height == preferred.height
                && config.framerate == Some(preferred.framerate)
        })
        .copied()
}

/// Camera collaborator: one-frame-at-a-time acquisition plus configuration
/// control.
pub trait FrameSource: Send {
    /// Hand over the latest frame, or `None` when capture has nothing new.
    fn try_acquire(&mut self) -> Option<CameraFrame>;

    /// Configurations supported by the device.
    fn configurations(&self) -> Vec<CameraConfigDescriptor> {
        Vec::new()
    }

    /// Switch the active capture configuration.
    fn set_configuration(&mut self, _config: CameraConfigDescriptor) {}
}

/// Errors raised while encoding a frame for the wire.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("frame buffer of {got} bytes does not match {width}x{height} RGBA")]
    BufferSize { width: u32, height: u32, got: usize },
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Encode an RGBA frame to the portable PNG byte format sent on the wire.
pub fn encode_frame(frame: &CameraFrame) -> Result<Vec<u8>, EncodeError> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.rgba.len() != expected {
        return Err(EncodeError::BufferSize {
            width: frame.width,
            height: frame.height,
            got: frame.rgba.len(),
        });
    }
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        &frame.rgba,
        frame.width,
        frame.height,
        ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Frames-per-second meter over one-second windows.
#[derive(Debug)]
pub struct ThroughputMeter {
    window_start: Instant,
    sent_in_window: u32,
    last_rate: u32,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            sent_in_window: 0,
            last_rate: 0,
        }
    }

    pub fn record_send(&mut self) {
        self.record_send_at(Instant::now());
    }

    /// Frames sent during the last completed one-second window.
    pub fn frames_per_second(&self) -> u32 {
        self.last_rate
    }

    fn record_send_at(&mut self, now: Instant) {
        self.roll(now);
        self.sent_in_window += 1;
    }

    fn roll(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.last_rate = self.sent_in_window;
            self.sent_in_window = 0;
            self.window_start = now;
        }
    }
}

/// Bounded-cadence frame producer.
///
/// One worker thread acquires at most one frame per tick, encodes it, and
/// hands it to the transport sink. The sequential loop is what guarantees
/// the at-most-one-outstanding-frame policy: the next acquisition starts
/// only after the previous encode and hand-off completed.
pub struct FrameProducer {
    enabled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    rate: Arc<AtomicU32>,
    worker: Option<JoinHandle<()>>,
}

impl FrameProducer {
    /// Spawn the producer thread, initially disabled. The calibration state
    /// machine enables it when streaming begins.
    pub fn spawn(
        source: impl FrameSource + 'static,
        sink: Sender<Vec<u8>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let enabled = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let rate = Arc::new(AtomicU32::new(0));
        let worker = std::thread::Builder::new().name("frame-producer".into()).spawn({
            let enabled = Arc::clone(&enabled);
            let stop = Arc::clone(&stop);
            let rate = Arc::clone(&rate);
            move || produce_loop(source, sink, interval, enabled, stop, rate)
        })?;
        Ok(Self {
            enabled,
            stop,
            rate,
            worker: Some(worker),
        })
    }

    /// Flip streaming. Disabling is observed before the next acquisition; an
    /// in-flight send completes.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Frames sent during the last completed one-second window.
    pub fn frames_per_second(&self) -> u32 {
        self.rate.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("frame producer thread panicked during stop");
            }
        }
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce_loop(
    mut source: impl FrameSource,
    sink: Sender<Vec<u8>>,
    interval: Duration,
    enabled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    rate: Arc<AtomicU32>,
) {
    let mut meter = ThroughputMeter::new();
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        if enabled.load(Ordering::Acquire) {
            match source.try_acquire() {
                Some(frame) => match encode_frame(&frame) {
                    Ok(bytes) => {
                        if sink.send(bytes).is_err() {
                            warn!("frame sink closed; stopping producer");
                            return;
                        }
                        meter.record_send();
                        rate.store(meter.frames_per_second(), Ordering::Release);
                    }
                    Err(err) => warn!("dropping frame: {err}"),
                },
                // Capture had nothing new this tick; skip silently.
                None => {}
            }
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct SolidFrames {
        served: u32,
    }

    impl FrameSource for SolidFrames {
        fn try_acquire(&mut self) -> Option<CameraFrame> {
            // Every other tick has nothing new.
            self.served += 1;
            (self.served % 2 == 1).then(|| CameraFrame {
                width: 4,
                height: 2,
                rgba: vec![200; 4 * 2 * 4],
            })
        }

        fn configurations(&self) -> Vec<CameraConfigDescriptor> {
            vec![
                CameraConfigDescriptor { width: 640, height: 480, framerate: Some(60) },
                CameraConfigDescriptor { width: 1920, height: 1080, framerate: Some(30) },
            ]
        }
    }

    #[test]
    fn encodes_png_payloads() {
        let frame = CameraFrame {
            width: 4,
            height: 2,
            rgba: vec![128; 4 * 2 * 4],
        };
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(&bytes[..8], &b"\x89PNG\r\n\x1a\n"[..]);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let frame = CameraFrame {
            width: 4,
            height: 2,
            rgba: vec![0; 5],
        };
        assert!(matches!(
            encode_frame(&frame),
            Err(EncodeError::BufferSize { got: 5, .. })
        ));
    }

    #[test]
    fn producer_streams_only_while_enabled() {
        let (sink, frames) = mpsc::channel();
        let mut producer =
            FrameProducer::spawn(SolidFrames { served: 0 }, sink, Duration::from_millis(5))
                .unwrap();

        // Disabled: nothing flows.
        std::thread::sleep(Duration::from_millis(40));
        assert!(frames.try_recv().is_err());

        producer.set_enabled(true);
        let first = frames
            .recv_timeout(Duration::from_secs(5))
            .expect("an encoded frame while enabled");
        assert_eq!(&first[..8], &b"\x89PNG\r\n\x1a\n"[..]);

        producer.set_enabled(false);
        producer.stop();
        producer.stop(); // safe to repeat
    }

    #[test]
    fn preferred_config_selection_is_exact() {
        let source = SolidFrames { served: 0 };
        let advertised = source.configurations();
        let chosen =
            select_preferred_config(&advertised, &PreferredCameraConfig::default()).unwrap();
        assert_eq!(chosen.width, 1920);
        assert_eq!(chosen.framerate, Some(30));

        let none = select_preferred_config(
            &advertised,
            &PreferredCameraConfig { width: 100, height: 100, framerate: 10 },
        );
        assert!(none.is_none());
    }

    #[test]
    fn throughput_meter_rolls_whole_windows() {
        let mut meter = ThroughputMeter::new();
        let start = meter.window_start;
        for i in 0..5 {
            meter.record_send_at(start + Duration::from_millis(i * 100));
        }
        assert_eq!(meter.frames_per_second(), 0);
        meter.record_send_at(start + Duration::from_millis(1100));
        assert_eq!(meter.frames_per_second(), 5);
    }
}
