//! Streaming side of the calibration pipeline: the persistent link to the
//! remote detector, the bounded-cadence frame producer feeding it, and the
//! decoder turning inbound records into labeled corner quads.

mod channel;
mod decode;
mod producer;

pub use channel::{DetectorLink, TransportError, TransportEvent};
pub use decode::{
    BoxRecord, CornerRecord, DecodeError, DecodeOutcome, DetectionDecoder, DetectionMessage,
    PointRecord,
};
pub use producer::{
    encode_frame, select_preferred_config, CameraConfigDescriptor, CameraFrame, EncodeError,
    FrameProducer, FrameSource, PreferredCameraConfig, ThroughputMeter,
};
