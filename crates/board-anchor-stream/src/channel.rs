use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// How long one timed read slice blocks the service thread before it goes
/// back to flushing the outbound queue.
const READ_SLICE: Duration = Duration::from_millis(50);

/// Errors surfaced by the detector link.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to detector at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("failed to spawn the link service thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Inbound transport notifications, delivered in receipt order.
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete message from the detector.
    Message(Vec<u8>),
    /// A transport fault. The link stays up best-effort; faults never cross
    /// thread boundaries as panics.
    Error(String),
    /// The link is gone, by peer close, fatal fault, or local teardown.
    Closed,
}

/// Duplex, message-oriented channel to the remote detection service.
///
/// A single service thread owns the socket and alternates between flushing
/// queued outbound frames and a timed read, so senders never block on the
/// network. Inbound messages and faults arrive on an event receiver in
/// receipt order.
pub struct DetectorLink {
    outbound: Sender<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
    service: Option<JoinHandle<()>>,
}

impl DetectorLink {
    /// Establish the websocket connection, returning the link and its event
    /// receiver. Refusal or timeout is an error for the caller to report and
    /// retry, never a crash.
    pub fn connect(endpoint: &str) -> Result<(Self, Receiver<TransportEvent>), TransportError> {
        let (socket, response) =
            tungstenite::connect(endpoint).map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_owned(),
                source: Box::new(source),
            })?;
        info!(
            "connected to detector at {endpoint} (handshake {})",
            response.status()
        );

        // The timed read slice is what lets one thread serve both directions.
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            let _ = stream.set_read_timeout(Some(READ_SLICE));
        }

        let (outbound, outbound_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let service = std::thread::Builder::new()
            .name("detector-link".into())
            .spawn({
                let shutdown = Arc::clone(&shutdown);
                move || service_loop(socket, outbound_rx, event_tx, shutdown)
            })?;

        let link = Self {
            outbound,
            shutdown,
            service: Some(service),
        };
        Ok((link, event_rx))
    }

    /// Queue one outbound frame, fire-and-forget. After the link drops, the
    /// frame is discarded and the fault shows up on the event stream instead.
    pub fn send(&self, payload: Vec<u8>) {
        let _ = self.outbound.send(payload);
    }

    /// Clonable sender feeding the outbound queue, for the frame producer.
    pub fn frame_sink(&self) -> Sender<Vec<u8>> {
        self.outbound.clone()
    }

    /// Request close and wait for the service thread. Idempotent and safe
    /// from teardown even mid-send.
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.service.take() {
            if handle.join().is_err() {
                warn!("detector link service thread panicked during close");
            }
        }
    }
}

impl Drop for DetectorLink {
    fn drop(&mut self) {
        self.close();
    }
}

fn service_loop(
    mut socket: WebSocket<MaybeTlsStream<TcpStream>>,
    outbound: Receiver<Vec<u8>>,
    events: Sender<TransportEvent>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Acquire) {
            let _ = socket.close(None);
            let _ = events.send(TransportEvent::Closed);
            return;
        }

        // Flush everything queued before going back to the socket.
        loop {
            match outbound.try_recv() {
                Ok(frame) => {
                    if let Err(err) = socket.send(Message::Binary(frame.into())) {
                        let _ = events.send(TransportEvent::Error(err.to_string()));
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = events.send(TransportEvent::Closed);
                    return;
                }
            }
        }

        match socket.read() {
            Ok(Message::Binary(payload)) => {
                let _ = events.send(TransportEvent::Message(payload.into()));
            }
            Ok(Message::Text(text)) => {
                let _ = events.send(TransportEvent::Message(text.as_bytes().to_vec()));
            }
            Ok(Message::Close(_)) => {
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            // Pings and pongs are answered by the protocol layer.
            Ok(_) => {}
            // The timed read slice elapsed with nothing inbound.
            Err(tungstenite::Error::Io(err)) if read_slice_elapsed(&err) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            Err(err) => {
                let _ = events.send(TransportEvent::Error(err.to_string()));
                let _ = events.send(TransportEvent::Closed);
                return;
            }
        }
    }
}

fn read_slice_elapsed(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
