//! Annex-B stream receiver
//!
//! Connects to the mirroring endpoint, reads the byte stream in bounded
//! chunks, runs it through a [`NalFramer`] and emits every completed unit on
//! an event channel, together with connection state changes and errors.
//!
//! Nothing is raised to the caller: `connect` returns a success flag and all
//! other outcomes arrive as [`ReceiverEvent`]s.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ConnectError, Result};
use crate::media::{NalFramer, NalUnit};
use crate::session::ConnectionState;
use crate::stats::ReceiverStats;

use super::config::ReceiverConfig;

/// Events from the receiver, delivered in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// A complete NAL unit, start code included
    Frame(NalUnit),

    /// Connection came up or went down
    ConnectionChanged {
        connected: bool,
        message: Option<String>,
    },

    /// Connection or stream failure
    Error(String),
}

/// Requests a running receive loop to stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Interrupt the receive loop, including a read that is blocked waiting
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Why the read loop ended
enum Exit {
    /// Peer closed the stream
    EndOfStream,
    /// Stop was requested
    Interrupted,
    /// Read failed
    Failed(std::io::Error),
    /// Nobody is listening for events anymore
    ConsumerGone,
}

/// Annex-B stream receiver
///
/// # Example
/// ```no_run
/// use annexb_mirror::client::{NalReceiver, ReceiverConfig, ReceiverEvent};
///
/// # async fn example() {
/// let (mut receiver, mut events) = NalReceiver::new(ReceiverConfig::default());
///
/// if !receiver.connect().await {
///     return;
/// }
/// receiver.start();
///
/// while let Some(event) = events.recv().await {
///     if let ReceiverEvent::Frame(nal) = event {
///         println!("NAL type {:?}, {} bytes", nal.nal_type(), nal.len());
///     }
/// }
/// # }
/// ```
pub struct NalReceiver {
    config: ReceiverConfig,
    event_tx: mpsc::Sender<ReceiverEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    shutdown: Arc<watch::Sender<bool>>,
    stream: Option<TcpStream>,
    task: Option<JoinHandle<ReceiverStats>>,
    last_stats: Option<ReceiverStats>,
}

impl NalReceiver {
    /// Create a new receiver.
    ///
    /// Returns the receiver and the event channel it reports on.
    pub fn new(config: ReceiverConfig) -> (Self, mpsc::Receiver<ReceiverEvent>) {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);

        let receiver = Self {
            config,
            event_tx: tx,
            state: Arc::new(state),
            shutdown: Arc::new(shutdown),
            stream: None,
            task: None,
            last_stats: None,
        };

        (receiver, rx)
    }

    /// Connect to the configured endpoint.
    ///
    /// Only the connect attempt is bounded by `connect_timeout`; reads on the
    /// established connection wait indefinitely. Reports `ConnectionChanged`
    /// (and `Error` on failure) and returns whether the connection is up.
    /// Lifecycle events never wait for the consumer; with a full channel they
    /// are dropped and only the state watch reflects the change.
    pub async fn connect(&mut self) -> bool {
        if self.stream.is_some() || self.task.is_some() {
            tracing::warn!(endpoint = %self.config.endpoint(), "Already connected");
            return true;
        }

        let endpoint = self.config.endpoint();
        tracing::info!(endpoint = %endpoint, "Connecting");
        self.state.send_replace(ConnectionState::Connecting);

        match open_stream(&self.config).await {
            Ok(stream) => {
                self.shutdown.send_replace(false);
                self.stream = Some(stream);
                self.state.send_replace(ConnectionState::Connected);
                tracing::info!(endpoint = %endpoint, "Connected");
                self.emit(ReceiverEvent::ConnectionChanged {
                    connected: true,
                    message: None,
                });
                true
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(endpoint = %endpoint, error = %e, "Connection failed");
                self.state.send_replace(ConnectionState::Error(message.clone()));
                self.emit(ReceiverEvent::ConnectionChanged {
                    connected: false,
                    message: Some(message.clone()),
                });
                self.emit(ReceiverEvent::Error(message));
                false
            }
        }
    }

    /// Run the receive loop on the current task until the stream ends, fails
    /// or is stopped through a [`StopHandle`].
    pub async fn run(&mut self) -> ReceiverStats {
        let Some(stream) = self.stream.take() else {
            tracing::warn!("Not connected, cannot start receiving");
            return ReceiverStats::new();
        };

        let stats = receive_loop(
            stream,
            self.config.read_buffer_size,
            self.event_tx.clone(),
            Arc::clone(&self.state),
            self.shutdown.subscribe(),
        )
        .await;
        self.last_stats = Some(stats.clone());
        stats
    }

    /// Spawn the receive loop on a background task.
    ///
    /// Must be called from within a tokio runtime. Returns false when there
    /// is no connection to read from.
    pub fn start(&mut self) -> bool {
        let Some(stream) = self.stream.take() else {
            tracing::warn!("Not connected, cannot start receiving");
            return false;
        };

        self.task = Some(tokio::spawn(receive_loop(
            stream,
            self.config.read_buffer_size,
            self.event_tx.clone(),
            Arc::clone(&self.state),
            self.shutdown.subscribe(),
        )));
        true
    }

    /// Stop the loop, close the connection and report `Disconnected`.
    ///
    /// A blocked read is interrupted immediately. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.shutdown.send_replace(true);

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(stats) => self.last_stats = Some(stats),
                Err(e) => tracing::warn!(error = %e, "Receive task ended abnormally"),
            }
        }

        if self.stream.take().is_some() {
            tracing::debug!("Closed connection that was never read");
        }

        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!(endpoint = %self.config.endpoint(), "Disconnected");
        self.emit(ReceiverEvent::ConnectionChanged {
            connected: false,
            message: Some("Disconnected".to_string()),
        });
    }

    /// Handle for stopping a loop started with [`run`](Self::run)
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Statistics of the most recently finished receive loop
    pub fn last_stats(&self) -> Option<&ReceiverStats> {
        self.last_stats.as_ref()
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Never waits on the consumer; a full channel loses the event
    fn emit(&self, event: ReceiverEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(event = ?event, "Event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Event receiver dropped");
            }
        }
    }
}

impl Drop for NalReceiver {
    fn drop(&mut self) {
        // The loop sees the signal (or the dropped sender) and closes the socket
        self.shutdown.send_replace(true);
    }
}

async fn open_stream(config: &ReceiverConfig) -> Result<TcpStream> {
    let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(ConnectError::Io)?
        .next()
        .ok_or_else(|| ConnectError::Resolve(config.host.clone()))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(ConnectError::Io)?;
    socket.set_keepalive(config.keepalive).map_err(ConnectError::Io)?;

    let stream = match tokio::time::timeout(config.connect_timeout, socket.connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(ConnectError::Io(e).into()),
        Err(_) => return Err(ConnectError::Timeout(config.connect_timeout).into()),
    };

    if config.tcp_nodelay {
        stream.set_nodelay(true)?;
    }

    Ok(stream)
}

async fn receive_loop(
    mut stream: TcpStream,
    read_buffer_size: usize,
    events: mpsc::Sender<ReceiverEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut shutdown: watch::Receiver<bool>,
) -> ReceiverStats {
    let started = Instant::now();
    let mut stats = ReceiverStats::new();
    let mut framer = NalFramer::with_capacity(read_buffer_size);
    let mut buf = vec![0u8; read_buffer_size];

    tracing::info!(buffer = read_buffer_size, "Receive loop started");

    let exit = loop {
        if *shutdown.borrow_and_update() {
            break Exit::Interrupted;
        }

        let read = tokio::select! {
            biased;
            _ = shutdown.changed() => break Exit::Interrupted,
            read = stream.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => break Exit::EndOfStream,
            Ok(n) => n,
            Err(e) => break Exit::Failed(e),
        };
        stats.record_chunk(n);
        tracing::trace!(bytes = n, total = stats.bytes_received, "Received chunk");

        let mut gone = false;
        for unit in framer.push(&buf[..n]) {
            stats.record_unit(&unit);
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                sent = events.send(ReceiverEvent::Frame(unit)) => {
                    if sent.is_err() {
                        gone = true;
                        break;
                    }
                }
            }
        }
        if gone {
            break Exit::ConsumerGone;
        }
    };

    // The connection is closed here, before anything is reported
    drop(stream);
    let stopping = *shutdown.borrow();

    match exit {
        Exit::EndOfStream => {
            tracing::warn!(bytes = stats.bytes_received, "Stream ended or connection closed");
            if let Some(last) = framer.finish() {
                tracing::debug!(len = last.len(), "Final NAL unit");
                stats.record_unit(&last);
                stats.flushed_units += 1;
                deliver(&events, &mut shutdown, ReceiverEvent::Frame(last)).await;
            }
            state.send_replace(ConnectionState::Disconnected);
            deliver(
                &events,
                &mut shutdown,
                ReceiverEvent::ConnectionChanged {
                    connected: false,
                    message: Some("Stream ended".to_string()),
                },
            )
            .await;
        }
        Exit::Failed(e) if !stopping => {
            let message = format!("Stream error: {}", e);
            tracing::error!(error = %e, "Error receiving stream");
            state.send_replace(ConnectionState::Error(message.clone()));
            deliver(&events, &mut shutdown, ReceiverEvent::Error(message.clone())).await;
            deliver(
                &events,
                &mut shutdown,
                ReceiverEvent::ConnectionChanged {
                    connected: false,
                    message: Some(message),
                },
            )
            .await;
        }
        Exit::Failed(e) => {
            tracing::debug!(error = %e, "Read error after stop requested");
        }
        Exit::Interrupted => tracing::debug!("Receive loop interrupted"),
        Exit::ConsumerGone => tracing::debug!("Event receiver dropped, stopping"),
    }

    stats.duration = started.elapsed();
    tracing::info!(
        bytes = stats.bytes_received,
        nal_units = stats.nal_units,
        duration_ms = stats.duration.as_millis() as u64,
        "Receive loop ended"
    );
    stats
}

/// Send a terminal event, giving up as soon as a stop is requested.
///
/// Once stopping, only an immediate send is attempted.
async fn deliver(
    events: &mpsc::Sender<ReceiverEvent>,
    shutdown: &mut watch::Receiver<bool>,
    event: ReceiverEvent,
) {
    if *shutdown.borrow() {
        if events.try_send(event).is_err() {
            tracing::debug!("Stopping with a busy consumer, event dropped");
        }
        return;
    }

    tokio::select! {
        biased;
        _ = events.send(event) => {}
        _ = shutdown.changed() => {
            tracing::debug!("Stop requested while consumer was busy, event dropped");
        }
    }
}
