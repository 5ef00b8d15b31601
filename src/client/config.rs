//! Receiver and decoder configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default mirroring endpoint host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default mirroring endpoint port
pub const DEFAULT_PORT: u16 = 27183;

/// Receiver configuration options
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Host to connect to
    pub host: String,

    /// Port to connect to
    pub port: u16,

    /// Connect must complete within this time. Reads have no timeout.
    pub connect_timeout: Duration,

    /// Maximum bytes taken from the socket per read
    pub read_buffer_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Enable TCP keep-alive probes
    pub keepalive: bool,

    /// Capacity of the outbound event channel
    pub event_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            read_buffer_size: 64 * 1024, // 64KB
            tcp_nodelay: true,           // Important for low latency
            keepalive: true,
            event_capacity: 256,
        }
    }
}

impl ReceiverConfig {
    /// Create a new config targeting `addr`
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..Default::default()
        }
    }

    /// Set the host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-read buffer size (at least one byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the event channel capacity (at least one event)
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// `host:port` for logging
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Decoder configuration options
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Output width requested at configure time
    pub width: u32,

    /// Output height requested at configure time
    pub height: u32,

    /// Request low-latency decoding when the accelerator supports it
    pub low_latency: bool,

    /// Bounded wait for a free input slot before dropping a unit
    pub input_timeout: Duration,

    /// Input buffer size hint (`None` = platform default)
    pub max_input_size: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            low_latency: true,
            input_timeout: Duration::from_millis(10),
            max_input_size: None,
        }
    }
}

impl DecoderConfig {
    /// Set output geometry
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the input slot wait
    pub fn input_timeout(mut self, timeout: Duration) -> Self {
        self.input_timeout = timeout;
        self
    }

    /// Disable low-latency mode
    pub fn disable_low_latency(mut self) -> Self {
        self.low_latency = false;
        self
    }

    /// Set the input buffer size hint
    pub fn max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = Some(size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReceiverConfig::default();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 27183);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_buffer_size, 65536);
        assert!(config.tcp_nodelay);
        assert!(config.keepalive);
        assert_eq!(config.endpoint(), "127.0.0.1:27183");
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let config = ReceiverConfig::with_addr(addr);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ReceiverConfig::default()
            .host("localhost")
            .port(9000)
            .connect_timeout(Duration::from_secs(1))
            .read_buffer_size(0)
            .event_capacity(0);

        assert_eq!(config.endpoint(), "localhost:9000");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_buffer_size, 1);
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_default_decoder_config() {
        let config = DecoderConfig::default();

        assert_eq!((config.width, config.height), (1920, 1080));
        assert!(config.low_latency);
        assert_eq!(config.input_timeout, Duration::from_millis(10));
        assert!(config.max_input_size.is_none());
    }

    #[test]
    fn test_decoder_builders() {
        let config = DecoderConfig::default()
            .size(1280, 720)
            .input_timeout(Duration::from_millis(2))
            .max_input_size(1 << 20)
            .disable_low_latency();

        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.input_timeout, Duration::from_millis(2));
        assert_eq!(config.max_input_size, Some(1 << 20));
        assert!(!config.low_latency);
    }
}
