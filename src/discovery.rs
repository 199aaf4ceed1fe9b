//! Receiver discovery via UDP broadcast.
//!
//! Receivers answer an `ECNQSTN` query sent to UDP port 60128 with an
//! `ECN` message of the form `model/port/areacode/mac`:
//!
//! ```text
//! !1ECNTX-NR609/60128/DX/0009B0D4AB12
//! ```
//!
//! Discovery always completes with a [`DiscoveryReport`]. Running out of time
//! is a normal outcome ([`DiscoveryOutcome::TimedOut`]) and socket failures
//! are reported in the outcome alongside whatever was found before them.
//!
//! # Usage
//!
//! ```no_run
//! use eiscp::DiscoveryOptions;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let options = DiscoveryOptions::new()
//!     .with_devices(0)
//!     .with_timeout(Duration::from_secs(3));
//!
//! let report = eiscp::discover(&options).await;
//! for device in &report.devices {
//!     println!("{} at {}:{} ({})", device.model, device.host, device.port, device.mac);
//! }
//! # }
//! ```

use std::net::IpAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{EiscpError, Result};
use crate::packet::{self, Destination};
use crate::transport::DEFAULT_PORT;

/// Message sent to ask receivers to identify themselves.
pub const DISCOVERY_QUERY: &str = "ECNQSTN";

/// Default time to wait for answers.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default broadcast address.
pub const BROADCAST_ADDRESS: &str = "255.255.255.255";

const RESPONSE_CODE: &str = "ECN";
const MAC_LEN: usize = 12;
const DATAGRAM_SIZE: usize = 1024;

/// Parameters of a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Stop as soon as this many receivers answered; `0` waits for the full timeout.
    pub devices: usize,
    /// Maximum time to wait for answers.
    pub timeout: Duration,
    /// Destination of the query (broadcast or a single host).
    pub address: String,
    /// Destination UDP port.
    pub port: u16,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            devices: 1,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
            address: BROADCAST_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl DiscoveryOptions {
    /// Creates options with the defaults: one device, 10 s, broadcast, port 60128.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many answers end the run early (`0` = wait for the timeout).
    pub fn with_devices(mut self, devices: usize) -> Self {
        self.devices = devices;
        self
    }

    /// Sets the maximum wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the query to `address` instead of the broadcast address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the UDP port the query is sent to.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// A receiver that answered the discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Address the answer came from.
    pub host: IpAddr,
    /// TCP port announced by the receiver.
    pub port: u16,
    /// Model name (e.g. `"TX-NR609"`).
    pub model: String,
    /// Destination area code (e.g. `"DX"`).
    pub area_code: String,
    /// MAC address, 12 hexadecimal characters.
    pub mac: String,
    /// The full `ECN` message.
    pub message: String,
}

/// How a discovery run ended.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    /// The requested number of receivers answered, or the full wait of an
    /// unbounded (`devices = 0`) run elapsed.
    Complete,
    /// Fewer receivers than requested answered before the timeout.
    TimedOut,
    /// The socket failed; the devices found before the failure are kept.
    Failed(EiscpError),
}

/// Result of a discovery run.
#[derive(Debug)]
pub struct DiscoveryReport {
    /// Receivers in order of arrival.
    pub devices: Vec<DiscoveredDevice>,
    /// Why the run ended.
    pub outcome: DiscoveryOutcome,
}

impl DiscoveryReport {
    /// Returns `true` if at least one receiver answered.
    pub fn found_any(&self) -> bool {
        !self.devices.is_empty()
    }
}

/// Broadcasts the discovery query and collects the answers.
///
/// The UDP socket lives only for the duration of the call and is closed on
/// every exit path.
pub async fn discover(options: &DiscoveryOptions) -> DiscoveryReport {
    let mut devices = Vec::new();
    let outcome = match run(options, &mut devices).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(
                address = %options.address,
                port = options.port,
                error = %err,
                "discovery failed"
            );
            DiscoveryOutcome::Failed(err)
        }
    };

    debug!(count = devices.len(), outcome = ?outcome, "discovery finished");
    DiscoveryReport { devices, outcome }
}

async fn run(
    options: &DiscoveryOptions,
    devices: &mut Vec<DiscoveredDevice>,
) -> Result<DiscoveryOutcome> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;

    let query = packet::encode(DISCOVERY_QUERY, Destination::Broadcast);
    socket
        .send_to(&query, (options.address.as_str(), options.port))
        .await?;
    debug!(address = %options.address, port = options.port, "sent discovery query");

    let deadline = Instant::now() + options.timeout;
    let mut buf = vec![0u8; DATAGRAM_SIZE];

    loop {
        if options.devices > 0 && devices.len() >= options.devices {
            return Ok(DiscoveryOutcome::Complete);
        }

        let (n, from) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) if options.devices == 0 => return Ok(DiscoveryOutcome::Complete),
            Err(_) => return Ok(DiscoveryOutcome::TimedOut),
        };

        match parse_response(&buf[..n], from.ip()) {
            Some(device) => {
                debug!(
                    model = %device.model,
                    host = %device.host,
                    port = device.port,
                    mac = %device.mac,
                    "discovered receiver"
                );
                devices.push(device);
            }
            None => trace!(from = %from, bytes = n, "ignoring datagram"),
        }
    }
}

/// Parses an `ECN` answer. Returns `None` for anything else, including the
/// echo of our own query.
fn parse_response(datagram: &[u8], host: IpAddr) -> Option<DiscoveredDevice> {
    let message = packet::decode(datagram).ok()?;
    let info = message.strip_prefix(RESPONSE_CODE)?;
    if info == "QSTN" {
        return None;
    }

    let mut fields = info.split('/');
    let model = fields.next().filter(|m| !m.is_empty())?.to_string();
    let port = fields
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let area_code = fields.next().unwrap_or_default().to_string();
    let mac = fields.next().unwrap_or_default().chars().take(MAC_LEN).collect();

    Some(DiscoveredDevice {
        host,
        port,
        model,
        area_code,
        mac,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::device_frame;

    fn localhost() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = DiscoveryOptions::default();
        assert_eq!(options.devices, 1);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.address, "255.255.255.255");
        assert_eq!(options.port, 60128);
    }

    #[test]
    fn test_parse_response() {
        let frame = device_frame("ECNTX-NR609/60128/DX/0009B0D4AB12\x19");
        let device = parse_response(&frame, localhost()).unwrap();

        assert_eq!(device.model, "TX-NR609");
        assert_eq!(device.port, 60128);
        assert_eq!(device.area_code, "DX");
        assert_eq!(device.mac, "0009B0D4AB12");
        assert_eq!(device.host, localhost());
        assert!(device.message.starts_with("ECNTX-NR609/"));
    }

    #[test]
    fn test_parse_response_bad_port_falls_back() {
        let frame = device_frame("ECNTX-NR509/abc/XX/0009B0000000");
        let device = parse_response(&frame, localhost()).unwrap();
        assert_eq!(device.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_ignores_query_echo_and_other_codes() {
        let echo = packet::encode(DISCOVERY_QUERY, Destination::Broadcast);
        assert!(parse_response(&echo, localhost()).is_none());
        assert!(parse_response(&device_frame("PWR01"), localhost()).is_none());
        assert!(parse_response(b"garbage", localhost()).is_none());
    }

    /// Answers the first query from two different sockets.
    async fn spawn_two_receivers() -> u16 {
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = first.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let (n, from) = first.recv_from(&mut buf).await.unwrap();
            assert_eq!(packet::decode(&buf[..n]).unwrap(), DISCOVERY_QUERY);

            first
                .send_to(&device_frame("ECNTX-NR609/60128/DX/0009B0D4AB12"), from)
                .await
                .unwrap();
            second
                .send_to(&device_frame("ECNTX-NR1009/60129/XX/0009B0AAAAAA"), from)
                .await
                .unwrap();
        });

        port
    }

    #[tokio::test]
    async fn test_discover_completes_early() {
        let port = spawn_two_receivers().await;
        let options = DiscoveryOptions::new()
            .with_devices(2)
            .with_timeout(Duration::from_secs(5))
            .with_address("127.0.0.1")
            .with_port(port);

        let started = std::time::Instant::now();
        let report = discover(&options).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(report.outcome, DiscoveryOutcome::Complete));
        assert_eq!(report.devices.len(), 2);
        assert_eq!(report.devices[0].model, "TX-NR609");
        assert_eq!(report.devices[1].model, "TX-NR1009");
        assert_eq!(report.devices[1].port, 60129);
    }

    #[tokio::test]
    async fn test_discover_times_out_empty() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let options = DiscoveryOptions::new()
            .with_timeout(Duration::from_millis(100))
            .with_address("127.0.0.1")
            .with_port(port);

        let report = discover(&options).await;
        assert!(matches!(report.outcome, DiscoveryOutcome::TimedOut));
        assert!(!report.found_any());
    }

    #[tokio::test]
    async fn test_discover_unbounded_waits_for_timeout() {
        let port = spawn_two_receivers().await;
        let options = DiscoveryOptions::new()
            .with_devices(0)
            .with_timeout(Duration::from_millis(300))
            .with_address("127.0.0.1")
            .with_port(port);

        let started = std::time::Instant::now();
        let report = discover(&options).await;

        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(matches!(report.outcome, DiscoveryOutcome::Complete));
        assert_eq!(report.devices.len(), 2);
    }
}
