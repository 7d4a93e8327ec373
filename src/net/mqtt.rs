//! MQTT broker session over an embassy-net TCP socket.
//!
//! One TCP socket is kept for the lifetime of the firmware and reopened on
//! every connect. The rust-mqtt client only borrows the socket and the
//! packet buffers, so a client is built per operation; the session itself
//! is the TCP connection plus our `connected` flag.

use crate::config::{MQTT_KEEP_ALIVE_SECS, TELEMETRY_MAX_LEN};
use crate::connectivity::MqttTransport;
use crate::error::MqttError;
use core::net::Ipv4Addr;
use defmt::{info, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::{Duration, Instant};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;

/// MQTT packet buffer size. Fits a telemetry publish plus topic and header.
const PACKET_BUF_LEN: usize = 256;
/// TCP socket buffer size.
const SOCKET_BUF_LEN: usize = 1024;
/// Socket inactivity timeout.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
/// MQTT v5 properties the client may carry.
const MAX_PROPERTIES: usize = 5;

const _: () = assert!(TELEMETRY_MAX_LEN + 64 <= PACKET_BUF_LEN);

/// Socket buffers, handed out once from a `StaticCell`.
pub struct SocketBuffers {
    rx: [u8; SOCKET_BUF_LEN],
    tx: [u8; SOCKET_BUF_LEN],
}

impl SocketBuffers {
    pub const fn new() -> Self {
        Self {
            rx: [0; SOCKET_BUF_LEN],
            tx: [0; SOCKET_BUF_LEN],
        }
    }
}

impl Default for SocketBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// [`MqttTransport`] talking to one broker.
pub struct BrokerSession {
    stack: Stack<'static>,
    socket: TcpSocket<'static>,
    host: &'static str,
    port: u16,
    write_buf: [u8; PACKET_BUF_LEN],
    recv_buf: [u8; PACKET_BUF_LEN],
    connected: bool,
    last_ping: Instant,
}

impl BrokerSession {
    pub fn new(
        stack: Stack<'static>,
        buffers: &'static mut SocketBuffers,
        host: &'static str,
        port: u16,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, &mut buffers.rx, &mut buffers.tx);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        Self {
            stack,
            socket,
            host,
            port,
            write_buf: [0; PACKET_BUF_LEN],
            recv_buf: [0; PACKET_BUF_LEN],
            connected: false,
            last_ping: Instant::now(),
        }
    }

    /// Dotted IPv4 literal, or a DNS lookup.
    async fn resolve(&self) -> Result<IpAddress, MqttError> {
        if let Ok(addr) = self.host.parse::<Ipv4Addr>() {
            return Ok(IpAddress::Ipv4(addr));
        }
        let addrs = self
            .stack
            .dns_query(self.host, DnsQueryType::A)
            .await
            .map_err(|_| MqttError::CONNECT_FAILED)?;
        addrs.first().copied().ok_or(MqttError::CONNECT_FAILED)
    }

    async fn open_socket(&mut self) -> Result<(), MqttError> {
        if self.stack.config_v4().is_none() {
            return Err(MqttError::DISCONNECTED);
        }
        let addr = self.resolve().await?;

        self.socket.abort();
        let _ = self.socket.flush().await;
        self.socket.connect((addr, self.port)).await.map_err(|e| {
            warn!("MQTT: TCP connect failed: {:?}", e);
            MqttError::CONNECT_FAILED
        })
    }

    fn drop_session(&mut self) {
        self.connected = false;
        self.socket.abort();
    }
}

fn client_config<'a>(
    client_id: &'a str,
    token: &'a str,
) -> ClientConfig<'a, MAX_PROPERTIES, CountingRng> {
    let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20_000));
    config.add_client_id(client_id);
    config.add_password(token);
    config.keep_alive = MQTT_KEEP_ALIVE_SECS;
    config.max_packet_size = PACKET_BUF_LEN as u32;
    config
}

fn reason(code: ReasonCode) -> MqttError {
    MqttError::broker(u8::from(code))
}

impl MqttTransport for BrokerSession {
    async fn connect(&mut self, client_id: &str, token: &str) -> Result<(), MqttError> {
        self.connected = false;
        self.open_socket().await?;

        let mut client = MqttClient::<_, MAX_PROPERTIES, _>::new(
            &mut self.socket,
            &mut self.write_buf,
            PACKET_BUF_LEN,
            &mut self.recv_buf,
            PACKET_BUF_LEN,
            client_config(client_id, token),
        );
        let result = client.connect_to_broker().await.map_err(reason);
        drop(client);

        match result {
            Ok(()) => {
                info!("MQTT: session open to {}:{}", self.host, self.port);
                self.connected = true;
                self.last_ping = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.socket.abort();
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected && self.socket.state() == State::Established
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::DISCONNECTED);
        }
        let mut client = MqttClient::<_, MAX_PROPERTIES, _>::new(
            &mut self.socket,
            &mut self.write_buf,
            PACKET_BUF_LEN,
            &mut self.recv_buf,
            PACKET_BUF_LEN,
            client_config("", ""),
        );
        let result = client
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await
            .map_err(reason);
        drop(client);

        if result.is_err() {
            self.drop_session();
        }
        result
    }

    async fn service(&mut self) {
        if !self.connected {
            return;
        }
        if self.socket.state() != State::Established {
            self.connected = false;
            return;
        }
        let interval = Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS / 2));
        if self.last_ping.elapsed() < interval {
            return;
        }

        let mut client = MqttClient::<_, MAX_PROPERTIES, _>::new(
            &mut self.socket,
            &mut self.write_buf,
            PACKET_BUF_LEN,
            &mut self.recv_buf,
            PACKET_BUF_LEN,
            client_config("", ""),
        );
        let result = client.send_ping().await;
        drop(client);

        self.last_ping = Instant::now();
        if result.is_err() {
            warn!("MQTT: keep-alive ping failed");
            self.drop_session();
        }
    }

    fn close(&mut self) {
        if self.connected {
            info!("MQTT: closing session");
        }
        self.drop_session();
    }
}
