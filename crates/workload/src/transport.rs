//! Delivery of link events to the emulator's event service

use crate::errors::TransportError;
use crate::events::LinkEvent;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddrV4};
use topology::NemId;
use tracing::{debug, info, warn};

pub const DEFAULT_EVENT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 1, 2, 8);
pub const DEFAULT_EVENT_PORT: u16 = 45703;
pub const DEFAULT_EVENT_INTERFACE: &str = "emanenode0";

/// Destination for link events
pub trait EventSink {
    fn publish(&mut self, event: &LinkEvent) -> Result<(), TransportError>;
}

/// Keeps every published event in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Vec<LinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[LinkEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LinkEvent> {
        self.events
    }
}

impl EventSink for RecordingSink {
    fn publish(&mut self, event: &LinkEvent) -> Result<(), TransportError> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Only logs events, for dry runs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink {
    published: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> usize {
        self.published
    }
}

impl EventSink for LogSink {
    fn publish(&mut self, event: &LinkEvent) -> Result<(), TransportError> {
        self.published += 1;
        info!(
            "[dry-run] t={:.2} nem:{} pathloss nem:{},{}",
            event.time_offset, event.node_a, event.node_b, event.attenuation_db
        );
        Ok(())
    }
}

fn default_group() -> Ipv4Addr {
    DEFAULT_EVENT_GROUP
}

fn default_port() -> u16 {
    DEFAULT_EVENT_PORT
}

fn default_interface() -> String {
    DEFAULT_EVENT_INTERFACE.to_string()
}

fn default_ttl() -> u32 {
    32
}

/// Multicast group/port/interface triple of the event service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventServiceConfig {
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl Default for EventServiceConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_port(),
            interface: default_interface(),
            ttl: default_ttl(),
        }
    }
}

impl EventServiceConfig {
    pub fn endpoint(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.group, self.port)
    }
}

/// Datagram body: pathloss seen by `nem` from `origin`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathlossPayload {
    pub nem: NemId,
    pub origin: NemId,
    pub forward: f64,
}

impl From<&LinkEvent> for PathlossPayload {
    fn from(event: &LinkEvent) -> Self {
        Self {
            nem: event.node_a,
            origin: event.node_b,
            forward: event.attenuation_db,
        }
    }
}

/// Publishes each event as one UDP multicast datagram
#[derive(Debug)]
pub struct MulticastPublisher {
    socket: Socket,
    destination: SockAddr,
}

impl MulticastPublisher {
    pub fn connect(config: &EventServiceConfig) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_ttl_v4(config.ttl)?;

        #[cfg(target_os = "linux")]
        if let Err(e) = socket.bind_device(Some(config.interface.as_bytes())) {
            warn!(
                "Could not bind event socket to {}: {}, using the default route",
                config.interface, e
            );
        }

        info!(
            "Event service publisher ready on {} via {}",
            config.endpoint(),
            config.interface
        );

        Ok(Self {
            socket,
            destination: SockAddr::from(config.endpoint()),
        })
    }
}

impl EventSink for MulticastPublisher {
    fn publish(&mut self, event: &LinkEvent) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(&PathlossPayload::from(event))?;
        let sent = self.socket.send_to(&payload, &self.destination)?;
        debug!("Published {} byte pathloss event for nem:{}", sent, event.node_a);
        Ok(())
    }
}
