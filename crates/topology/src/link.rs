//! Point-to-point links between emulated nodes
//!
//! Every link gets its own /24. When both endpoint names are integers in
//! `1..=255` the subnet spells them out (`1.<low>.<high>.0/24`); otherwise the
//! subnet is derived from the creation-order id.

use crate::errors::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub const DEFAULT_MASK: u8 = 24;

/// Number of distinct subnets the id-derived scheme can produce
pub const LINK_ADDRESS_CAPACITY: usize = 255 * 255;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    #[default]
    Up,
    Down,
}

/// A link between two nodes, referenced by name
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Link {
    pub id: usize,
    pub node1: String,
    pub node2: String,
    pub node1_ipv4: Ipv4Addr,
    pub node2_ipv4: Ipv4Addr,
    pub mask1: u8,
    pub mask2: u8,
    pub node1_port: Option<u32>,
    pub node2_port: Option<u32>,
    pub status: LinkStatus,
}

/// One side of a link as seen from a given node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub address: Ipv4Addr,
    pub mask: u8,
    pub port: Option<u32>,
    pub peer: &'a str,
    pub peer_address: Ipv4Addr,
}

impl Link {
    /// Create a link with derived addresses; `id` is the creation-order id
    pub fn new(node1: impl Into<String>, node2: impl Into<String>, id: usize) -> Result<Self> {
        let node1 = node1.into();
        let node2 = node2.into();
        let (node1_ipv4, node2_ipv4) = derive_addresses(&node1, &node2, id)?;

        Ok(Self {
            id,
            node1,
            node2,
            node1_ipv4,
            node2_ipv4,
            mask1: DEFAULT_MASK,
            mask2: DEFAULT_MASK,
            node1_port: None,
            node2_port: None,
            status: LinkStatus::Up,
        })
    }

    /// Create a link with explicit `address[/mask]` strings
    pub fn with_addresses(
        node1: impl Into<String>,
        node2: impl Into<String>,
        id: usize,
        ip1: &str,
        ip2: &str,
    ) -> Result<Self> {
        let (node1_ipv4, mask1) = parse_interface_address(ip1)?;
        let (node2_ipv4, mask2) = parse_interface_address(ip2)?;

        Ok(Self {
            id,
            node1: node1.into(),
            node2: node2.into(),
            node1_ipv4,
            node2_ipv4,
            mask1,
            mask2,
            node1_port: None,
            node2_port: None,
            status: LinkStatus::Up,
        })
    }

    /// Swap the endpoints together with their addresses, masks and ports
    pub fn swap_endpoints(&mut self) {
        std::mem::swap(&mut self.node1, &mut self.node2);
        std::mem::swap(&mut self.node1_ipv4, &mut self.node2_ipv4);
        std::mem::swap(&mut self.mask1, &mut self.mask2);
        std::mem::swap(&mut self.node1_port, &mut self.node2_port);
    }

    pub fn set_port_ids(&mut self, node1_port: u32, node2_port: u32) {
        self.node1_port = Some(node1_port);
        self.node2_port = Some(node2_port);
    }

    /// True if the link joins `a` and `b` in either direction
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.node1 == a && self.node2 == b) || (self.node1 == b && self.node2 == a)
    }

    pub fn sort_key(&self) -> (&str, &str) {
        (&self.node1, &self.node2)
    }

    pub fn set_status(&mut self, status: LinkStatus) {
        self.status = status;
    }

    pub fn is_up(&self) -> bool {
        self.status == LinkStatus::Up
    }

    /// The interface `node` owns on this link
    pub fn endpoint(&self, node: &str) -> Option<Endpoint<'_>> {
        if self.node1 == node {
            Some(Endpoint {
                address: self.node1_ipv4,
                mask: self.mask1,
                port: self.node1_port,
                peer: &self.node2,
                peer_address: self.node2_ipv4,
            })
        } else if self.node2 == node {
            Some(Endpoint {
                address: self.node2_ipv4,
                mask: self.mask2,
                port: self.node2_port,
                peer: &self.node1,
                peer_address: self.node1_ipv4,
            })
        } else {
            None
        }
    }

    /// Network address of the first endpoint's subnet
    pub fn subnet(&self) -> Ipv4Addr {
        let bits = u32::from(self.node1_ipv4) & prefix_mask(self.mask1);
        Ipv4Addr::from(bits)
    }
}

/// Derive the address pair for a link created as `(name1, name2)`
pub fn derive_addresses(name1: &str, name2: &str, id: usize) -> Result<(Ipv4Addr, Ipv4Addr)> {
    if let (Some(a), Some(b)) = (octet_name(name1), octet_name(name2)) {
        return Ok(if a <= b {
            (Ipv4Addr::new(1, a, b, 1), Ipv4Addr::new(1, a, b, 2))
        } else {
            (Ipv4Addr::new(1, b, a, 2), Ipv4Addr::new(1, b, a, 1))
        });
    }

    if id >= LINK_ADDRESS_CAPACITY {
        return Err(TopologyError::AddressSpaceExhausted {
            what: "links",
            count: id + 1,
            capacity: LINK_ADDRESS_CAPACITY,
        });
    }

    let high = (id / 255 + 1) as u8;
    let low = (id % 255 + 1) as u8;
    let first = Ipv4Addr::new(1, high, low, 1);
    let second = Ipv4Addr::new(1, high, low, 2);

    // Plain string order, so "10" sorts before "3"
    if name1 <= name2 {
        Ok((first, second))
    } else {
        Ok((second, first))
    }
}

fn octet_name(name: &str) -> Option<u8> {
    match name.parse::<u32>() {
        Ok(value) if (1..=255).contains(&value) => Some(value as u8),
        _ => None,
    }
}

fn parse_interface_address(value: &str) -> Result<(Ipv4Addr, u8)> {
    let invalid = || TopologyError::InvalidAddress(value.to_string());

    let (address, mask) = match value.split_once('/') {
        Some((address, mask)) => (address, mask.parse::<u8>().map_err(|_| invalid())?),
        None => (value, DEFAULT_MASK),
    };
    if mask > 32 {
        return Err(invalid());
    }

    let address = address.parse::<Ipv4Addr>().map_err(|_| invalid())?;
    Ok((address, mask))
}

fn prefix_mask(mask: u8) -> u32 {
    match mask {
        0 => 0,
        m if m >= 32 => u32::MAX,
        m => u32::MAX << (32 - m),
    }
}
