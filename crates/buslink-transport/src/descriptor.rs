//! Interface matching for packet-link discovery.
//!
//! A buslink device exposes a vendor-class interface (alternate setting 0)
//! with exactly two bulk endpoints of opposite direction and the interface
//! string [`INTERFACE_STRING`].

/// Interface string a buslink device advertises.
pub const INTERFACE_STRING: &str = "BUSLINK USB";

/// Vendor-specific interface class.
pub const VENDOR_CLASS: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSummary {
    pub address: u8,
    pub direction: Direction,
    pub bulk: bool,
    pub max_packet_size: u16,
}

/// The parts of an interface descriptor the heuristic looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSummary {
    pub number: u8,
    pub alt_setting: u8,
    pub class_code: u8,
    pub endpoints: Vec<EndpointSummary>,
}

/// Endpoints selected from a matching interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkPair {
    pub interface: u8,
    pub ep_out: u8,
    pub ep_in: u8,
    pub out_packet_size: usize,
}

/// Check the structural part of the heuristic. The interface string is
/// checked separately since reading it needs an open device.
pub fn match_interface(iface: &InterfaceSummary) -> Option<BulkPair> {
    if iface.alt_setting != 0 || iface.class_code != VENDOR_CLASS {
        return None;
    }
    let [a, b] = iface.endpoints.as_slice() else {
        return None;
    };
    if !a.bulk || !b.bulk || a.direction == b.direction {
        return None;
    }
    let (ep_out, ep_in) = if a.direction == Direction::Out {
        (a, b)
    } else {
        (b, a)
    };
    Some(BulkPair {
        interface: iface.number,
        ep_out: ep_out.address,
        ep_in: ep_in.address,
        out_packet_size: usize::from(ep_out.max_packet_size),
    })
}

pub fn string_matches(s: &str) -> bool {
    s == INTERFACE_STRING
}
