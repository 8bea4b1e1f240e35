//! Local port probing

use std::collections::HashSet;
use std::net::TcpListener;

/// Tells whether something on this host already listens on a port.
pub trait PortProbe {
    fn in_use(&self, port: u16) -> bool;
}

/// Probes by trying to bind the port on all interfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

impl PortProbe for TcpProbe {
    fn in_use(&self, port: u16) -> bool {
        TcpListener::bind(("0.0.0.0", port)).is_err()
    }
}

/// A fixed set of busy ports, for callers that know the answer up front.
#[derive(Debug, Default, Clone)]
pub struct StaticProbe {
    busy: HashSet<u16>,
}

impl StaticProbe {
    pub fn new(busy: impl IntoIterator<Item = u16>) -> Self {
        Self {
            busy: busy.into_iter().collect(),
        }
    }
}

impl PortProbe for StaticProbe {
    fn in_use(&self, port: u16) -> bool {
        self.busy.contains(&port)
    }
}
