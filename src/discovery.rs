//! Service discovery collaborator contract.
//!
//! Announces and withdraws remote receivers (§6, §4.D). The discovery
//! implementation runs on its own thread and invokes the listener with one
//! event per advertisement change; `port = None` means withdraw.

use std::net::IpAddr;

/// Attributes carried on a discovery advertisement, parsed from whatever
/// transport-level TXT/attribute record the discovery backend exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryAttributes {
    /// 64-bit device id, as advertised (hex-encoded on the wire per §4.D).
    pub id: u64,
    pub requires_password: bool,
}

/// Receives discovery advertisement/withdrawal events.
///
/// Implemented by the device registry; invoked from the discovery thread,
/// so implementations must be safe to call from a thread other than the
/// player thread (the registry mutex, §5, provides that safety).
pub trait DiscoveryListener: Send + Sync {
    /// `port = None` means the advertisement for `name` was withdrawn.
    fn on_advertisement(
        &self,
        name: &str,
        address: Option<IpAddr>,
        port: Option<u16>,
        attributes: DiscoveryAttributes,
    );
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every advertisement event it receives, for asserting on
    /// discovery-driven registry mutations in tests.
    pub struct RecordingDiscoveryListener {
        pub events: Mutex<Vec<(String, Option<IpAddr>, Option<u16>, DiscoveryAttributes)>>,
    }

    impl RecordingDiscoveryListener {
        pub fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl DiscoveryListener for RecordingDiscoveryListener {
        fn on_advertisement(
            &self,
            name: &str,
            address: Option<IpAddr>,
            port: Option<u16>,
            attributes: DiscoveryAttributes,
        ) {
            self.events
                .lock()
                .push((name.to_string(), address, port, attributes));
        }
    }

    #[test]
    fn recording_listener_captures_events_in_order() {
        let listener = RecordingDiscoveryListener::new();
        listener.on_advertisement(
            "kitchen",
            Some("10.0.0.5".parse().unwrap()),
            Some(7000),
            DiscoveryAttributes {
                id: 1,
                requires_password: false,
            },
        );
        listener.on_advertisement("kitchen", None, None, DiscoveryAttributes { id: 1, requires_password: false });

        let events = listener.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].2, None);
    }
}
