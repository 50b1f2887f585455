//! Device Registry (§4.D): tracks known remote receivers and their
//! advertised/session lifecycle.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::discovery::{DiscoveryAttributes, DiscoveryListener};
use crate::remote::SessionId;
use crate::utils::validate_speaker_ip;

/// A known remote receiver.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: u64,
    pub name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    /// User wants this device in the active output set.
    pub selected: bool,
    /// Currently announced by discovery.
    pub advertised: bool,
    pub has_password: bool,
    pub password: Option<String>,
    pub session: Option<SessionId>,
}

impl Device {
    pub fn new(id: u64, name: String, address: IpAddr, port: u16) -> Self {
        let address = validate_speaker_ip(&address).unwrap_or(Ipv4Addr::UNSPECIFIED);
        Self {
            id,
            name,
            address,
            port,
            selected: false,
            advertised: true,
            has_password: false,
            password: None,
            session: None,
        }
    }

    /// Keep-alive rule (§3): a device is retained while either advertised or
    /// holding a session.
    fn should_keep(&self) -> bool {
        self.advertised || self.session.is_some()
    }
}

/// Looks up stored passwords by display name, standing in for the
/// original's configuration-backed password lookup (§4.D).
pub trait PasswordStore: Send + Sync {
    fn lookup(&self, display_name: &str) -> Option<String>;
}

/// `PasswordStore` that never has a password on file.
pub struct NoPasswords;

impl PasswordStore for NoPasswords {
    fn lookup(&self, _display_name: &str) -> Option<String> {
        None
    }
}

/// Registry of known remote devices, guarded by one mutex (§5).
///
/// Writers are the discovery thread (via [`DiscoveryListener`]) and the
/// player thread (session lifecycle, `selected`). Any player-thread code
/// path that drops and reacquires the lock across a remote-driver call must
/// re-look-up the device by id afterward (§4.D, §9) — it may have been
/// withdrawn and freed in the interim.
pub struct DeviceRegistry {
    devices: Mutex<Vec<Device>>,
    passwords: Arc<dyn PasswordStore>,
}

impl DeviceRegistry {
    pub fn new(passwords: Arc<dyn PasswordStore>) -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            passwords,
        }
    }

    pub fn with_no_passwords() -> Self {
        Self::new(Arc::new(NoPasswords))
    }

    /// Returns a snapshot of every known device.
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.lock().clone()
    }

    /// Looks up a device by id, cloning it out from under the lock.
    pub fn get(&self, id: u64) -> Option<Device> {
        self.devices.lock().iter().find(|d| d.id == id).cloned()
    }

    /// Mutates a device in place under the registry lock, if it still
    /// exists. Returns `false` if the device was not found (e.g. it was
    /// withdrawn and freed between lookup and mutation, §9).
    pub fn with_device_mut<R>(&self, id: u64, f: impl FnOnce(&mut Device) -> R) -> Option<R> {
        let mut devices = self.devices.lock();
        devices.iter_mut().find(|d| d.id == id).map(f)
    }

    /// Marks `id` selected or not. No-op if unknown.
    pub fn set_selected(&self, id: u64, selected: bool) {
        self.with_device_mut(id, |d| d.selected = selected);
    }

    /// Removes a device outright (session teardown complete and not
    /// advertised).
    pub fn remove(&self, id: u64) {
        self.devices.lock().retain(|d| d.id != id);
    }

    /// Clears withdrawal/advertisement state but keeps the device alive if
    /// a session still references it; otherwise removes it (§4.D).
    fn prune_if_dead(devices: &mut Vec<Device>, id: u64) {
        devices.retain(|d| d.id != id || d.should_keep());
    }
}

impl DiscoveryListener for DeviceRegistry {
    fn on_advertisement(
        &self,
        name: &str,
        address: Option<IpAddr>,
        port: Option<u16>,
        attributes: DiscoveryAttributes,
    ) {
        let mut devices = self.devices.lock();

        let Some(port) = port else {
            // Withdrawal: keep alive only if a session is still active.
            if let Some(d) = devices.iter_mut().find(|d| d.id == attributes.id) {
                d.advertised = false;
            }
            Self::prune_if_dead(&mut devices, attributes.id);
            return;
        };

        let password = if attributes.requires_password {
            self.passwords.lookup(name)
        } else {
            None
        };

        if let Some(existing) = devices.iter_mut().find(|d| d.id == attributes.id) {
            existing.name = name.to_string();
            if let Some(addr) = address {
                existing.address = validate_speaker_ip(&addr).unwrap_or(existing.address);
            }
            existing.port = port;
            existing.advertised = true;
            existing.has_password = attributes.requires_password;
            existing.password = password;
            return;
        }

        let address = address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let mut device = Device::new(attributes.id, name.to_string(), address, port);
        device.has_password = attributes.requires_password;
        device.password = password;
        devices.push(device);
    }
}

/// Reserved id addressing the local sink inside the output coordinator
/// (§4.E): never present in the device registry itself.
pub const LOCAL_SINK_DEVICE_ID: u64 = 0;

/// Resolves whether a device id is ready for activation without a password
/// prompt, per the `speaker_set` contract (§4.E, §7).
pub fn requires_missing_password(device: &Device) -> bool {
    device.has_password && device.password.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_inserts_new_device() {
        let registry = DeviceRegistry::with_no_passwords();
        registry.on_advertisement(
            "kitchen",
            Some("192.168.1.50".parse().unwrap()),
            Some(7000),
            DiscoveryAttributes {
                id: 1,
                requires_password: false,
            },
        );
        let device = registry.get(1).expect("device should be registered");
        assert!(device.advertised);
        assert!(!device.has_password);
    }

    #[test]
    fn withdrawal_without_session_removes_device() {
        let registry = DeviceRegistry::with_no_passwords();
        registry.on_advertisement(
            "kitchen",
            Some("192.168.1.50".parse().unwrap()),
            Some(7000),
            DiscoveryAttributes {
                id: 1,
                requires_password: false,
            },
        );
        registry.on_advertisement(
            "kitchen",
            None,
            None,
            DiscoveryAttributes {
                id: 1,
                requires_password: false,
            },
        );
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn withdrawal_with_active_session_keeps_device() {
        let registry = DeviceRegistry::with_no_passwords();
        registry.on_advertisement(
            "kitchen",
            Some("192.168.1.50".parse().unwrap()),
            Some(7000),
            DiscoveryAttributes {
                id: 1,
                requires_password: false,
            },
        );
        registry.with_device_mut(1, |d| d.session = Some(SessionId(99)));
        registry.on_advertisement(
            "kitchen",
            None,
            None,
            DiscoveryAttributes {
                id: 1,
                requires_password: false,
            },
        );
        let device = registry.get(1).expect("session keeps device alive");
        assert!(!device.advertised);
    }

    #[test]
    fn requires_missing_password_flags_devices_without_stored_password() {
        let mut device = Device::new(1, "d".into(), "10.0.0.1".parse().unwrap(), 7000);
        device.has_password = true;
        assert!(requires_missing_password(&device));
        device.password = Some("secret".into());
        assert!(!requires_missing_password(&device));
    }

    #[test]
    fn device_validates_address_rejecting_loopback() {
        let device = Device::new(1, "d".into(), "127.0.0.1".parse().unwrap(), 7000);
        assert_eq!(device.address, Ipv4Addr::UNSPECIFIED);
    }
}
