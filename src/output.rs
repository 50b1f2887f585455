//! Output Coordinator (§4.E): reconciles the selected remote-device set
//! against reality and fans PCM packets out to every active output.
//!
//! The reserved local-sink id (`devices::LOCAL_SINK_DEVICE_ID`) is handled
//! by the player thread directly against the [`LocalSink`] trait; this
//! coordinator only manages remote sessions, which always go through an
//! async [`RemoteDriver`] call launched via [`TaskSpawner`].

use std::sync::Arc;

use crate::devices::{requires_missing_password, DeviceRegistry};
use crate::remote::{RemoteCallback, RemoteDriver, RemoteStatus, SessionId};
use crate::runtime::TaskSpawner;

/// Outcome of a synchronous `speaker_set` call (§4.E, §7).
///
/// `code` is 0 on full success, -2 if at least one requested device needs a
/// password that isn't on file (other devices may still have activated).
/// This coordinator never produces -1 itself — that code is reserved for
/// failures discovered later, by the command dispatcher's bottom half, once
/// an async device callback reports failure (§7). `code` must never be
/// downgraded from -2 to -1 by a later step.
pub struct SpeakerSetResult {
    pub code: i32,
    /// Number of async device operations launched; the caller's command
    /// dispatcher should not complete until this many callbacks arrive.
    pub pending: u32,
}

pub struct OutputCoordinator {
    registry: Arc<DeviceRegistry>,
    spawner: Arc<dyn TaskSpawner>,
}

impl OutputCoordinator {
    pub fn new(registry: Arc<DeviceRegistry>, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self { registry, spawner }
    }

    /// Reconciles the selected set against the registry. Devices present in
    /// `ids` are activated (probed if `playing` is false, started
    /// otherwise); devices with an active session absent from `ids` are
    /// deactivated. `rtptime` is the stream position a newly-started device
    /// should begin at.
    pub fn speaker_set(
        &self,
        ids: &[u64],
        playing: bool,
        rtptime: u64,
        remote: Arc<dyn RemoteDriver>,
        callback: Arc<dyn RemoteCallback>,
    ) -> SpeakerSetResult {
        let devices = self.registry.snapshot();
        let mut code = 0i32;
        let mut pending = 0u32;

        for device in &devices {
            let selected = ids.contains(&device.id);

            if !selected {
                self.registry.set_selected(device.id, false);
                if let Some(session) = device.session {
                    self.deactivate(session, remote.clone(), callback.clone());
                    pending += 1;
                }
                continue;
            }

            if requires_missing_password(device) {
                code = -2;
                continue;
            }

            self.registry.set_selected(device.id, true);
            if device.session.is_none() {
                self.activate(device.clone(), playing, rtptime, remote.clone(), callback.clone());
                pending += 1;
            }
        }

        SpeakerSetResult { code, pending }
    }

    fn activate(
        &self,
        device: crate::devices::Device,
        playing: bool,
        rtptime: u64,
        remote: Arc<dyn RemoteDriver>,
        callback: Arc<dyn RemoteCallback>,
    ) {
        let device_id = device.id;
        self.spawner.spawn(async move {
            if playing {
                match remote.start(&device, rtptime).await {
                    Ok(session) => callback.on_status(device_id, session, RemoteStatus::Ok),
                    Err(_) => callback.on_status(device_id, SessionId(0), RemoteStatus::Failed),
                }
            } else {
                match remote.probe(&device).await {
                    Ok(()) => callback.on_status(device_id, SessionId(0), RemoteStatus::Ok),
                    Err(_) => callback.on_status(device_id, SessionId(0), RemoteStatus::Failed),
                }
            }
        });
    }

    fn deactivate(&self, session: SessionId, remote: Arc<dyn RemoteDriver>, callback: Arc<dyn RemoteCallback>) {
        self.spawner.spawn(async move {
            remote.stop(session).await;
            callback.on_status(0, session, RemoteStatus::Stopped);
        });
    }

    /// Flushes every active remote session to `rtptime`, launched
    /// asynchronously the same way as activation (used by `pause`, §4.G).
    pub fn flush_all(&self, rtptime: u64, remote: Arc<dyn RemoteDriver>, callback: Arc<dyn RemoteCallback>) -> u32 {
        let devices = self.registry.snapshot();
        let mut pending = 0u32;
        for device in devices.iter().filter(|d| d.session.is_some()) {
            let session = device.session.unwrap();
            let device_id = device.id;
            let remote = remote.clone();
            let callback = callback.clone();
            self.spawner.spawn(async move {
                let _ = remote.flush(session, rtptime).await;
                callback.on_status(device_id, session, RemoteStatus::Ok);
            });
            pending += 1;
        }
        pending
    }

    /// Applies a new volume to every active remote session.
    pub fn set_volume_all(&self, volume: u8, remote: Arc<dyn RemoteDriver>, callback: Arc<dyn RemoteCallback>) -> u32 {
        let devices = self.registry.snapshot();
        let mut pending = 0u32;
        for device in devices.iter().filter(|d| d.session.is_some()) {
            let session = device.session.unwrap();
            let device_id = device.id;
            let remote = remote.clone();
            let callback = callback.clone();
            self.spawner.spawn(async move {
                let _ = remote.set_volume(session, volume).await;
                callback.on_status(device_id, session, RemoteStatus::Ok);
            });
            pending += 1;
        }
        pending
    }

    /// Handles a remote-device status callback once it reaches the player
    /// thread (§4.E, §5): updates the registry, re-verifying the device
    /// still exists before mutating it (§9).
    pub fn on_remote_status(&self, device_id: u64, session: SessionId, status: RemoteStatus) {
        match status {
            RemoteStatus::Ok => {
                self.registry.with_device_mut(device_id, |d| d.session = Some(session));
            }
            RemoteStatus::Stopped | RemoteStatus::Failed => {
                let keep = self
                    .registry
                    .with_device_mut(device_id, |d| {
                        d.session = None;
                        d.advertised
                    })
                    .unwrap_or(false);
                if !keep {
                    self.registry.remove(device_id);
                }
            }
            RemoteStatus::Password => {
                self.registry.set_selected(device_id, false);
            }
        }
    }
}
