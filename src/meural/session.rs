//! Cached authentication and device identity for the display service.

use std::sync::Mutex;

/// The frame picked from the account's device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub alias: Option<String>,
    pub local_ip: String,
}

impl DeviceInfo {
    /// Base URL of the device's local HTTP interface.
    pub fn local_url(&self) -> String {
        format!("http://{}", self.local_ip)
    }
}

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    device: Option<DeviceInfo>,
}

/// Session cache shared by every call of one client.
///
/// Values are filled lazily and dropped together by [`MeuralSession::reset`],
/// so the next call re-authenticates and re-discovers the device.
#[derive(Default)]
pub struct MeuralSession {
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for MeuralSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("MeuralSession")
            .field("token", &state.token.as_ref().map(|_| "<redacted>"))
            .field("device", &state.device)
            .finish()
    }
}

impl MeuralSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .clone()
    }

    pub fn set_token(&self, token: String) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).token = Some(token);
    }

    pub fn device(&self) -> Option<DeviceInfo> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .device
            .clone()
    }

    pub fn set_device(&self, device: DeviceInfo) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).device = Some(device);
    }

    pub fn reset(&self) {
        tracing::warn!("Resetting display session");
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.token = None;
        state.device = None;
    }
}
