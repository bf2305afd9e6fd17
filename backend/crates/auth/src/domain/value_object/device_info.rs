use platform::client::{ClientInfo, DeviceClass};
use serde::{Deserialize, Serialize};

/// Snapshot of the client that obtained a token; never updated afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub device_label: String,
}

impl DeviceInfo {
    pub fn unknown() -> Self {
        Self {
            user_agent: None,
            ip: None,
            device_label: DeviceClass::Unknown.label().to_string(),
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

impl From<ClientInfo> for DeviceInfo {
    fn from(info: ClientInfo) -> Self {
        Self {
            device_label: info.device.label().to_string(),
            ip: info.ip.map(|ip| ip.to_string()),
            user_agent: info.user_agent,
        }
    }
}
