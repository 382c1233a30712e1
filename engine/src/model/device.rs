//! Device descriptor.

use serde::{Deserialize, Serialize};

/// Connection state of a device, as reported by `adb devices -l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Ready,
    Offline,
    Unauthorized,
    Bootloader,
    Recovery,
    Unknown,
}

impl DeviceState {
    /// Parse the second whitespace-separated token of an `adb devices -l` line.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "device" => DeviceState::Ready,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            _ => DeviceState::Unknown,
        }
    }
}

/// A single device as reported by `adb devices -l`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub identity: String,
    pub state: DeviceState,
    pub product: Option<String>,
    pub model: Option<String>,
    pub transport_id: Option<String>,
}

impl Device {
    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Ready
    }

    pub fn is_emulator(&self) -> bool {
        self.identity.starts_with("emulator-")
    }

    /// Parse the full `adb devices -l` output, discarding the header line.
    pub fn parse_list(output: &str) -> Vec<Device> {
        output
            .lines()
            .skip(1)
            .filter_map(Device::parse_line)
            .collect()
    }

    fn parse_line(line: &str) -> Option<Device> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut tokens = line.split_whitespace();
        let identity = tokens.next()?.to_string();
        let state = DeviceState::parse(tokens.next()?);

        let mut device = Device {
            identity,
            state,
            product: None,
            model: None,
            transport_id: None,
        };

        for token in tokens {
            if let Some(value) = token.strip_prefix("product:") {
                device.product = Some(value.to_string());
            } else if let Some(value) = token.strip_prefix("model:") {
                device.model = Some(value.to_string());
            } else if let Some(value) = token.strip_prefix("transport_id:") {
                device.transport_id = Some(value.to_string());
            }
        }

        Some(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_devices() {
        let output = "List of devices attached\n\
                       emulator-5554\tdevice product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 transport_id:1\n\
                       \n\
                       R3CN90ABCDE\tunauthorized\n";

        let devices = Device::parse_list(output);
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].identity, "emulator-5554");
        assert!(devices[0].is_ready());
        assert!(devices[0].is_emulator());
        assert_eq!(devices[0].product.as_deref(), Some("sdk_gphone64_x86_64"));
        assert_eq!(devices[0].transport_id.as_deref(), Some("1"));

        assert_eq!(devices[1].identity, "R3CN90ABCDE");
        assert_eq!(devices[1].state, DeviceState::Unauthorized);
        assert!(!devices[1].is_ready());
        assert!(!devices[1].is_emulator());
    }

    #[test]
    fn empty_list_yields_no_devices() {
        let output = "List of devices attached\n";
        assert!(Device::parse_list(output).is_empty());
    }
}
