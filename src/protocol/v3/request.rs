use crate::{Result, error::GpsdError, protocol::GpsdJsonRequest};

use super::types::*;

/// A command a client can send to GPSD
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Devices,
    Watch(Option<Watch>),
    Device(Option<Device>),
    Poll,
    Version,
    /// Any other command, by name: `Other("POLL")` renders as `?POLL;`
    Other(String),
}

impl GpsdJsonRequest for Message {
    /// Converts a request message into a GPSD command string
    ///
    /// Each request type is formatted according to the GPSD protocol:
    /// - Simple commands: `?COMMAND;`
    /// - Commands with parameters: `?COMMAND={"json":"params"};`
    fn to_command(&self) -> Result<String> {
        let cmd = match self {
            Message::Devices => "?DEVICES;".into(),
            Message::Watch(Some(watch)) => format!("?WATCH={};", to_json(watch)?),
            Message::Watch(None) => "?WATCH;".into(),
            Message::Device(Some(device)) => format!("?DEVICE={};", to_json(device)?),
            Message::Device(None) => "?DEVICE;".into(),
            Message::Poll => "?POLL;".into(),
            Message::Version => "?VERSION;".into(),
            Message::Other(name) => format!("?{name};"),
        };
        Ok(cmd)
    }
}

fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(GpsdError::SerdeError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Message::Poll.to_command().unwrap(), "?POLL;");
        assert_eq!(Message::Version.to_command().unwrap(), "?VERSION;");
        assert_eq!(Message::Devices.to_command().unwrap(), "?DEVICES;");
        assert_eq!(Message::Watch(None).to_command().unwrap(), "?WATCH;");
        assert_eq!(Message::Device(None).to_command().unwrap(), "?DEVICE;");
        assert_eq!(
            Message::Other("POLL".into()).to_command().unwrap(),
            "?POLL;"
        );
    }

    #[test]
    fn test_watch_command_payload() {
        let enable = Message::Watch(Some(Watch {
            enable: Some(true),
            json: Some(true),
            ..Default::default()
        }));
        assert_eq!(
            enable.to_command().unwrap(),
            r#"?WATCH={"enable":true,"json":true};"#
        );

        let disable = Message::Watch(Some(Watch {
            enable: Some(false),
            ..Default::default()
        }));
        assert_eq!(disable.to_command().unwrap(), r#"?WATCH={"enable":false};"#);
    }

    #[test]
    fn test_device_command_payload() {
        let device = Message::Device(Some(Device {
            path: Some("/dev/ttyUSB0".into()),
            bps: Some(38400),
            parity: Some(Parity::No),
            ..Default::default()
        }));
        assert_eq!(
            device.to_command().unwrap(),
            r#"?DEVICE={"path":"/dev/ttyUSB0","bps":38400,"parity":"N"};"#
        );
    }
}
