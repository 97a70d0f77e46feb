//! Vehicle config rewriting
//!
//! The telemetry agent's config lists the vehicle's network interfaces by
//! their human-readable names. Before the agent starts, every CAN and OBD
//! entry is pointed at a derived virtual channel instead, and the
//! logical -> derived mapping is collected for the processes that need to
//! resolve it later.

use crate::error::{Error, Result};
use crate::naming::{ChannelName, ChannelNamer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Logical interface name -> derived channel name
pub type ChannelMapping = BTreeMap<String, ChannelName>;

const NETWORK_INTERFACES: &str = "networkInterfaces";
const INTERFACE_NAME: &str = "interfaceName";

/// A telemetry agent config document
///
/// Only `networkInterfaces` is interpreted; everything else is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleConfig(Value);

impl VehicleConfig {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    /// Borrow the raw JSON document
    pub fn document(&self) -> &Value {
        &self.0
    }
}

/// Declared type of a network interface entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Can,
    Obd,
    Ros2,
}

impl InterfaceKind {
    /// Key of the nested record holding this kind's settings
    pub fn key(&self) -> &'static str {
        match self {
            InterfaceKind::Can => "canInterface",
            InterfaceKind::Obd => "obdInterface",
            InterfaceKind::Ros2 => "ros2Interface",
        }
    }

    /// Whether entries of this kind are backed by a virtual CAN channel
    pub fn needs_channel(&self) -> bool {
        matches!(self, InterfaceKind::Can | InterfaceKind::Obd)
    }
}

impl FromStr for InterfaceKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "canInterface" => Ok(InterfaceKind::Can),
            "obdInterface" => Ok(InterfaceKind::Obd),
            "ros2Interface" => Ok(InterfaceKind::Ros2),
            _ => Err(()),
        }
    }
}

/// Result of one rewrite pass
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// Copy of the input config with CAN/OBD interface names replaced
    pub config: VehicleConfig,
    /// Logical -> derived names recorded during the pass
    pub mapping: ChannelMapping,
    /// Channels the rewritten config expects to exist
    pub channels: BTreeSet<ChannelName>,
}

/// Rewrite CAN and OBD interface names to derived channel names
///
/// Entries are visited once, in document order. Any unknown interface type
/// or missing field aborts the whole pass; no partial mapping is returned.
/// Two logical names deriving the same channel fail as a provisioning error,
/// so a retry with another nonce can separate them.
pub fn rewrite(
    config: &VehicleConfig,
    namer: &ChannelNamer,
    vehicle_id: &str,
    nonce: &str,
) -> Result<Rewrite> {
    let mut document = config.0.clone();
    let mut mapping = ChannelMapping::new();
    let mut channels = BTreeSet::new();

    let interfaces = document
        .get_mut(NETWORK_INTERFACES)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| Error::MalformedConfig {
            location: "document root".to_string(),
            message: format!("missing '{}' array", NETWORK_INTERFACES),
        })?;

    for (idx, entry) in interfaces.iter_mut().enumerate() {
        let interface_id = interface_id(entry, idx);
        let location = format!("interface '{}'", interface_id);

        let declared = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedConfig {
                location: location.clone(),
                message: "missing 'type'".to_string(),
            })?;

        let kind = declared
            .parse::<InterfaceKind>()
            .map_err(|_| Error::UnrecognizedInterfaceType {
                interface_id: interface_id.clone(),
                kind: declared.to_string(),
            })?;

        if !kind.needs_channel() {
            tracing::debug!("Interface {} is {}, nothing to rewrite", interface_id, kind.key());
            continue;
        }

        let slot = entry
            .get_mut(kind.key())
            .and_then(|nested| nested.get_mut(INTERFACE_NAME))
            .ok_or_else(|| Error::MalformedConfig {
                location: location.clone(),
                message: format!("missing '{}.{}'", kind.key(), INTERFACE_NAME),
            })?;

        let logical = slot
            .as_str()
            .ok_or_else(|| Error::MalformedConfig {
                location: location.clone(),
                message: format!("'{}.{}' is not a string", kind.key(), INTERFACE_NAME),
            })?
            .to_string();

        let channel = namer.derive(vehicle_id, &logical, nonce)?;
        tracing::debug!("Interface {}: {} -> {}", interface_id, logical, channel);

        // Same logical name listed twice shares its channel; anything else is a clash
        let clash = mapping
            .iter()
            .find(|(other, existing)| **existing == channel && **other != logical);
        if let Some((other, _)) = clash {
            return Err(Error::Provisioning {
                channel: channel.to_string(),
                message: format!("derived name collides with '{}'", other),
            });
        }

        *slot = Value::String(channel.to_string());
        channels.insert(channel.clone());
        mapping.insert(logical, channel);
    }

    Ok(Rewrite {
        config: VehicleConfig(document),
        mapping,
        channels,
    })
}

/// Render an entry's `interfaceId` for diagnostics, falling back to its index
fn interface_id(entry: &Value, idx: usize) -> String {
    match entry.get("interfaceId") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("#{}", idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(interfaces: Value) -> VehicleConfig {
        VehicleConfig::new(json!({
            "version": "1.0",
            "networkInterfaces": interfaces,
            "staticConfig": { "bufferSizes": { "dtcBufferSize": 100 } }
        }))
    }

    fn is_hex8(name: &ChannelName) -> bool {
        name.as_str().len() == 8 && name.as_str().chars().all(|c| c.is_ascii_hexdigit())
    }

    #[test]
    fn test_can_and_obd_rewritten() {
        let input = config(json!([
            {
                "interfaceId": "1",
                "type": "canInterface",
                "canInterface": { "interfaceName": "can0", "protocolName": "CAN" }
            },
            {
                "interfaceId": "2",
                "type": "obdInterface",
                "obdInterface": { "interfaceName": "obd0", "obdStandard": "J1979" }
            }
        ]));

        let namer = ChannelNamer::default();
        let out = rewrite(&input, &namer, "car1", "").unwrap();

        assert_eq!(out.mapping.len(), 2);
        let can = &out.mapping["can0"];
        let obd = &out.mapping["obd0"];
        assert!(is_hex8(can));
        assert!(is_hex8(obd));
        assert_eq!(can, &namer.derive("car1", "can0", "").unwrap());

        let doc = out.config.document();
        assert_eq!(
            doc["networkInterfaces"][0]["canInterface"]["interfaceName"],
            json!(can.as_str())
        );
        assert_eq!(
            doc["networkInterfaces"][1]["obdInterface"]["interfaceName"],
            json!(obd.as_str())
        );
        // Sibling settings survive
        assert_eq!(doc["networkInterfaces"][0]["canInterface"]["protocolName"], "CAN");
        assert_eq!(doc["staticConfig"]["bufferSizes"]["dtcBufferSize"], 100);

        assert_eq!(out.channels.len(), 2);
        assert!(out.channels.contains(can));

        // Input is left alone
        assert_eq!(
            input.document()["networkInterfaces"][0]["canInterface"]["interfaceName"],
            "can0"
        );
    }

    #[test]
    fn test_ros2_only_is_unchanged() {
        let input = config(json!([
            { "interfaceId": "10", "type": "ros2Interface", "ros2Interface": { "interfaceName": "ros2" } },
            { "interfaceId": "11", "type": "ros2Interface", "ros2Interface": { "interfaceName": "ros2b" } }
        ]));

        let out = rewrite(&input, &ChannelNamer::default(), "car1", "").unwrap();
        assert!(out.mapping.is_empty());
        assert!(out.channels.is_empty());
        assert_eq!(out.config, input);
    }

    #[test]
    fn test_unknown_type_aborts() {
        let input = config(json!([
            { "interfaceId": "1", "type": "canInterface", "canInterface": { "interfaceName": "can0" } },
            { "interfaceId": "7", "type": "bluetoothInterface", "bluetoothInterface": { "interfaceName": "bt0" } }
        ]));

        let err = rewrite(&input, &ChannelNamer::default(), "car1", "").unwrap_err();
        match err {
            Error::UnrecognizedInterfaceType { interface_id, kind } => {
                assert_eq!(interface_id, "7");
                assert_eq!(kind, "bluetoothInterface");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_interface_name_names_entry() {
        let input = config(json!([
            { "interfaceId": "42", "type": "canInterface", "canInterface": { "protocolName": "CAN" } }
        ]));

        let err = rewrite(&input, &ChannelNamer::default(), "car1", "").unwrap_err();
        match err {
            Error::MalformedConfig { location, message } => {
                assert!(location.contains("42"));
                assert!(message.contains("canInterface.interfaceName"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_nested_record() {
        let input = config(json!([{ "interfaceId": "3", "type": "obdInterface" }]));
        let err = rewrite(&input, &ChannelNamer::default(), "car1", "").unwrap_err();
        assert!(matches!(err, Error::MalformedConfig { .. }));
    }

    #[test]
    fn test_missing_interface_list() {
        let input = VehicleConfig::new(json!({ "version": "1.0" }));
        let err = rewrite(&input, &ChannelNamer::default(), "car1", "").unwrap_err();
        assert!(matches!(err, Error::MalformedConfig { .. }));
    }

    #[test]
    fn test_empty_interface_name_is_invalid_argument() {
        let input = config(json!([
            { "interfaceId": "1", "type": "canInterface", "canInterface": { "interfaceName": "" } }
        ]));
        let err = rewrite(&input, &ChannelNamer::default(), "car1", "").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_nonce_changes_every_channel() {
        let input = config(json!([
            { "interfaceId": "1", "type": "canInterface", "canInterface": { "interfaceName": "vcan0" } }
        ]));
        let namer = ChannelNamer::default();
        let first = rewrite(&input, &namer, "car1", "").unwrap();
        let retry = rewrite(&input, &namer, "car1", "98765").unwrap();
        assert_ne!(first.mapping["vcan0"], retry.mapping["vcan0"]);
    }

    fn can_entries(count: usize) -> Value {
        Value::Array(
            (0..count)
                .map(|i| {
                    json!({
                        "interfaceId": i.to_string(),
                        "type": "canInterface",
                        "canInterface": { "interfaceName": format!("vcan{}", i) }
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn test_colliding_channels_are_retryable() {
        // 17 buses over 16 one-digit names must clash somewhere
        let input = config(can_entries(17));
        let err = rewrite(&input, &ChannelNamer::new(1), "car1", "").unwrap_err();
        match &err {
            Error::Provisioning { channel, message } => {
                assert_eq!(channel.len(), 1);
                assert!(message.contains("collides with 'vcan"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_repeated_logical_name_shares_channel() {
        let input = config(json!([
            { "interfaceId": "1", "type": "canInterface", "canInterface": { "interfaceName": "vcan0" } },
            { "interfaceId": "2", "type": "obdInterface", "obdInterface": { "interfaceName": "vcan0" } }
        ]));
        let out = rewrite(&input, &ChannelNamer::new(1), "car1", "").unwrap();
        assert_eq!(out.mapping.len(), 1);
        assert_eq!(out.channels.len(), 1);
    }

    #[test]
    fn test_interface_kind_parse() {
        assert_eq!("canInterface".parse::<InterfaceKind>(), Ok(InterfaceKind::Can));
        assert_eq!("obdInterface".parse::<InterfaceKind>(), Ok(InterfaceKind::Obd));
        assert_eq!("ros2Interface".parse::<InterfaceKind>(), Ok(InterfaceKind::Ros2));
        assert!("bluetoothInterface".parse::<InterfaceKind>().is_err());
        assert!(!InterfaceKind::Ros2.needs_channel());
    }
}
