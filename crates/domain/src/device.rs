//! Device — a controllable unit (relay or light) with commanded and observed state.
//!
//! Every device carries two independent one-bit registers:
//!
//! | Field | Written by | Persisted |
//! |-------|------------|-----------|
//! | `status` | the controller ([`Device::set_status`], [`Device::switch`]) | yes |
//! | `state` | the hardware ([`Device::update`]) | no |
//!
//! plus an `online` flag that only [`Device::update`] raises.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::id::DeviceId;

/// UTC timestamp of the last hardware report.
pub type Timestamp = DateTime<Utc>;

/// Closed set of device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Relay,
    Light,
}

impl DeviceKind {
    /// Every supported kind, in table order.
    pub const ALL: [Self; 2] = [Self::Relay, Self::Light];

    /// Lowercase wire name (`"relay"`, `"light"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::Light => "light",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relay" => Ok(Self::Relay),
            "light" => Ok(Self::Light),
            other => Err(ValidationError::UnknownDeviceKind(other.to_string())),
        }
    }
}

/// A registered relay or light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    status: bool,
    state: bool,
    online: bool,
    last_seen: Option<Timestamp>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Commanded value: what the controller wants the hardware to do.
    #[must_use]
    pub fn status(&self) -> bool {
        self.status
    }

    /// Set the commanded value. The observed `state` is left untouched.
    pub fn set_status(&mut self, value: bool) {
        self.status = value;
    }

    /// Invert the commanded value and return the new one.
    pub fn switch(&mut self) -> bool {
        self.set_status(!self.status);
        self.status
    }

    /// Observed value, as last reported by the hardware.
    #[must_use]
    pub fn state(&self) -> bool {
        self.state
    }

    /// Whether the hardware has reported in since the controller started.
    #[must_use]
    pub fn online(&self) -> bool {
        self.online
    }

    /// Time of the last hardware report, if any.
    #[must_use]
    pub fn last_seen(&self) -> Option<Timestamp> {
        self.last_seen
    }

    /// Record a hardware report: the device is online and in `observed` state.
    pub fn update(&mut self, observed: bool, at: Timestamp) {
        self.state = observed;
        self.online = true;
        self.last_seen = Some(at);
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    description: Option<String>,
    kind: Option<DeviceKind>,
    status: bool,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Seed the commanded value (used when restoring from storage).
    #[must_use]
    pub fn status(mut self, status: bool) -> Self {
        self.status = status;
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// The id defaults to `0` and the kind to [`DeviceKind::Relay`]; the
    /// registry always overrides the id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Device, HubError> {
        let device = Device {
            id: self.id.unwrap_or(DeviceId::new(0)),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            kind: self.kind.unwrap_or(DeviceKind::Relay),
            status: self.status,
            state: false,
            online: false,
            last_seen: None,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> Device {
        Device::builder()
            .name("porch-relay")
            .description("Porch lamp")
            .kind(DeviceKind::Relay)
            .build()
            .unwrap()
    }

    #[test]
    fn should_parse_known_kinds() {
        assert_eq!("relay".parse::<DeviceKind>().unwrap(), DeviceKind::Relay);
        assert_eq!("light".parse::<DeviceKind>().unwrap(), DeviceKind::Light);
    }

    #[test]
    fn should_reject_unknown_kind() {
        let result = "thermostat".parse::<DeviceKind>();
        assert_eq!(
            result,
            Err(ValidationError::UnknownDeviceKind("thermostat".to_string()))
        );
    }

    #[test]
    fn should_display_kind_in_lowercase() {
        assert_eq!(DeviceKind::Light.to_string(), "light");
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Device::builder().kind(DeviceKind::Light).build();
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_start_offline_with_everything_off() {
        let device = relay();
        assert!(!device.status());
        assert!(!device.state());
        assert!(!device.online());
        assert!(device.last_seen().is_none());
    }

    #[test]
    fn should_not_touch_state_when_status_is_set() {
        let mut device = relay();
        device.set_status(true);
        assert!(device.status());
        assert!(!device.state());
        assert!(!device.online());
    }

    #[test]
    fn should_invert_status_when_switched() {
        let mut device = relay();
        assert!(device.switch());
        assert!(!device.switch());
        assert!(!device.status());
    }

    #[test]
    fn should_go_online_when_updated() {
        let mut device = relay();
        let at = Utc::now();
        device.update(true, at);
        assert!(device.state());
        assert!(device.online());
        assert_eq!(device.last_seen(), Some(at));
        assert!(!device.status());
    }

    #[test]
    fn should_seed_status_from_builder() {
        let device = Device::builder()
            .name("hall-light")
            .kind(DeviceKind::Light)
            .status(true)
            .build()
            .unwrap();
        assert!(device.status());
        assert!(!device.state());
    }

    #[test]
    fn should_serialize_kind_as_type_field() {
        let json = serde_json::to_value(relay()).unwrap();
        assert_eq!(json["type"], "relay");
        assert_eq!(json["name"], "porch-relay");
    }
}
