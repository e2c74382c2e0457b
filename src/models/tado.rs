//! Wire models for the thermostat cloud API, bridge subset.
//!
//! Scope: the read endpoints the connector polls plus the write bodies for
//! overlay, presence-lock and temperature-offset commands.
//!
//! Notes
//! - All object schemas are strongly typed structs/enums; response fields are
//!   `Option` because the API omits them freely per zone generation.
//! - Date/time fields use `chrono` (`DateTime<Utc>`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(pub i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub i64);

// =====================
// Core enums (string enums on the wire)
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneType {
    AirConditioning,
    Heating,
    HotWater,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AirConditioningMode {
    Auto,
    Cool,
    Heat,
    Dry,
    Fan,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Power {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HomePresence {
    Home,
    Away,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FanSpeed {
    Auto,
    High,
    Middle,
    Low,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwingState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryState {
    Low,
    Normal,
}

/// Termination type the vendor reports on an active or default overlay.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayTerminationType {
    Manual,
    TadoMode,
    Timer,
    NextTimeBlock,
}

/// Overlay mode requested when writing an overlay. `TadoDefault` is a
/// sentinel accepted from configuration and service calls only; it is
/// resolved to the zone's vendor default before anything goes on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayMode {
    TadoMode,
    NextTimeBlock,
    Manual,
    Timer,
    TadoDefault,
}

impl OverlayMode {
    /// Parse a wire-style name ("TADO_MODE", "MANUAL", ...). Used for
    /// configuration values and service-call arguments.
    pub fn from_name(name: &str) -> Option<OverlayMode> {
        match name {
            "TADO_MODE" => Some(OverlayMode::TadoMode),
            "NEXT_TIME_BLOCK" => Some(OverlayMode::NextTimeBlock),
            "MANUAL" => Some(OverlayMode::Manual),
            "TIMER" => Some(OverlayMode::Timer),
            "TADO_DEFAULT" => Some(OverlayMode::TadoDefault),
            _ => None,
        }
    }
}

impl From<OverlayTerminationType> for OverlayMode {
    fn from(value: OverlayTerminationType) -> Self {
        match value {
            OverlayTerminationType::Manual => OverlayMode::Manual,
            OverlayTerminationType::TadoMode => OverlayMode::TadoMode,
            OverlayTerminationType::Timer => OverlayMode::Timer,
            OverlayTerminationType::NextTimeBlock => OverlayMode::NextTimeBlock,
        }
    }
}

// =====================
// Core datapoint structs
// =====================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Temperature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celsius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fahrenheit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureDataPoint {
    pub celsius: Option<f64>,
    pub fahrenheit: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PercentageDataPoint {
    pub percentage: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PowerDataPoint {
    pub value: Option<Power>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataPoints {
    pub inside_temperature: Option<TemperatureDataPoint>,
    pub humidity: Option<PercentageDataPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDataPoints {
    pub heating_power: Option<PercentageDataPoint>,
    pub ac_power: Option<PowerDataPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TemperatureRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemperatureCapability {
    pub celsius: Option<TemperatureRange>,
    pub fahrenheit: Option<TemperatureRange>,
}

// =====================
// Zones and capabilities
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: Option<ZoneId>,
    pub name: Option<String>,
    pub r#type: Option<ZoneType>,
    pub date_created: Option<DateTime<Utc>>,
    pub devices: Option<Vec<Device>>,
}

/// Per-mode capability block as reported for AIR_CONDITIONING zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneModeCapabilities {
    pub temperatures: Option<TemperatureCapability>,
    pub fan_speeds: Option<Vec<FanSpeed>>,
    pub swings: Option<Vec<SwingState>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCapabilities {
    pub r#type: Option<ZoneType>,
    /// Top-level range reported by HEATING zones.
    pub temperatures: Option<TemperatureCapability>,
    #[serde(rename = "AUTO")]
    pub auto: Option<ZoneModeCapabilities>,
    #[serde(rename = "HEAT")]
    pub heat: Option<ZoneModeCapabilities>,
    #[serde(rename = "COOL")]
    pub cool: Option<ZoneModeCapabilities>,
    #[serde(rename = "DRY")]
    pub dry: Option<ZoneModeCapabilities>,
    #[serde(rename = "FAN")]
    pub fan: Option<ZoneModeCapabilities>,
}

// =====================
// Zone state
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSetting {
    pub r#type: Option<ZoneType>,
    pub power: Option<Power>,
    pub mode: Option<AirConditioningMode>,
    pub temperature: Option<Temperature>,
    pub fan_speed: Option<FanSpeed>,
    pub swing: Option<SwingState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OverlayTermination {
    pub r#type: Option<OverlayTerminationType>,
    pub duration_in_seconds: Option<i64>,
    pub remaining_time_in_seconds: Option<i64>,
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverlay {
    pub r#type: Option<String>,
    pub setting: Option<ZoneSetting>,
    pub termination: Option<OverlayTermination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStateLink {
    pub state: Option<String>, // ONLINE/OFFLINE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOpenWindow {
    pub detected_time: Option<DateTime<Utc>>,
    pub duration_in_seconds: Option<i64>,
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneState {
    pub tado_mode: Option<HomePresence>,
    pub geolocation_override: Option<bool>,
    pub setting: Option<ZoneSetting>,
    pub overlay: Option<ZoneOverlay>,
    pub open_window: Option<ZoneOpenWindow>,
    pub link: Option<ZoneStateLink>,
    pub activity_data_points: Option<ActivityDataPoints>,
    pub sensor_data_points: Option<SensorDataPoints>,
}

/// Zone-level default overlay, fetched separately from the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOverlay {
    pub termination_condition: Option<DefaultOverlayTermination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOverlayTermination {
    pub r#type: Option<OverlayTerminationType>,
    pub duration_in_seconds: Option<i64>,
}

// =====================
// Home presence/state
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeState {
    pub presence: Option<HomePresence>,
    pub presence_locked: Option<bool>,
}

// =====================
// Devices
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnectionState {
    pub value: Option<bool>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial_no: Option<DeviceId>,
    pub short_serial_no: Option<String>,
    pub device_type: Option<String>,
    pub current_fw_version: Option<String>,
    pub connection_state: Option<DeviceConnectionState>,
    pub battery_state: Option<BatteryState>,
}

// =====================
// Account discovery (/me)
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomeBase {
    pub id: Option<HomeId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: Option<String>,
    pub email: Option<String>,
    pub homes: Option<Vec<HomeBase>>,
}

// =====================
// Write bodies (command endpoints)
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySettingInput {
    pub r#type: ZoneType,
    pub power: Power,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AirConditioningMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed: Option<FanSpeed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing: Option<SwingState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayTerminationInput {
    pub type_skill_based_app: OverlayMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayInput {
    pub setting: OverlaySettingInput,
    pub termination: OverlayTerminationInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceLockInput {
    pub home_presence: HomePresence,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureOffsetInput {
    pub celsius: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_write_body_matches_wire_shape() {
        let overlay = OverlayInput {
            setting: OverlaySettingInput {
                r#type: ZoneType::AirConditioning,
                power: Power::On,
                mode: Some(AirConditioningMode::Cool),
                temperature: Some(Temperature {
                    celsius: Some(22.0),
                    fahrenheit: None,
                }),
                fan_speed: Some(FanSpeed::Auto),
                swing: None,
            },
            termination: OverlayTerminationInput {
                type_skill_based_app: OverlayMode::Timer,
                duration_in_seconds: Some(1800),
            },
        };

        assert_eq!(
            serde_json::to_value(&overlay).unwrap(),
            json!({
                "setting": {
                    "type": "AIR_CONDITIONING",
                    "power": "ON",
                    "mode": "COOL",
                    "temperature": {"celsius": 22.0},
                    "fanSpeed": "AUTO"
                },
                "termination": {
                    "typeSkillBasedApp": "TIMER",
                    "durationInSeconds": 1800
                }
            })
        );
    }

    #[test]
    fn heating_off_body_omits_optional_fields() {
        let overlay = OverlayInput {
            setting: OverlaySettingInput {
                r#type: ZoneType::Heating,
                power: Power::Off,
                mode: None,
                temperature: None,
                fan_speed: None,
                swing: None,
            },
            termination: OverlayTerminationInput {
                type_skill_based_app: OverlayMode::Manual,
                duration_in_seconds: None,
            },
        };

        assert_eq!(
            serde_json::to_value(&overlay).unwrap(),
            json!({
                "setting": {"type": "HEATING", "power": "OFF"},
                "termination": {"typeSkillBasedApp": "MANUAL"}
            })
        );
    }

    #[test]
    fn zone_state_fixture_parses() {
        let raw = std::fs::read_to_string("tests/data/zone-state.json").unwrap();
        let state: ZoneState = serde_json::from_str(&raw).unwrap();

        assert_eq!(state.tado_mode, Some(HomePresence::Home));
        let setting = state.setting.unwrap();
        assert_eq!(setting.r#type, Some(ZoneType::Heating));
        assert_eq!(setting.power, Some(Power::On));
        assert_eq!(setting.temperature.and_then(|t| t.celsius), Some(21.0));
        assert!(state.overlay.is_none());
    }
}
