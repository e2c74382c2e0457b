//! Thermostat connector: polls the vendor API, normalizes zone state into
//! snapshots, and fires home/zone update signals. Command methods translate
//! hub intents into single vendor calls; caches converge on the next poll.

use crate::client::TadoClient;
use crate::hub::{Dispatcher, PresetMode, Signal};
use crate::models::tado::{
    self, AirConditioningMode, DefaultOverlayTermination, DeviceId, FanSpeed, HomeId, HomePresence, HomeState,
    OverlayInput, OverlayMode, OverlaySettingInput, OverlayTerminationInput, Power, PresenceLockInput, SwingState,
    Temperature, TemperatureOffsetInput, ZoneCapabilities, ZoneId, ZoneType,
};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Operating mode of a zone as the adapter tracks it. Extends the vendor's
/// conditioning modes with the two states the API expresses structurally
/// (power off, no overlay = schedule in control).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TadoMode {
    Off,
    SmartSchedule,
    Auto,
    Cool,
    Heat,
    Dry,
    Fan,
}

impl TadoMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TadoMode::Off => "OFF",
            TadoMode::SmartSchedule => "SMART_SCHEDULE",
            TadoMode::Auto => "AUTO",
            TadoMode::Cool => "COOL",
            TadoMode::Heat => "HEAT",
            TadoMode::Dry => "DRY",
            TadoMode::Fan => "FAN",
        }
    }

    /// The vendor setting mode to send for this adapter mode, if any.
    pub fn conditioning_mode(self) -> Option<AirConditioningMode> {
        match self {
            TadoMode::Auto => Some(AirConditioningMode::Auto),
            TadoMode::Cool => Some(AirConditioningMode::Cool),
            TadoMode::Heat => Some(AirConditioningMode::Heat),
            TadoMode::Dry => Some(AirConditioningMode::Dry),
            TadoMode::Fan => Some(AirConditioningMode::Fan),
            TadoMode::Off | TadoMode::SmartSchedule => None,
        }
    }

    /// Modes the vendor refuses a target temperature for.
    pub fn takes_temperature(self) -> bool {
        !matches!(self, TadoMode::Auto | TadoMode::Dry | TadoMode::Fan)
    }
}

impl From<AirConditioningMode> for TadoMode {
    fn from(value: AirConditioningMode) -> Self {
        match value {
            AirConditioningMode::Auto => TadoMode::Auto,
            AirConditioningMode::Cool => TadoMode::Cool,
            AirConditioningMode::Heat => TadoMode::Heat,
            AirConditioningMode::Dry => TadoMode::Dry,
            AirConditioningMode::Fan => TadoMode::Fan,
        }
    }
}

/// Normalized projection of one vendor zone-state response. Rebuilt wholesale
/// on every update; nothing is merged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoneSnapshot {
    pub current_temp: Option<f64>,
    pub current_humidity: Option<f64>,
    pub target_temp: Option<f64>,
    pub mode: Option<TadoMode>,
    pub fan_speed: Option<FanSpeed>,
    pub swing: Option<SwingState>,
    pub power_on: bool,
    pub heating_power: Option<f64>,
    pub ac_power_on: Option<bool>,
    pub available: bool,
    pub is_away: bool,
    pub open_window: bool,
}

impl ZoneSnapshot {
    pub fn from_state(state: &tado::ZoneState) -> ZoneSnapshot {
        let setting = state.setting.as_ref();
        let power_on = matches!(setting.and_then(|s| s.power), Some(Power::On));

        let mode = if !power_on {
            Some(TadoMode::Off)
        } else if state.overlay.is_none() {
            Some(TadoMode::SmartSchedule)
        } else {
            // Heating zones carry no mode field on the setting.
            Some(setting.and_then(|s| s.mode).map(TadoMode::from).unwrap_or(TadoMode::Heat))
        };

        let sensors = state.sensor_data_points.as_ref();
        let activity = state.activity_data_points.as_ref();

        ZoneSnapshot {
            current_temp: sensors.and_then(|s| s.inside_temperature.as_ref()).and_then(|t| t.celsius),
            current_humidity: sensors.and_then(|s| s.humidity.as_ref()).and_then(|h| h.percentage),
            target_temp: setting.and_then(|s| s.temperature.as_ref()).and_then(|t| t.celsius),
            mode,
            fan_speed: setting.and_then(|s| s.fan_speed),
            swing: setting.and_then(|s| s.swing),
            power_on,
            heating_power: activity.and_then(|a| a.heating_power.as_ref()).and_then(|p| p.percentage),
            ac_power_on: activity
                .and_then(|a| a.ac_power.as_ref())
                .and_then(|p| p.value.map(|v| matches!(v, Power::On))),
            available: state.link.as_ref().and_then(|l| l.state.as_deref()) == Some("ONLINE"),
            is_away: matches!(state.tado_mode, Some(HomePresence::Away)),
            open_window: state.open_window.is_some(),
        }
    }
}

/// Read and command surface entities depend on. `TadoConnector` is the only
/// production implementation; the indirection keeps entity behavior testable
/// without a live session.
pub trait ZoneController {
    fn fallback(&self) -> Option<OverlayMode>;
    fn snapshot(&self, zone_id: ZoneId) -> Option<ZoneSnapshot>;
    fn geofence(&self) -> Option<HomeState>;
    fn auto_geofencing_supported(&self) -> bool;
    fn default_termination(&self, zone_id: ZoneId) -> Option<DefaultOverlayTermination>;
    fn temperature_offset(&self, serial: &str) -> Option<Temperature>;

    #[allow(clippy::too_many_arguments)]
    fn set_zone_overlay(
        &self,
        zone_id: ZoneId,
        zone_type: ZoneType,
        overlay_mode: OverlayMode,
        mode: Option<AirConditioningMode>,
        temperature: Option<f64>,
        duration: Option<i64>,
        fan_speed: Option<FanSpeed>,
        swing: Option<SwingState>,
    ) -> Result<(), String>;
    fn set_zone_off(&self, zone_id: ZoneId, zone_type: ZoneType) -> Result<(), String>;
    fn reset_zone_overlay(&self, zone_id: ZoneId) -> Result<(), String>;
    fn set_presence(&self, preset: PresetMode) -> Result<(), String>;
    fn set_temperature_offset(&self, serial: &str, offset: f64) -> Result<(), String>;
}

#[derive(Default)]
struct ConnectorData {
    geofence: Option<HomeState>,
    snapshots: BTreeMap<i64, ZoneSnapshot>,
    default_terminations: BTreeMap<i64, DefaultOverlayTermination>,
    offsets: BTreeMap<String, Temperature>,
}

pub struct TadoConnector {
    client: TadoClient,
    home_id: HomeId,
    /// Configured overlay fallback, consulted when a command carries no
    /// explicit overlay mode.
    fallback: Option<OverlayMode>,
    dispatcher: Rc<Dispatcher>,
    zones: Vec<tado::Zone>,
    data: RefCell<ConnectorData>,
}

impl TadoConnector {
    /// Build the connector and fetch the zone inventory once. Per-zone state
    /// arrives with the first `update()`.
    pub fn new(
        client: TadoClient,
        home_id: HomeId,
        fallback: Option<OverlayMode>,
        dispatcher: Rc<Dispatcher>,
    ) -> Result<TadoConnector, String> {
        let zones = client
            .get_zones(home_id)
            .map_err(|e| format!("get_zones({}) failed: {}", home_id.0, e))?;
        debug!("Connector: home {} has {} zone(s)", home_id.0, zones.len());
        Ok(TadoConnector {
            client,
            home_id,
            fallback,
            dispatcher,
            zones,
            data: RefCell::new(ConnectorData::default()),
        })
    }

    pub fn home_id(&self) -> HomeId {
        self.home_id
    }

    pub fn fallback(&self) -> Option<OverlayMode> {
        self.fallback
    }

    pub fn zones(&self) -> &[tado::Zone] {
        &self.zones
    }

    pub fn capabilities(&self, zone_id: ZoneId) -> Result<ZoneCapabilities, String> {
        self.client
            .get_zone_capabilities(self.home_id, zone_id)
            .map_err(|e| format!("get_zone_capabilities({}) failed: {}", zone_id.0, e))
    }

    // ---- cached reads ----

    pub fn snapshot(&self, zone_id: ZoneId) -> Option<ZoneSnapshot> {
        self.data.borrow().snapshots.get(&zone_id.0).cloned()
    }

    pub fn geofence(&self) -> Option<HomeState> {
        self.data.borrow().geofence.clone()
    }

    /// Auto preset is offered only when the vendor reports whether presence
    /// is locked; homes without geofencing omit the field entirely.
    pub fn auto_geofencing_supported(&self) -> bool {
        self.data
            .borrow()
            .geofence
            .as_ref()
            .map(|g| g.presence_locked.is_some())
            .unwrap_or(false)
    }

    pub fn default_termination(&self, zone_id: ZoneId) -> Option<DefaultOverlayTermination> {
        self.data.borrow().default_terminations.get(&zone_id.0).cloned()
    }

    pub fn temperature_offset(&self, serial: &str) -> Option<Temperature> {
        self.data.borrow().offsets.get(serial).cloned()
    }

    // ---- refresh ----

    /// Re-read home and zone data, overwrite the caches and fire one signal
    /// per scope. Zone failures are logged and skipped so one offline zone
    /// does not stall the rest of the home.
    pub fn update(&self) -> Result<(), String> {
        self.update_home()?;
        let zone_ids: Vec<ZoneId> = self.zones.iter().filter_map(|z| z.id).collect();
        for zone_id in zone_ids {
            if let Err(e) = self.update_zone(zone_id) {
                warn!("Connector: zone {} update failed: {}", zone_id.0, e);
            }
        }
        self.update_offsets();
        Ok(())
    }

    pub fn update_home(&self) -> Result<(), String> {
        let state = self
            .client
            .get_home_state(self.home_id)
            .map_err(|e| format!("get_home_state({}) failed: {}", self.home_id.0, e))?;
        self.data.borrow_mut().geofence = Some(state);
        self.dispatcher.send(Signal::HomeData { home_id: self.home_id.0 });
        Ok(())
    }

    pub fn update_zone(&self, zone_id: ZoneId) -> Result<(), String> {
        let state = self
            .client
            .get_zone_state(self.home_id, zone_id)
            .map_err(|e| format!("get_zone_state({}) failed: {}", zone_id.0, e))?;
        let snapshot = ZoneSnapshot::from_state(&state);

        // The default overlay rarely changes but is cheap to keep fresh; a
        // failure here only degrades the TADO_DEFAULT fallback.
        match self.client.get_default_overlay(self.home_id, zone_id) {
            Ok(overlay) => {
                if let Some(termination) = overlay.termination_condition {
                    self.data.borrow_mut().default_terminations.insert(zone_id.0, termination);
                }
            }
            Err(e) => debug!("Connector: default overlay for zone {} unavailable: {}", zone_id.0, e),
        }

        self.data.borrow_mut().snapshots.insert(zone_id.0, snapshot);
        self.dispatcher.send(Signal::ZoneData {
            home_id: self.home_id.0,
            zone_id: zone_id.0,
        });
        Ok(())
    }

    fn update_offsets(&self) {
        let devices = match self.client.get_devices(self.home_id) {
            Ok(d) => d,
            Err(e) => {
                debug!("Connector: device list unavailable: {}", e);
                return;
            }
        };
        for device in devices {
            let Some(serial) = device.serial_no else { continue };
            match self.client.get_temperature_offset(&serial) {
                Ok(offset) => {
                    self.data.borrow_mut().offsets.insert(serial.0, offset);
                }
                Err(e) => debug!("Connector: offset for device {} unavailable: {}", serial.0, e),
            }
        }
    }

    // ---- commands (single vendor call each; caches converge on next poll) ----

    #[allow(clippy::too_many_arguments)]
    pub fn set_zone_overlay(
        &self,
        zone_id: ZoneId,
        zone_type: ZoneType,
        overlay_mode: OverlayMode,
        mode: Option<AirConditioningMode>,
        temperature: Option<f64>,
        duration: Option<i64>,
        fan_speed: Option<FanSpeed>,
        swing: Option<SwingState>,
    ) -> Result<(), String> {
        let overlay = OverlayInput {
            setting: OverlaySettingInput {
                r#type: zone_type,
                power: Power::On,
                mode,
                temperature: temperature.map(|celsius| Temperature {
                    celsius: Some(celsius),
                    fahrenheit: None,
                }),
                fan_speed,
                swing,
            },
            termination: OverlayTerminationInput {
                type_skill_based_app: overlay_mode,
                duration_in_seconds: duration,
            },
        };
        self.client
            .put_zone_overlay(self.home_id, zone_id, &overlay)
            .map_err(|e| format!("put_zone_overlay({}) failed: {}", zone_id.0, e))
    }

    /// Power a zone off with a manual overlay.
    pub fn set_zone_off(&self, zone_id: ZoneId, zone_type: ZoneType) -> Result<(), String> {
        let overlay = OverlayInput {
            setting: OverlaySettingInput {
                r#type: zone_type,
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
        self.client
            .put_zone_overlay(self.home_id, zone_id, &overlay)
            .map_err(|e| format!("put_zone_overlay({}) failed: {}", zone_id.0, e))
    }

    /// Drop the active overlay, handing the zone back to the smart schedule.
    pub fn reset_zone_overlay(&self, zone_id: ZoneId) -> Result<(), String> {
        self.client
            .delete_zone_overlay(self.home_id, zone_id)
            .map_err(|e| format!("delete_zone_overlay({}) failed: {}", zone_id.0, e))
    }

    pub fn set_presence(&self, preset: PresetMode) -> Result<(), String> {
        let result = match preset {
            PresetMode::Home => self.client.put_presence_lock(
                self.home_id,
                &PresenceLockInput {
                    home_presence: HomePresence::Home,
                },
            ),
            PresetMode::Away => self.client.put_presence_lock(
                self.home_id,
                &PresenceLockInput {
                    home_presence: HomePresence::Away,
                },
            ),
            PresetMode::Auto => self.client.delete_presence_lock(self.home_id),
        };
        result.map_err(|e| format!("presence change failed: {}", e))
    }

    pub fn set_temperature_offset(&self, serial: &str, offset: f64) -> Result<(), String> {
        self.client
            .put_temperature_offset(&DeviceId(serial.to_string()), &TemperatureOffsetInput { celsius: offset })
            .map_err(|e| format!("put_temperature_offset({}) failed: {}", serial, e))
    }
}

impl ZoneController for TadoConnector {
    fn fallback(&self) -> Option<OverlayMode> {
        TadoConnector::fallback(self)
    }

    fn snapshot(&self, zone_id: ZoneId) -> Option<ZoneSnapshot> {
        TadoConnector::snapshot(self, zone_id)
    }

    fn geofence(&self) -> Option<HomeState> {
        TadoConnector::geofence(self)
    }

    fn auto_geofencing_supported(&self) -> bool {
        TadoConnector::auto_geofencing_supported(self)
    }

    fn default_termination(&self, zone_id: ZoneId) -> Option<DefaultOverlayTermination> {
        TadoConnector::default_termination(self, zone_id)
    }

    fn temperature_offset(&self, serial: &str) -> Option<Temperature> {
        TadoConnector::temperature_offset(self, serial)
    }

    fn set_zone_overlay(
        &self,
        zone_id: ZoneId,
        zone_type: ZoneType,
        overlay_mode: OverlayMode,
        mode: Option<AirConditioningMode>,
        temperature: Option<f64>,
        duration: Option<i64>,
        fan_speed: Option<FanSpeed>,
        swing: Option<SwingState>,
    ) -> Result<(), String> {
        TadoConnector::set_zone_overlay(
            self, zone_id, zone_type, overlay_mode, mode, temperature, duration, fan_speed, swing,
        )
    }

    fn set_zone_off(&self, zone_id: ZoneId, zone_type: ZoneType) -> Result<(), String> {
        TadoConnector::set_zone_off(self, zone_id, zone_type)
    }

    fn reset_zone_overlay(&self, zone_id: ZoneId) -> Result<(), String> {
        TadoConnector::reset_zone_overlay(self, zone_id)
    }

    fn set_presence(&self, preset: PresetMode) -> Result<(), String> {
        TadoConnector::set_presence(self, preset)
    }

    fn set_temperature_offset(&self, serial: &str, offset: f64) -> Result<(), String> {
        TadoConnector::set_temperature_offset(self, serial, offset)
    }
}
