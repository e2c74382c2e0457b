//! End-to-end flow over the in-process plumbing: vendor state lands in a
//! controller, a dispatcher signal fires, and the entity republishes into the
//! hub's state store. No network involved; the controller is a local fake.

use home_bridge::connector::{TadoMode, ZoneController, ZoneSnapshot};
use home_bridge::entities::climate::{summarize_capabilities, ClimateEntity, ClimateTraits};
use home_bridge::entities::event::build_event_entities;
use home_bridge::hub::{Dispatcher, Hub, HvacMode, PresetMode, Signal};
use home_bridge::models::tado::{
    AirConditioningMode, DefaultOverlayTermination, FanSpeed, HomeState, OverlayMode, SwingState, Temperature,
    ZoneCapabilities, ZoneId, ZoneType,
};
use home_bridge::models::vacuum::{CleanJobStatus, StatsReport, VacuumDevice, VacuumId};
use home_bridge::vacuum::VacuumSession;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct ScriptedController {
    snapshot: RefCell<Option<ZoneSnapshot>>,
    geofence: RefCell<Option<HomeState>>,
}

impl ZoneController for ScriptedController {
    fn fallback(&self) -> Option<OverlayMode> {
        None
    }

    fn snapshot(&self, _zone_id: ZoneId) -> Option<ZoneSnapshot> {
        self.snapshot.borrow().clone()
    }

    fn geofence(&self) -> Option<HomeState> {
        self.geofence.borrow().clone()
    }

    fn auto_geofencing_supported(&self) -> bool {
        false
    }

    fn default_termination(&self, _zone_id: ZoneId) -> Option<DefaultOverlayTermination> {
        None
    }

    fn temperature_offset(&self, _serial: &str) -> Option<Temperature> {
        None
    }

    fn set_zone_overlay(
        &self,
        _zone_id: ZoneId,
        _zone_type: ZoneType,
        _overlay_mode: OverlayMode,
        _mode: Option<AirConditioningMode>,
        _temperature: Option<f64>,
        _duration: Option<i64>,
        _fan_speed: Option<FanSpeed>,
        _swing: Option<SwingState>,
    ) -> Result<(), String> {
        Ok(())
    }

    fn set_zone_off(&self, _zone_id: ZoneId, _zone_type: ZoneType) -> Result<(), String> {
        Ok(())
    }

    fn reset_zone_overlay(&self, _zone_id: ZoneId) -> Result<(), String> {
        Ok(())
    }

    fn set_presence(&self, _preset: PresetMode) -> Result<(), String> {
        Ok(())
    }

    fn set_temperature_offset(&self, _serial: &str, _offset: f64) -> Result<(), String> {
        Ok(())
    }
}

fn heating_traits() -> ClimateTraits {
    ClimateTraits {
        zone_type: ZoneType::Heating,
        hvac_modes: vec![HvacMode::Off, HvacMode::Auto, HvacMode::Heat],
        fan_modes: None,
        supports_swing: false,
        heat_min: Some(5.0),
        heat_max: Some(25.0),
        heat_step: Some(0.1),
        cool_min: None,
        cool_max: None,
        cool_step: None,
    }
}

fn snapshot(mode: TadoMode, target: f64) -> ZoneSnapshot {
    ZoneSnapshot {
        current_temp: Some(20.0),
        current_humidity: Some(50.0),
        target_temp: Some(target),
        mode: Some(mode),
        power_on: mode != TadoMode::Off,
        available: true,
        ..ZoneSnapshot::default()
    }
}

#[test]
fn zone_signal_drives_state_into_the_hub() {
    let hub = Hub::new();
    let dispatcher = Dispatcher::new();
    let controller = Rc::new(ScriptedController::default());
    *controller.snapshot.borrow_mut() = Some(snapshot(TadoMode::Heat, 21.0));

    let entity = Rc::new(RefCell::new(ClimateEntity::new(
        Rc::clone(&controller) as Rc<dyn ZoneController>,
        Rc::clone(&hub),
        "Living Room",
        ZoneId(1),
        None,
        heating_traits(),
    )));
    let entity_id = entity.borrow().entity_id().clone();

    let handle = Rc::clone(&entity);
    dispatcher.subscribe(Signal::ZoneData { home_id: 7, zone_id: 1 }, move || {
        handle.borrow_mut().on_zone_update();
    });

    // First poll tick.
    dispatcher.send(Signal::ZoneData { home_id: 7, zone_id: 1 });
    let doc = hub.state_of(&entity_id).expect("state written");
    assert_eq!(doc.state, "heat");
    assert_eq!(doc.attributes["temperature"], json!(21.0));

    // Vendor-side change lands wholesale on the next tick.
    *controller.snapshot.borrow_mut() = Some(snapshot(TadoMode::SmartSchedule, 18.0));
    dispatcher.send(Signal::ZoneData { home_id: 7, zone_id: 1 });
    let doc = hub.state_of(&entity_id).expect("state written");
    assert_eq!(doc.state, "auto");
    assert_eq!(doc.attributes["temperature"], json!(18.0));

    // A different zone's signal leaves this entity alone.
    *controller.snapshot.borrow_mut() = Some(snapshot(TadoMode::Off, 0.0));
    dispatcher.send(Signal::ZoneData { home_id: 7, zone_id: 2 });
    assert_eq!(hub.state_of(&entity_id).expect("state").state, "auto");
}

#[test]
fn capability_fixture_parses_into_traits() {
    let raw = std::fs::read_to_string("tests/data/zone-capabilities-ac.json").expect("fixture present");
    let capabilities: ZoneCapabilities = serde_json::from_str(&raw).expect("parse capabilities");

    let traits = summarize_capabilities("Bedroom AC", &capabilities).expect("zone has temperatures");
    assert_eq!(traits.zone_type, ZoneType::AirConditioning);
    assert!(traits.hvac_modes.contains(&HvacMode::Cool));
    assert!(traits.hvac_modes.contains(&HvacMode::FanOnly));
    assert!(traits.supports_swing);
    assert_eq!(traits.cool_min, Some(18.0));
    assert_eq!(traits.heat_max, Some(30.0));
}

#[test]
fn vacuum_report_flows_through_to_a_hub_event() {
    let hub = Hub::new();
    let devices: Vec<VacuumDevice> = serde_json::from_str(
        r#"[{"id": "E77077", "name": "Deebot Ozmo", "capabilities": {"statsReport": true}}]"#,
    )
    .expect("parse devices");
    let session = VacuumSession::new(devices);
    let entities = build_event_entities(&session, &hub);
    assert_eq!(entities.len(), 1);

    session.handle_report(
        &VacuumId("E77077".to_string()),
        &StatsReport {
            status: Some(CleanJobStatus::Cleaning),
            ..StatsReport::default()
        },
    );
    session.handle_report(
        &VacuumId("E77077".to_string()),
        &StatsReport {
            status: Some(CleanJobStatus::FinishedWithWarnings),
            area_cleaned_m2: Some(42.0),
            duration_seconds: Some(1800),
            start_time: None,
        },
    );

    let entity_id = entities[0].borrow().entity_id().clone();
    let events = hub.events_for(&entity_id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "finished_with_warnings");
    assert_eq!(hub.state_of(&entity_id).expect("state").state, "finished_with_warnings");
}
