//! Last-job event entities for vacuum devices. Each entity forwards a
//! filtered projection of its device's stats-report stream into the hub's
//! event trigger mechanism: in-progress statuses are discarded, terminal
//! statuses map to one of three fixed event types.

use crate::hub::{EntityId, Hub, StateDocument};
use crate::models::vacuum::{CleanJobStatus, StatsReport, VacuumId};
use crate::utils::slugify;
use crate::vacuum::VacuumSession;
use chrono::Utc;
use log::debug;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

pub const EVENT_TYPES: [&str; 3] = ["finished", "finished_with_warnings", "manually_stopped"];

pub struct LastJobEventEntity {
    hub: Rc<Hub>,
    entity_id: EntityId,
    device_id: VacuumId,
    last_event_type: Option<String>,
}

impl LastJobEventEntity {
    pub fn new(hub: Rc<Hub>, device_name: &str, device_id: VacuumId) -> LastJobEventEntity {
        LastJobEventEntity {
            hub,
            entity_id: EntityId(format!("event.{}_last_job", slugify(device_name))),
            device_id,
            last_event_type: None,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// One pushed report. Triggers only on job done; nothing is retried or
    /// re-delivered for reports that arrive without a terminal status.
    pub fn on_report(&mut self, report: &StatsReport) {
        let Some(status) = report.status else { return };
        if !status.is_terminal() {
            return;
        }

        let event_type = match status {
            CleanJobStatus::ManualStopped => "manually_stopped",
            CleanJobStatus::Finished => "finished",
            CleanJobStatus::FinishedWithWarnings => "finished_with_warnings",
            CleanJobStatus::NoStatus | CleanJobStatus::Cleaning => return,
        };

        self.hub.trigger_event(&self.entity_id, event_type);
        self.last_event_type = Some(event_type.to_string());
        self.publish();
    }

    fn publish(&self) {
        let mut attributes = serde_json::Map::new();
        attributes.insert("device_id".to_string(), json!(self.device_id.0));
        attributes.insert("event_types".to_string(), json!(EVENT_TYPES));
        attributes.insert("triggered_at".to_string(), json!(Utc::now().to_rfc3339()));
        self.hub.write_state(
            &self.entity_id,
            StateDocument {
                state: self.last_event_type.clone().unwrap_or_default(),
                attributes,
            },
        );
    }
}

/// One event entity per registered device that pushes stats reports; devices
/// without the capability are skipped.
pub fn build_event_entities(
    session: &Rc<VacuumSession>,
    hub: &Rc<Hub>,
) -> Vec<Rc<RefCell<LastJobEventEntity>>> {
    let mut entities = Vec::new();
    for device in session.devices() {
        let (Some(device_id), Some(name)) = (device.id.clone(), device.name.as_deref()) else {
            continue;
        };
        if !device.supports_stats_report() {
            debug!("Skipping device {}: no stats report capability", device_id.0);
            continue;
        }

        let entity = Rc::new(RefCell::new(LastJobEventEntity::new(
            Rc::clone(hub),
            name,
            device_id.clone(),
        )));
        let handle = Rc::clone(&entity);
        session.subscribe(device_id, move |report| {
            handle.borrow_mut().on_report(report);
        });
        entities.push(entity);
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vacuum::VacuumDevice;

    fn report(status: CleanJobStatus) -> StatsReport {
        StatsReport {
            status: Some(status),
            ..StatsReport::default()
        }
    }

    fn entity(hub: &Rc<Hub>) -> LastJobEventEntity {
        LastJobEventEntity::new(Rc::clone(hub), "Deebot Ozmo", VacuumId("E77077".to_string()))
    }

    #[test]
    fn in_progress_statuses_never_trigger() {
        let hub = Hub::new();
        let mut entity = entity(&hub);

        entity.on_report(&report(CleanJobStatus::NoStatus));
        entity.on_report(&report(CleanJobStatus::Cleaning));
        entity.on_report(&StatsReport::default());

        assert!(hub.events_for(entity.entity_id()).is_empty());
        assert!(hub.state_of(entity.entity_id()).is_none());
    }

    #[test]
    fn manual_stop_maps_to_manually_stopped() {
        let hub = Hub::new();
        let mut entity = entity(&hub);

        entity.on_report(&report(CleanJobStatus::ManualStopped));

        let events = hub.events_for(entity.entity_id());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "manually_stopped");
    }

    #[test]
    fn terminal_statuses_map_to_lowercase_names() {
        let hub = Hub::new();
        let mut entity = entity(&hub);

        entity.on_report(&report(CleanJobStatus::Finished));
        entity.on_report(&report(CleanJobStatus::FinishedWithWarnings));

        let types: Vec<String> = hub
            .events_for(entity.entity_id())
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(types, vec!["finished".to_string(), "finished_with_warnings".to_string()]);
    }

    #[test]
    fn state_reflects_latest_event() {
        let hub = Hub::new();
        let mut entity = entity(&hub);

        entity.on_report(&report(CleanJobStatus::Finished));
        entity.on_report(&report(CleanJobStatus::ManualStopped));

        let doc = hub.state_of(entity.entity_id()).unwrap();
        assert_eq!(doc.state, "manually_stopped");
        assert_eq!(doc.attributes["device_id"], json!("E77077"));
    }

    #[test]
    fn only_capable_devices_get_entities() {
        let hub = Hub::new();
        let devices: Vec<VacuumDevice> = serde_json::from_str(
            r#"[
                {"id": "E1", "name": "Able", "capabilities": {"statsReport": true}},
                {"id": "E2", "name": "Basic", "capabilities": {"statsReport": false}},
                {"id": "E3", "name": "Blank"}
            ]"#,
        )
        .unwrap();
        let session = VacuumSession::new(devices);

        let entities = build_event_entities(&session, &hub);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].borrow().entity_id().0, "event.able_last_job");
    }

    #[test]
    fn session_delivery_drives_the_entity() {
        let hub = Hub::new();
        let devices: Vec<VacuumDevice> = serde_json::from_str(
            r#"[{"id": "E1", "name": "Able", "capabilities": {"statsReport": true}}]"#,
        )
        .unwrap();
        let session = VacuumSession::new(devices);
        let entities = build_event_entities(&session, &hub);

        session.handle_report(&VacuumId("E1".to_string()), &report(CleanJobStatus::Finished));

        let events = hub.events_for(entities[0].borrow().entity_id());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "finished");
    }
}
