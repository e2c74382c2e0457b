//! Vacuum vendor session: a device registry plus per-device stats-report
//! subscriptions. The vendor transport itself lives behind `handle_report`;
//! whatever drives it (SDK callback, replayed capture) feeds reports in
//! serially per device.

use crate::models::vacuum::{StatsReport, VacuumDevice, VacuumId};
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

type ReportCallback = Rc<dyn Fn(&StatsReport)>;

#[derive(Default)]
pub struct VacuumSession {
    devices: Vec<VacuumDevice>,
    subscribers: RefCell<HashMap<VacuumId, Vec<ReportCallback>>>,
}

impl VacuumSession {
    pub fn new(devices: Vec<VacuumDevice>) -> Rc<VacuumSession> {
        Rc::new(VacuumSession {
            devices,
            subscribers: RefCell::new(HashMap::new()),
        })
    }

    /// Seed the registry from a JSON manifest (an array of device
    /// descriptors).
    pub fn from_manifest(path: &Path) -> Result<Rc<VacuumSession>, String> {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("reading vacuum manifest {}: {}", path.display(), e))?;
        let devices: Vec<VacuumDevice> = serde_json::from_str(&raw)
            .map_err(|e| format!("parsing vacuum manifest {}: {}", path.display(), e))?;
        debug!("Vacuum manifest lists {} device(s)", devices.len());
        Ok(VacuumSession::new(devices))
    }

    pub fn devices(&self) -> &[VacuumDevice] {
        &self.devices
    }

    pub fn subscribe(&self, device_id: VacuumId, callback: impl Fn(&StatsReport) + 'static) {
        self.subscribers
            .borrow_mut()
            .entry(device_id)
            .or_default()
            .push(Rc::new(callback));
    }

    /// Deliver one pushed report to the device's subscribers, in
    /// registration order. At-most-once: a report for an unknown or
    /// unsubscribed device is dropped.
    pub fn handle_report(&self, device_id: &VacuumId, report: &StatsReport) {
        let callbacks: Vec<ReportCallback> = match self.subscribers.borrow().get(device_id) {
            Some(callbacks) => callbacks.to_vec(),
            None => {
                warn!("Dropping stats report for unknown device {}", device_id.0);
                return;
            }
        };
        for callback in callbacks {
            callback(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vacuum::CleanJobStatus;

    fn device(id: &str) -> VacuumDevice {
        serde_json::from_str(&format!(
            r#"{{"id": "{}", "name": "Deebot", "capabilities": {{"statsReport": true}}}}"#,
            id
        ))
        .unwrap()
    }

    #[test]
    fn reports_reach_only_the_matching_device() {
        let session = VacuumSession::new(vec![device("E0001"), device("E0002")]);
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        session.subscribe(VacuumId("E0001".to_string()), move |_| {
            sink.borrow_mut().push("E0001".to_string());
        });

        let report = StatsReport {
            status: Some(CleanJobStatus::Finished),
            ..StatsReport::default()
        };
        session.handle_report(&VacuumId("E0001".to_string()), &report);
        session.handle_report(&VacuumId("E0002".to_string()), &report);

        assert_eq!(*seen.borrow(), vec!["E0001".to_string()]);
    }

    #[test]
    fn manifest_round_trip() {
        let manifest = r#"[
            {"id": "E77077", "name": "Deebot Ozmo", "model": "yna5xi",
             "capabilities": {"statsReport": true, "battery": true}},
            {"id": "E88088", "name": "Mopbot", "capabilities": {"statsReport": false}}
        ]"#;
        let devices: Vec<VacuumDevice> = serde_json::from_str(manifest).unwrap();
        let session = VacuumSession::new(devices);

        assert_eq!(session.devices().len(), 2);
        assert!(session.devices()[0].supports_stats_report());
        assert!(!session.devices()[1].supports_stats_report());
    }
}
