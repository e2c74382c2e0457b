//! Types exchanged with the robotic-vacuum vendor SDK.
//!
//! The SDK delivers per-device push events; the bridge only consumes the
//! clean-job stats report stream. Device descriptors are deserializable so a
//! registry can be seeded from a JSON manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VacuumId(pub String);

/// Job status carried by a stats report. Vendor spelling (`MANUAL_STOPPED`)
/// differs from the event type string the hub eventually sees.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CleanJobStatus {
    NoStatus,
    Cleaning,
    Finished,
    FinishedWithWarnings,
    ManualStopped,
}

impl CleanJobStatus {
    /// Whether the report describes a completed job rather than one still in
    /// progress (or the device idling with nothing to report).
    pub fn is_terminal(self) -> bool {
        !matches!(self, CleanJobStatus::NoStatus | CleanJobStatus::Cleaning)
    }
}

/// Clean-job stats report as pushed by the vendor SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub status: Option<CleanJobStatus>,
    pub area_cleaned_m2: Option<f64>,
    pub duration_seconds: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VacuumCapabilities {
    /// Device pushes clean-job stats reports.
    pub stats_report: Option<bool>,
    pub battery: Option<bool>,
    pub map: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VacuumDevice {
    pub id: Option<VacuumId>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub capabilities: Option<VacuumCapabilities>,
}

impl VacuumDevice {
    pub fn supports_stats_report(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.stats_report)
            .unwrap_or(false)
    }
}
