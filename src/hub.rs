//! Hub-side entity contracts: the normalized vocabulary entities publish in,
//! the keyed state/event store, and the update-signal dispatcher.
//!
//! Everything here is deliberately small; the real platform owns entity
//! lifecycle and service routing. The bridge only needs a place to write
//! states, a place to trigger events, and home/zone-scoped signals.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// =====================
// Normalized climate vocabulary
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Dry,
    FanOnly,
    Auto,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::HeatCool => "heat_cool",
            HvacMode::Dry => "dry",
            HvacMode::FanOnly => "fan_only",
            HvacMode::Auto => "auto",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HvacAction {
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
    Fan,
}

impl HvacAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HvacAction::Off => "off",
            HvacAction::Idle => "idle",
            HvacAction::Heating => "heating",
            HvacAction::Cooling => "cooling",
            HvacAction::Drying => "drying",
            HvacAction::Fan => "fan",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FanMode {
    Auto,
    Low,
    Medium,
    High,
}

impl FanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            FanMode::Low => "low",
            FanMode::Medium => "medium",
            FanMode::High => "high",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SwingMode {
    On,
    Off,
}

impl SwingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SwingMode::On => "on",
            SwingMode::Off => "off",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PresetMode {
    Home,
    Away,
    Auto,
}

impl PresetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PresetMode::Home => "home",
            PresetMode::Away => "away",
            PresetMode::Auto => "auto",
        }
    }
}

// =====================
// Entity state documents
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub String);

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single entity state as the hub stores it: primary state string plus a
/// free-form attribute map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateDocument {
    pub state: String,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredEvent {
    pub entity_id: EntityId,
    pub event_type: String,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct HubInner {
    states: HashMap<EntityId, StateDocument>,
    events: Vec<TriggeredEvent>,
}

/// Keyed state store and event trigger log. Single-threaded by design: the
/// hub's loop delivers notifications serially per device.
#[derive(Default)]
pub struct Hub {
    inner: RefCell<HubInner>,
}

impl Hub {
    pub fn new() -> Rc<Hub> {
        Rc::new(Hub::default())
    }

    pub fn write_state(&self, entity_id: &EntityId, doc: StateDocument) {
        debug!("hub: {} -> {}", entity_id, doc.state);
        self.inner.borrow_mut().states.insert(entity_id.clone(), doc);
    }

    pub fn state_of(&self, entity_id: &EntityId) -> Option<StateDocument> {
        self.inner.borrow().states.get(entity_id).cloned()
    }

    pub fn trigger_event(&self, entity_id: &EntityId, event_type: &str) {
        info!("hub: event {} from {}", event_type, entity_id);
        self.inner.borrow_mut().events.push(TriggeredEvent {
            entity_id: entity_id.clone(),
            event_type: event_type.to_string(),
            at: Utc::now(),
        });
    }

    pub fn events_for(&self, entity_id: &EntityId) -> Vec<TriggeredEvent> {
        self.inner
            .borrow()
            .events
            .iter()
            .filter(|e| &e.entity_id == entity_id)
            .cloned()
            .collect()
    }
}

// =====================
// Update-signal dispatch
// =====================

/// Scoped update signals fired by connectors after a data refresh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Signal {
    HomeData { home_id: i64 },
    ZoneData { home_id: i64, zone_id: i64 },
}

type Callback = Rc<dyn Fn()>;

/// Keyed callback dispatcher. Callbacks for one signal run in registration
/// order; delivery is strictly serial.
#[derive(Default)]
pub struct Dispatcher {
    subscribers: RefCell<HashMap<Signal, Vec<Callback>>>,
}

impl Dispatcher {
    pub fn new() -> Rc<Dispatcher> {
        Rc::new(Dispatcher::default())
    }

    pub fn subscribe(&self, signal: Signal, callback: impl Fn() + 'static) {
        self.subscribers
            .borrow_mut()
            .entry(signal)
            .or_default()
            .push(Rc::new(callback));
    }

    pub fn send(&self, signal: Signal) {
        // Snapshot under the borrow so a callback may subscribe re-entrantly.
        let callbacks: Vec<Callback> = self
            .subscribers
            .borrow()
            .get(&signal)
            .map(|v| v.to_vec())
            .unwrap_or_default();
        for cb in callbacks {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_is_keyed_and_ordered() {
        let dispatcher = Dispatcher::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s1 = seen.clone();
        dispatcher.subscribe(Signal::ZoneData { home_id: 1, zone_id: 1 }, move || {
            s1.borrow_mut().push("zone1-a");
        });
        let s2 = seen.clone();
        dispatcher.subscribe(Signal::ZoneData { home_id: 1, zone_id: 1 }, move || {
            s2.borrow_mut().push("zone1-b");
        });
        let s3 = seen.clone();
        dispatcher.subscribe(Signal::ZoneData { home_id: 1, zone_id: 2 }, move || {
            s3.borrow_mut().push("zone2");
        });

        dispatcher.send(Signal::ZoneData { home_id: 1, zone_id: 1 });
        assert_eq!(*seen.borrow(), vec!["zone1-a", "zone1-b"]);

        dispatcher.send(Signal::HomeData { home_id: 1 });
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn hub_stores_latest_state_wholesale() {
        let hub = Hub::new();
        let id = EntityId("climate.living_room".to_string());

        let mut first = StateDocument {
            state: "heat".to_string(),
            ..Default::default()
        };
        first.attributes.insert("temperature".into(), 21.0.into());
        hub.write_state(&id, first);

        let second = StateDocument {
            state: "off".to_string(),
            ..Default::default()
        };
        hub.write_state(&id, second.clone());

        // No merging: the previous attribute set is gone.
        assert_eq!(hub.state_of(&id), Some(second));
    }

    #[test]
    fn event_log_is_per_entity() {
        let hub = Hub::new();
        let a = EntityId("event.vac_a".to_string());
        let b = EntityId("event.vac_b".to_string());

        hub.trigger_event(&a, "finished");
        hub.trigger_event(&b, "manually_stopped");

        let events = hub.events_for(&a);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "finished");
    }
}
