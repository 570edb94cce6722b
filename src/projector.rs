//! View projection: one snapshot row to one typed per-AGV view model.
//!
//! This is the contract handed to any rendering layer. A viewer keeps one
//! [`ViewProjector`] for the vehicles it displays and feeds it every
//! delivered snapshot.

use crate::classify::{Classifier, FaultEntry};
use crate::decode::{decode, Reading, FLAG_WIDTH, WORD_WIDTH};
use crate::record::{AgvRecord, CommunicationId, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Transitions kept per vehicle.
pub const MAX_TRANSITION_HISTORY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgvState {
    Unknown,
    Available,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl BatteryLevel {
    pub fn from_reading(battery: Reading) -> Self {
        match battery {
            Reading::Value(pct) if pct > 66 => BatteryLevel::High,
            Reading::Value(pct) if pct > 33 => BatteryLevel::Medium,
            Reading::Value(_) => BatteryLevel::Low,
            Reading::NotAvailable => BatteryLevel::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneView {
    pub request: Reading,
    pub busy: Reading,
}

impl ZoneView {
    const UNKNOWN: ZoneView = ZoneView {
        request: Reading::NotAvailable,
        busy: Reading::NotAvailable,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Zones {
    pub a: ZoneView,
    pub b: ZoneView,
}

/// Per-AGV view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgvView {
    pub communication_id: CommunicationId,
    pub available: bool,
    pub agv_id: Option<u32>,
    pub enabled: bool,
    pub connected: bool,
    pub battery: Reading,
    pub battery_level: BatteryLevel,
    pub route: Reading,
    pub point: Reading,
    pub zones: Zones,
    pub fault: FaultEntry,
    pub location: String,
    pub timestamp: Option<String>,
}

impl AgvView {
    /// View of a vehicle with no usable row.
    pub fn unknown(communication_id: CommunicationId) -> Self {
        Self {
            communication_id,
            available: false,
            agv_id: None,
            enabled: false,
            connected: false,
            battery: Reading::NotAvailable,
            battery_level: BatteryLevel::Unknown,
            route: Reading::NotAvailable,
            point: Reading::NotAvailable,
            zones: Zones {
                a: ZoneView::UNKNOWN,
                b: ZoneView::UNKNOWN,
            },
            fault: FaultEntry::default(),
            location: String::new(),
            timestamp: None,
        }
    }

    pub fn state(&self) -> AgvState {
        if self.available {
            AgvState::Available
        } else {
            AgvState::Unknown
        }
    }

    /// Battery as shown to operators: `"75%"`, or the bare sentinel.
    pub fn battery_text(&self) -> String {
        match self.battery {
            Reading::Value(percent) => format!("{}%", percent),
            Reading::NotAvailable => self.battery.to_string(),
        }
    }
}

fn is_falsy_bytes(field: &Option<Vec<u8>>) -> bool {
    field.as_deref().map_or(true, |bytes| bytes.iter().all(|&b| b == 0))
}

/// True when every field except the communication id is absent or falsy.
///
/// Such a row cannot be told apart from a vehicle that legitimately reports
/// all zeros; it is treated as "no data".
pub fn is_ghost(record: &AgvRecord) -> bool {
    record.agv_id.map_or(true, |v| v == 0)
        && record.enable_raw.map_or(true, |v| v == 0)
        && record.comm_status.map_or(true, |v| v == 0)
        && is_falsy_bytes(&record.route)
        && is_falsy_bytes(&record.point)
        && is_falsy_bytes(&record.zone_a_request)
        && is_falsy_bytes(&record.zone_a_busy)
        && is_falsy_bytes(&record.zone_b_request)
        && is_falsy_bytes(&record.zone_b_busy)
        && is_falsy_bytes(&record.battery_raw)
        && is_falsy_bytes(&record.screen_info_raw)
        && record.timestamp.as_deref().map_or(true, str::is_empty)
}

/// Decode and classify one row.
pub fn project_record(record: &AgvRecord, classifier: &Classifier) -> AgvView {
    if is_ghost(record) {
        return AgvView::unknown(record.communication_id);
    }

    let battery = decode(record.battery_raw.as_deref(), WORD_WIDTH);
    let route = decode(record.route.as_deref(), WORD_WIDTH);
    let screen_info = decode(record.screen_info_raw.as_deref(), WORD_WIDTH);

    AgvView {
        communication_id: record.communication_id,
        available: true,
        agv_id: record.agv_id,
        enabled: record.enable_raw.map_or(false, |v| v != 0),
        connected: record.comm_status == Some(1),
        battery,
        battery_level: BatteryLevel::from_reading(battery),
        route,
        point: decode(record.point.as_deref(), WORD_WIDTH),
        zones: Zones {
            a: ZoneView {
                request: decode(record.zone_a_request.as_deref(), FLAG_WIDTH),
                busy: decode(record.zone_a_busy.as_deref(), FLAG_WIDTH),
            },
            b: ZoneView {
                request: decode(record.zone_b_request.as_deref(), FLAG_WIDTH),
                busy: decode(record.zone_b_busy.as_deref(), FLAG_WIDTH),
            },
        },
        fault: classifier.faults.classify(screen_info),
        location: classifier.locations.classify(route).to_string(),
        timestamp: record.timestamp.clone(),
    }
}

/// Project the first row matching `id`; no row gives an unknown view.
pub fn project(snapshot: &Snapshot, id: CommunicationId, classifier: &Classifier) -> AgvView {
    snapshot
        .find(id)
        .map(|record| project_record(record, classifier))
        .unwrap_or_else(|| AgvView::unknown(id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub communication_id: CommunicationId,
    pub from: AgvState,
    pub to: AgvState,
    /// Index of the snapshot that caused the transition.
    pub observation: u64,
}

#[derive(Debug)]
struct AgvHistory {
    state: AgvState,
    transitions: heapless::Vec<Transition, MAX_TRANSITION_HISTORY>,
}

impl Default for AgvHistory {
    fn default() -> Self {
        Self {
            state: AgvState::Unknown,
            transitions: heapless::Vec::new(),
        }
    }
}

/// Per-vehicle Unknown/Available state machine.
#[derive(Debug, Default)]
pub struct AvailabilityTracker {
    vehicles: BTreeMap<CommunicationId, AgvHistory>,
    observations: u64,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every vehicle starts out unknown.
    pub fn state(&self, id: CommunicationId) -> AgvState {
        self.vehicles.get(&id).map_or(AgvState::Unknown, |h| h.state)
    }

    /// Count one delivered snapshot. Call once per snapshot, before observing
    /// its views.
    pub fn begin_observation(&mut self) -> u64 {
        self.observations += 1;
        self.observations
    }

    /// Record the state shown by `view`, returning the transition if it changed.
    pub fn observe(&mut self, view: &AgvView) -> Option<Transition> {
        let history = self.vehicles.entry(view.communication_id).or_default();
        let to = view.state();
        if history.state == to {
            return None;
        }

        let transition = Transition {
            communication_id: view.communication_id,
            from: history.state,
            to,
            observation: self.observations,
        };
        history.state = to;

        if history.transitions.is_full() {
            history.transitions.remove(0);
        }
        let _ = history.transitions.push(transition);

        info!(agv = view.communication_id, from = ?transition.from, to = ?transition.to, "AGV availability changed");
        Some(transition)
    }

    /// Most recent transitions for `id`, oldest first.
    pub fn history(&self, id: CommunicationId) -> &[Transition] {
        self.vehicles
            .get(&id)
            .map(|h| h.transitions.as_slice())
            .unwrap_or(&[])
    }
}

/// Per-subscriber projector for a fixed set of vehicles.
#[derive(Debug)]
pub struct ViewProjector {
    classifier: Classifier,
    vehicles: Vec<CommunicationId>,
    tracker: AvailabilityTracker,
}

impl ViewProjector {
    pub fn new(classifier: Classifier, vehicles: Vec<CommunicationId>) -> Self {
        Self {
            classifier,
            vehicles,
            tracker: AvailabilityTracker::new(),
        }
    }

    /// Project every monitored vehicle from one delivered snapshot.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Vec<AgvView> {
        self.tracker.begin_observation();
        self.vehicles
            .iter()
            .map(|&id| {
                let view = project(snapshot, id, &self.classifier);
                self.tracker.observe(&view);
                view
            })
            .collect()
    }

    pub fn state(&self, id: CommunicationId) -> AgvState {
        self.tracker.state(id)
    }

    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    pub fn vehicles(&self) -> &[CommunicationId] {
        &self.vehicles
    }
}
