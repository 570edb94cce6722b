//! Static classification tables: screen-info fault codes and route labels.
//!
//! Lookups never fail. An unknown fault code resolves to an empty message with
//! severity [`Severity::None`]; an unknown route resolves to an empty label.
//! Both tables can be extended or overridden from the config file.

use crate::decode::Reading;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Informative,
    Warning,
    /// The vehicle has stopped and needs intervention.
    #[serde(alias = "machine-stops")]
    Halting,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Informative => "informative",
            Severity::Warning => "warning",
            Severity::Halting => "halting",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEntry {
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
}

impl FaultEntry {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

const BUILTIN_FAULTS: &[(u16, &str, Severity)] = &[
    (1, "Emergency stop pressed", Severity::Halting),
    (2, "Front bumper activated", Severity::Halting),
    (3, "Rear bumper activated", Severity::Halting),
    (4, "Safety scanner: protective field violated", Severity::Halting),
    (5, "Safety scanner: warning field occupied", Severity::Warning),
    (6, "Battery low", Severity::Warning),
    (7, "Battery critical", Severity::Halting),
    (8, "Charging", Severity::Informative),
    (9, "Lost magnetic track", Severity::Halting),
    (10, "Waiting for traffic zone", Severity::Informative),
    (11, "Traffic zone timeout", Severity::Warning),
    (12, "Drive motor overcurrent", Severity::Halting),
    (13, "Drive motor overtemperature", Severity::Warning),
    (14, "Lift mechanism fault", Severity::Halting),
    (15, "Load not detected", Severity::Warning),
    (16, "Waiting for operator release", Severity::Informative),
    (17, "Manual mode active", Severity::Informative),
    (18, "RFID tag not read", Severity::Warning),
    (19, "Routing table: No next point", Severity::Warning),
    (20, "Routing table: Route not found", Severity::Halting),
    (21, "Wireless link lost", Severity::Warning),
    (22, "Mission completed", Severity::Informative),
];

const BUILTIN_LOCATIONS: &[(u16, &str)] = &[
    (1, "WAREHOUSE"),
    (2, "RECEIVING"),
    (3, "BODY SHOP"),
    (4, "PAINT SHOP"),
    (5, "ENGINE LINE"),
    (6, "SEATS"),
    (7, "DOORS"),
    (8, "DASHBOARD"),
    (9, "WHEELS"),
    (10, "BUMPERS"),
    (11, "GLASS STORE"),
    (12, "WINDSHIELD"),
    (13, "FINAL ASSEMBLY"),
    (14, "QUALITY"),
    (15, "SHIPPING"),
    (20, "CHARGING STATION"),
    (21, "PARKING"),
    (22, "MAINTENANCE"),
];

/// Screen-info code to fault entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultTable {
    entries: BTreeMap<u16, FaultEntry>,
}

impl FaultTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN_FAULTS
            .iter()
            .map(|&(code, message, severity)| (code, FaultEntry::new(message, severity)))
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, code: u16) -> FaultEntry {
        self.entries.get(&code).cloned().unwrap_or_default()
    }

    /// Classify a decoded screen-info field; the sentinel classifies as unknown.
    pub fn classify(&self, code: Reading) -> FaultEntry {
        code.value().map(|c| self.lookup(c)).unwrap_or_default()
    }

    /// Add or replace entries.
    pub fn merge(&mut self, overrides: impl IntoIterator<Item = (u16, FaultEntry)>) {
        self.entries.extend(overrides);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Route number to location label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationTable {
    labels: BTreeMap<u16, String>,
}

impl LocationTable {
    pub fn builtin() -> Self {
        let labels = BUILTIN_LOCATIONS
            .iter()
            .map(|&(route, label)| (route, label.to_string()))
            .collect();
        Self { labels }
    }

    pub fn lookup(&self, route: u16) -> &str {
        self.labels.get(&route).map(String::as_str).unwrap_or("")
    }

    pub fn classify(&self, route: Reading) -> &str {
        route.value().map(|r| self.lookup(r)).unwrap_or("")
    }

    pub fn merge(&mut self, overrides: impl IntoIterator<Item = (u16, String)>) {
        self.labels.extend(overrides);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Both tables, as handed to the view projector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    pub faults: FaultTable,
    pub locations: LocationTable,
}

impl Classifier {
    pub fn builtin() -> Self {
        Self {
            faults: FaultTable::builtin(),
            locations: LocationTable::builtin(),
        }
    }
}
