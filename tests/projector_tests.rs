use agvmon::decode::{encode, FLAG_WIDTH, WORD_WIDTH};
use agvmon::projector::*;
use agvmon::*;

fn snapshot(rows: Vec<AgvRecord>) -> Snapshot {
    Snapshot::new(rows).unwrap()
}

fn populated(id: CommunicationId) -> AgvRecord {
    let mut record = AgvRecord::new(id);
    record.enable_raw = Some(1);
    record.battery_raw = encode(75, WORD_WIDTH);
    record.screen_info_raw = encode(19, WORD_WIDTH);
    record.route = encode(12, WORD_WIDTH);
    record
}

#[test]
fn test_end_to_end_projection() {
    let classifier = Classifier::builtin();
    let view = project(&snapshot(vec![populated(1)]), 1, &classifier);

    assert!(view.available);
    assert!(view.enabled);
    assert!(!view.connected);
    assert_eq!(view.battery, Reading::Value(75));
    assert_eq!(view.battery_level, BatteryLevel::High);
    assert_eq!(view.route, Reading::Value(12));
    assert_eq!(view.location, "WINDSHIELD");
    assert_eq!(view.fault.severity, Severity::Warning);
    assert_eq!(view.fault.message, "Routing table: No next point");
    assert_eq!(view.state(), AgvState::Available);

    // Columns that were never set decode to the sentinel
    assert_eq!(view.point, Reading::NotAvailable);
    assert_eq!(view.zones.a.request, Reading::NotAvailable);
}

#[test]
fn test_record_with_only_id_is_unknown() {
    let classifier = Classifier::builtin();
    let view = project(&snapshot(vec![AgvRecord::new(4)]), 4, &classifier);
    assert!(!view.available);
    assert_eq!(view.state(), AgvState::Unknown);
    assert_eq!(view, AgvView::unknown(4));
}

#[test]
fn test_all_zero_record_is_unknown() {
    // Indistinguishable from "no data"; treated as unknown
    let mut record = AgvRecord::new(5);
    record.enable_raw = Some(0);
    record.comm_status = Some(0);
    record.battery_raw = Some(vec![0, 0]);
    record.route = Some(vec![]);
    record.timestamp = Some(String::new());
    let view = project(&snapshot(vec![record]), 5, &Classifier::builtin());
    assert!(!view.available);
}

#[test]
fn test_missing_record_is_unknown() {
    let view = project(&snapshot(vec![populated(1)]), 2, &Classifier::builtin());
    assert_eq!(view, AgvView::unknown(2));
}

#[test]
fn test_connected_and_zones() {
    let mut record = AgvRecord::new(2);
    record.comm_status = Some(1);
    record.zone_a_request = encode(1, FLAG_WIDTH);
    record.zone_a_busy = encode(0, FLAG_WIDTH);
    record.zone_b_request = encode(0, FLAG_WIDTH);
    record.zone_b_busy = encode(1, FLAG_WIDTH);
    record.point = encode(300, WORD_WIDTH);

    let view = project(&snapshot(vec![record]), 2, &Classifier::builtin());
    assert!(view.available);
    assert!(view.connected);
    assert!(!view.enabled);
    assert_eq!(view.zones.a.request, Reading::Value(1));
    assert_eq!(view.zones.a.busy, Reading::Value(0));
    assert_eq!(view.zones.b.busy, Reading::Value(1));
    assert_eq!(view.point, Reading::Value(300));
    // No screen info or route: default classifications
    assert_eq!(view.fault, FaultEntry::default());
    assert_eq!(view.location, "");
    assert_eq!(view.battery_level, BatteryLevel::Unknown);
}

#[test]
fn test_status_other_than_one_is_not_connected() {
    let mut record = populated(1);
    record.comm_status = Some(2);
    let view = project(&snapshot(vec![record]), 1, &Classifier::builtin());
    assert!(!view.connected);
}

#[test]
fn test_battery_levels() {
    assert_eq!(BatteryLevel::from_reading(Reading::Value(100)), BatteryLevel::High);
    assert_eq!(BatteryLevel::from_reading(Reading::Value(67)), BatteryLevel::High);
    assert_eq!(BatteryLevel::from_reading(Reading::Value(66)), BatteryLevel::Medium);
    assert_eq!(BatteryLevel::from_reading(Reading::Value(34)), BatteryLevel::Medium);
    assert_eq!(BatteryLevel::from_reading(Reading::Value(33)), BatteryLevel::Low);
    assert_eq!(BatteryLevel::from_reading(Reading::Value(0)), BatteryLevel::Low);
    assert_eq!(BatteryLevel::from_reading(Reading::NotAvailable), BatteryLevel::Unknown);
}

#[test]
fn test_battery_text_has_percent_only_for_values() {
    let classifier = Classifier::builtin();
    let view = project_record(&populated(1), &classifier);
    assert_eq!(view.battery_text(), "75%");

    let unknown = AgvView::unknown(2);
    assert_eq!(unknown.battery_text(), "N/A");

    let mut record = populated(3);
    record.battery_raw = Some(vec![0x01]);
    let short = project_record(&record, &classifier);
    assert_eq!(short.battery, Reading::NotAvailable);
    assert_eq!(short.battery_text(), "N/A");
}

#[test]
fn test_availability_transitions() {
    let mut projector = ViewProjector::new(Classifier::builtin(), vec![1, 2]);
    assert_eq!(projector.state(1), AgvState::Unknown);

    // AGV 1 comes online, AGV 2 has no row
    let views = projector.apply(&snapshot(vec![populated(1)]));
    assert_eq!(views.len(), 2);
    assert!(views[0].available);
    assert!(!views[1].available);
    assert_eq!(projector.state(1), AgvState::Available);
    assert_eq!(projector.state(2), AgvState::Unknown);

    // Same data again: no new transition
    projector.apply(&snapshot(vec![populated(1)]));
    assert_eq!(projector.tracker().history(1).len(), 1);

    // AGV 1 drops off-line
    projector.apply(&snapshot(vec![AgvRecord::new(1)]));
    assert_eq!(projector.state(1), AgvState::Unknown);

    let history = projector.tracker().history(1);
    assert_eq!(history.len(), 2);
    assert_eq!((history[0].from, history[0].to, history[0].observation), (AgvState::Unknown, AgvState::Available, 1));
    assert_eq!((history[1].from, history[1].to, history[1].observation), (AgvState::Available, AgvState::Unknown, 3));
    assert!(projector.tracker().history(2).is_empty());
}

#[test]
fn test_transition_history_is_bounded() {
    let mut projector = ViewProjector::new(Classifier::builtin(), vec![1]);
    let online = snapshot(vec![populated(1)]);
    let offline = snapshot(vec![AgvRecord::new(1)]);

    for _ in 0..20 {
        projector.apply(&online);
        projector.apply(&offline);
    }

    let history = projector.tracker().history(1);
    assert_eq!(history.len(), MAX_TRANSITION_HISTORY);
    // Oldest entries were dropped
    assert_eq!(history.last().unwrap().observation, 40);
    assert_eq!(history[0].observation, 40 - MAX_TRANSITION_HISTORY as u64 + 1);
}

#[test]
fn test_view_json_uses_sentinel_text() {
    let view = project(&snapshot(vec![populated(1)]), 1, &Classifier::builtin());
    let value = serde_json::to_value(&view).unwrap();
    assert_eq!(value["battery"], 75);
    assert_eq!(value["point"], "N/A");
    assert_eq!(value["fault"]["severity"], "warning");
    assert_eq!(value["location"], "WINDSHIELD");
    assert_eq!(value["battery_level"], "high");
}
