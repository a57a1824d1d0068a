use crate::model::{DeviceStatus, LogEntry};

/// Operation value the appliance reports when a cleaning cycle stalls
pub const STUCK_MARKER: &str = "Clean_Pause";

/// Decides whether the device needs the reset sequence.
///
/// An offline device, or one whose `online` flag is missing or not a boolean,
/// always needs a reset. Otherwise any history entry whose value is the
/// stuck marker triggers it.
pub fn needs_reset(status: &DeviceStatus, history: &[LogEntry]) -> bool {
    if status.online.present() != Some(&true) {
        return true;
    }

    history
        .iter()
        .any(|entry| entry.value.present().map(String::as_str) == Some(STUCK_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;
    use serde_json::{json, Map, Value};
    use std::collections::BTreeMap;

    fn status(online: Field<bool>) -> DeviceStatus {
        DeviceStatus {
            online,
            name: None,
            data_points: BTreeMap::new(),
        }
    }

    fn entry(value: &str) -> LogEntry {
        LogEntry {
            code: Some("work_state".to_string()),
            value: Field::Present(value.to_string()),
            event_time: Field::Present(1_700_000_000_000),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_offline_always_needs_reset() {
        let offline = status(Field::Present(false));

        assert!(needs_reset(&offline, &[]));
        assert!(needs_reset(&offline, &[entry("Idle")]));
        assert!(needs_reset(&offline, &[entry(STUCK_MARKER)]));
    }

    #[test]
    fn test_missing_or_malformed_online_needs_reset() {
        assert!(needs_reset(&status(Field::Absent), &[entry("Idle")]));
        assert!(needs_reset(
            &status(Field::WrongType(json!("true"))),
            &[entry("Idle")]
        ));
    }

    #[test]
    fn test_online_with_clean_history() {
        let online = status(Field::Present(true));

        assert!(!needs_reset(&online, &[]));
        assert!(!needs_reset(&online, &[entry("Idle"), entry("Cleaning"), entry("Standby")]));
    }

    #[test]
    fn test_stuck_marker_in_any_position() {
        let online = status(Field::Present(true));

        for position in 0..5 {
            let mut history: Vec<LogEntry> = (0..5).map(|_| entry("Idle")).collect();
            history[position] = entry(STUCK_MARKER);
            assert!(needs_reset(&online, &history), "position {}", position);
        }
    }

    #[test]
    fn test_marker_must_match_exactly() {
        let online = status(Field::Present(true));
        let history = vec![entry("clean_pause"), entry("Clean_Pause ")];

        assert!(!needs_reset(&online, &history));
    }

    #[test]
    fn test_non_string_value_ignored() {
        let online = status(Field::Present(true));
        let mut odd = entry("Idle");
        odd.value = Field::WrongType(Value::Bool(true));

        assert!(!needs_reset(&online, &[odd]));
    }

    #[test]
    fn test_inputs_untouched() {
        let online = status(Field::Present(true));
        let history = vec![entry(STUCK_MARKER)];
        let (status_before, history_before) = (online.clone(), history.clone());

        needs_reset(&online, &history);

        assert_eq!(online, status_before);
        assert_eq!(history, history_before);
    }
}
