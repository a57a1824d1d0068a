use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

pub const STUCK_OPERATION: &str = "Clean_Pause";
const DEVICE_NAME: &str = "Simulated litter box";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Online, last operations are normal
    Idle,
    /// Online, a cleaning cycle stalled in `Clean_Pause`
    Stuck,
    /// Device not reachable by the cloud
    Offline,
    /// Online with no reports in the last ten minutes
    NoLogs,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub code: String,
    pub value: String,
    pub event_time: i64,
    pub event_from: String,
}

#[derive(Debug)]
pub struct LitterBox {
    pub device_id: String,
    pub online: bool,
    pub powered: bool,
    pub operation: String,
    pub cat_weight: u32,
    pub cleanings_today: u32,
    /// Newest last
    events: Vec<Event>,
}

impl LitterBox {
    pub fn new(device_id: String, scenario: Scenario, now_ms: i64, rng: &mut impl Rng) -> Self {
        let mut device = Self {
            device_id,
            online: scenario != Scenario::Offline,
            powered: true,
            operation: "Standby".to_string(),
            cat_weight: rng.gen_range(35..65),
            cleanings_today: rng.gen_range(0..6),
            events: Vec::new(),
        };

        if scenario != Scenario::NoLogs {
            let mut t = now_ms - 9 * 60 * 1000;
            for op in ["Standby", "Cleaning", "Standby"] {
                device.record("operation", op, t);
                t += rng.gen_range(30_000..90_000);
            }
            let weight = device.cat_weight.to_string();
            device.record("cat_weight", &weight, t);
        }

        if scenario == Scenario::Stuck {
            device.operation = STUCK_OPERATION.to_string();
            device.record("operation", STUCK_OPERATION, now_ms - 60_000);
        }

        device
    }

    fn record(&mut self, code: &str, value: &str, event_time: i64) {
        self.events.push(Event {
            code: code.to_string(),
            value: value.to_string(),
            event_time,
            event_from: "1".to_string(),
        });
    }

    pub fn status_result(&self) -> Value {
        json!({
            "id": self.device_id,
            "name": DEVICE_NAME,
            "online": self.online,
            "status": [
                {"code": "switch", "value": self.powered},
                {"code": "work_state", "value": self.operation},
                {"code": "manual_clean", "value": false},
                {"code": "cat_weight", "value": self.cat_weight},
                {"code": "excretion_times_day", "value": self.cleanings_today},
            ]
        })
    }

    /// Events inside `[start, end]`, most recent first
    pub fn events_between(&self, start: i64, end: i64) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.event_time >= start && e.event_time <= end)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.event_time.cmp(&a.event_time));
        events
    }

    /// Applies one data point command the way the appliance would
    pub fn apply(&mut self, code: &str, value: &Value, now_ms: i64) -> Result<(), String> {
        if !self.online {
            return Err("device is offline".to_string());
        }

        match (code, value.as_bool()) {
            ("switch", Some(on)) => {
                self.powered = on;
                self.record("switch", if on { "true" } else { "false" }, now_ms);
                if on && self.operation == STUCK_OPERATION {
                    self.operation = "Standby".to_string();
                }
                Ok(())
            }
            ("manual_clean", Some(true)) => {
                if !self.powered {
                    return Err("device is powered off".to_string());
                }
                self.cleanings_today += 1;
                self.record("operation", "Cleaning", now_ms);
                self.operation = "Standby".to_string();
                self.record("operation", "Standby", now_ms + 1);
                Ok(())
            }
            ("manual_clean", Some(false)) => Ok(()),
            _ => Err("command or value not support".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NOW: i64 = 1_700_000_600_000;

    fn device(scenario: Scenario) -> LitterBox {
        let mut rng = StdRng::seed_from_u64(7);
        LitterBox::new("bf01".to_string(), scenario, NOW, &mut rng)
    }

    fn window(device: &LitterBox) -> Vec<Event> {
        device.events_between(NOW - 600_000, NOW)
    }

    #[test]
    fn test_idle_has_recent_normal_events() {
        let device = device(Scenario::Idle);
        let events = window(&device);

        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.value != STUCK_OPERATION));
        assert!(events.windows(2).all(|w| w[0].event_time >= w[1].event_time));
    }

    #[test]
    fn test_stuck_reports_clean_pause_first() {
        let device = device(Scenario::Stuck);
        let events = window(&device);

        assert_eq!(events[0].value, STUCK_OPERATION);
        assert_eq!(device.status_result()["status"][1]["value"], STUCK_OPERATION);
    }

    #[test]
    fn test_no_logs_scenario() {
        let device = device(Scenario::NoLogs);

        assert!(window(&device).is_empty());
        assert_eq!(device.status_result()["online"], true);
    }

    #[test]
    fn test_offline_rejects_commands() {
        let mut device = device(Scenario::Offline);

        assert_eq!(device.status_result()["online"], false);
        assert_eq!(
            device.apply("switch", &json!(false), NOW),
            Err("device is offline".to_string())
        );
    }

    #[test]
    fn test_reset_sequence_clears_stuck_state() {
        let mut device = device(Scenario::Stuck);

        device.apply("switch", &json!(false), NOW).unwrap();
        assert!(!device.powered);
        device.apply("switch", &json!(true), NOW + 1000).unwrap();
        device.apply("manual_clean", &json!(true), NOW + 3000).unwrap();

        assert_eq!(device.operation, "Standby");
        let latest = device.events_between(NOW, NOW + 5000);
        assert_eq!(latest[0].value, "Standby");
        assert_eq!(latest[1].value, "Cleaning");
    }

    #[test]
    fn test_clean_requires_power() {
        let mut device = device(Scenario::Idle);
        device.apply("switch", &json!(false), NOW).unwrap();

        assert!(device.apply("manual_clean", &json!(true), NOW).is_err());
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut device = device(Scenario::Idle);

        assert!(device.apply("led_color", &json!("red"), NOW).is_err());
        assert!(device.apply("switch", &json!("on"), NOW).is_err());
    }
}
