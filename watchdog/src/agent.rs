use crate::classify::needs_reset;
use crate::config::Config;
use crate::errors::Result;
use crate::model::RecentHistory;
use crate::recovery::run_reset_sequence;
use crate::report;
use crate::telemetry::{fetch_recent_history, fetch_status};
use crate::transport::CloudTransport;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryState {
    Fetched(usize),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetDecision {
    Healthy,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub history: HistoryState,
    pub decision: ResetDecision,
}

/// Fetch, classify and, when needed, reset the device once.
///
/// A failed status read or a failed reset step ends the run with an error.
/// A failed history read is downgraded to an empty history.
pub async fn run_once(transport: &dyn CloudTransport, config: &Config) -> Result<RunOutcome> {
    let status = fetch_status(transport, &config.device_id).await?;
    if config.debug {
        for line in report::status_lines(&status) {
            debug!("{}", line);
        }
    }

    let (history, history_state): (RecentHistory, HistoryState) =
        match fetch_recent_history(transport, &config.device_id).await {
            Ok(history) => {
                let n = history.len();
                (history, HistoryState::Fetched(n))
            }
            Err(e) => {
                if config.debug {
                    warn!("Failed to get device logs: {}", e);
                }
                (Vec::new(), HistoryState::Unavailable(e.to_string()))
            }
        };
    if config.debug && !history.is_empty() {
        debug!("Last {} logs:\n{}", history.len(), report::history_json(&history));
    }

    match &history_state {
        HistoryState::Fetched(n) => debug!("Deciding on status and {} log entries", n),
        HistoryState::Unavailable(reason) => debug!("Deciding on status only ({})", reason),
    }

    let decision = if needs_reset(&status, &history) {
        info!("Device needs reset, sending control command...");
        run_reset_sequence(transport, &config.device_id).await?;
        info!("Control command sent successfully");
        ResetDecision::Reset
    } else {
        info!("Device is working properly, no action needed");
        ResetDecision::Healthy
    };

    if let Some(delay) = config.shutdown_delay {
        debug!("Sleeping for {:?} before exit...", delay);
        tokio::time::sleep(delay).await;
    }

    Ok(RunOutcome {
        history: history_state,
        decision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::errors::Error;
    use crate::recovery::ResetStep;
    use crate::transport::fake::FakeTransport;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    const DEVICE: &str = "bf0123456789abcdef";

    fn config() -> Config {
        Config {
            access_id: "id".to_string(),
            access_key: "key".to_string(),
            region: Region::Eu,
            api_host: Region::Eu.api_host().to_string(),
            device_id: DEVICE.to_string(),
            debug: true,
            shutdown_delay: None,
        }
    }

    fn status_path() -> String {
        format!("/v1.0/devices/{}", DEVICE)
    }

    fn logs_path() -> String {
        format!("/v2.0/cloud/thing/{}/logs", DEVICE)
    }

    fn commands_path() -> String {
        format!("/v1.0/devices/{}/commands", DEVICE)
    }

    fn accept_commands(transport: &FakeTransport) {
        for _ in 0..3 {
            transport.ok(&commands_path(), json!(true));
        }
    }

    fn command_count(transport: &FakeTransport) -> usize {
        transport.calls().iter().filter(|c| c.method == "POST").count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_history_takes_no_action() {
        let transport = FakeTransport::new();
        transport.ok(&status_path(), json!({"online": true}));
        transport.ok(&logs_path(), json!({"logs": [{"value": "Idle", "event_time": 1}]}));

        let outcome = run_once(&transport, &config()).await.unwrap();

        assert_eq!(outcome.decision, ResetDecision::Healthy);
        assert_eq!(outcome.history, HistoryState::Fetched(1));
        assert_eq!(command_count(&transport), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_history_runs_reset() {
        let transport = FakeTransport::new();
        transport.ok(&status_path(), json!({"online": true}));
        transport.ok(&logs_path(), json!({"logs": [{"value": "Clean_Pause"}]}));
        accept_commands(&transport);
        let start = Instant::now();

        let outcome = run_once(&transport, &config()).await.unwrap();

        assert_eq!(outcome.decision, ResetDecision::Reset);
        assert_eq!(command_count(&transport), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_resets_even_without_history() {
        let transport = FakeTransport::new();
        transport.ok(&status_path(), json!({"online": false}));
        transport.ok(&logs_path(), json!({"logs": []}));
        accept_commands(&transport);

        let outcome = run_once(&transport, &config()).await.unwrap();

        assert_eq!(outcome.decision, ResetDecision::Reset);
        assert!(matches!(outcome.history, HistoryState::Unavailable(_)));
        assert_eq!(command_count(&transport), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_failure_falls_back_to_status() {
        let transport = FakeTransport::new();
        transport.ok(&status_path(), json!({"online": true}));
        transport.respond(&logs_path(), Err(Error::Transport("timed out".to_string())));

        let outcome = run_once(&transport, &config()).await.unwrap();

        assert_eq!(outcome.decision, ResetDecision::Healthy);
        assert_eq!(
            outcome.history,
            HistoryState::Unavailable("Transport error: timed out".to_string())
        );
        assert_eq!(command_count(&transport), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_is_fatal() {
        let transport = FakeTransport::new();
        transport.refuse(&status_path(), "sign invalid");

        let err = run_once(&transport, &config()).await.unwrap_err();

        assert!(matches!(err, Error::Api(_)));
        // Neither history nor commands are attempted
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_failure_is_fatal() {
        let transport = FakeTransport::new();
        transport.ok(&status_path(), json!({"online": false}));
        transport.refuse(&logs_path(), "no permission");
        transport.refuse(&commands_path(), "device is offline");

        let err = run_once(&transport, &config()).await.unwrap_err();

        assert!(matches!(err, Error::Command { step: ResetStep::Off, .. }));
        assert_eq!(command_count(&transport), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_delay_applied_after_decision() {
        let transport = FakeTransport::new();
        transport.ok(&status_path(), json!({"online": true}));
        transport.ok(&logs_path(), json!({"logs": [{"value": "Standby"}]}));
        let config = Config {
            shutdown_delay: Some(Duration::from_secs(30)),
            ..config()
        };
        let start = Instant::now();

        run_once(&transport, &config).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }
}
