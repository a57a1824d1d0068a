use crate::errors::{Error, Result};
use crate::transport::CloudTransport;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// One step of the reset protocol.
///
/// The order and settle times are fixed: power off, wait 1s, power on,
/// wait 2s, trigger a manual clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    Off,
    On,
    Clean,
}

impl ResetStep {
    pub const SEQUENCE: [ResetStep; 3] = [ResetStep::Off, ResetStep::On, ResetStep::Clean];

    pub fn code(self) -> &'static str {
        match self {
            ResetStep::Off | ResetStep::On => "switch",
            ResetStep::Clean => "manual_clean",
        }
    }

    pub fn value(self) -> bool {
        !matches!(self, ResetStep::Off)
    }

    /// Wait after this step before the next one is sent
    pub fn settle(self) -> Option<Duration> {
        match self {
            ResetStep::Off => Some(Duration::from_secs(1)),
            ResetStep::On => Some(Duration::from_secs(2)),
            ResetStep::Clean => None,
        }
    }
}

impl fmt::Display for ResetStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ResetStep::Off => "OFF",
            ResetStep::On => "ON",
            ResetStep::Clean => "CLEAN",
        };
        f.write_str(tag)
    }
}

/// Runs the full reset sequence. Stops at the first step that fails;
/// later steps are never sent and nothing is retried.
pub async fn run_reset_sequence(transport: &dyn CloudTransport, device_id: &str) -> Result<()> {
    for step in ResetStep::SEQUENCE {
        send_step(transport, device_id, step).await?;

        if let Some(wait) = step.settle() {
            debug!("{} command accepted, waiting {:?}...", step, wait);
            tokio::time::sleep(wait).await;
        }
    }

    info!("Reset sequence completed");
    Ok(())
}

async fn send_step(
    transport: &dyn CloudTransport,
    device_id: &str,
    step: ResetStep,
) -> Result<()> {
    let payload = json!({
        "commands": [
            { "code": step.code(), "value": step.value() }
        ]
    });

    let response = transport
        .post(&format!("/v1.0/devices/{}/commands", device_id), &payload)
        .await
        .map_err(|e| Error::Command {
            step,
            reason: e.to_string(),
        })?;

    if !response.success {
        return Err(Error::Command {
            step,
            reason: response.msg,
        });
    }

    debug!("Sent {} ({} = {})", step, step.code(), step.value());
    Ok(())
}
