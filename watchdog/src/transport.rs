use crate::errors::Result;
use crate::model::Envelope;
use async_trait::async_trait;
use serde_json::Value;

/// Executes authenticated requests against the vendor cloud.
///
/// Implementations return the decoded envelope whatever its `success` flag
/// says; judging logical failure is left to the caller. Anything that keeps
/// the envelope from arriving is an `Error::Transport`.
#[async_trait]
pub trait CloudTransport: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Envelope>;

    async fn post(&self, path: &str, body: &Value) -> Result<Envelope>;
}
