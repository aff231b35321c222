//! Execution gateway: the only way the control plane talks to the
//! execution plane.
//!
//! The contract is deliberately narrow. A gateway submits, fetches and
//! cancels; it does not retry, does not sequence calls and does not read
//! meaning into phases. Every call takes the caller's cancellation token
//! and must give up as soon as it fires.

mod argo;

pub use argo::{ArgoCliGateway, DEFAULT_CALL_TIMEOUT_SECS};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::labels::Labels;
use crate::workflow::{Parameters, RawWorkflow};

/// Failure kinds reported by a gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The named workflow does not exist (or no longer exists).
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// The execution plane refused the request: unknown template, bad
    /// parameters, or an object that cannot be cancelled.
    #[error("rejected by execution plane: {0}")]
    Rejected(String),

    /// The execution plane could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("cancelled by caller")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("decode execution plane response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Decoded, but without the identity every workflow must carry.
    #[error("incomplete execution plane response: {0}")]
    Incomplete(String),

    #[error("executable not found: {0}")]
    BinaryNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Create exactly one workflow from a registered template.
    /// `generate_name` is the prefix the execution plane completes into a
    /// unique name.
    async fn submit_from_template(
        &self,
        ctx: &CancellationToken,
        template: &str,
        generate_name: &str,
        parameters: &Parameters,
        labels: &Labels,
    ) -> GatewayResult<RawWorkflow>;

    /// Fetch the current state of a workflow.
    async fn get_by_name(&self, ctx: &CancellationToken, name: &str) -> GatewayResult<RawWorkflow>;

    /// Request cooperative termination of a workflow.
    async fn cancel(&self, ctx: &CancellationToken, name: &str) -> GatewayResult<()>;
}
