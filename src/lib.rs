//! envplane: ephemeral environment orchestration over an Argo-style
//! workflow engine.
//!
//! The crate turns an [`EnvironmentSpec`] into labeled workflow
//! submissions, keeps only the immutable [`WorkflowReference`]s that come
//! back, and reads live status from the execution plane on demand.

pub mod config;
pub mod environment;
pub mod error;
pub mod gateway;
pub mod labels;
pub mod log;
pub mod store;
pub mod util;
pub mod workflow;

pub use config::Config;
pub use environment::{
    Environment, EnvironmentOrchestrator, EnvironmentSpec, EnvironmentState, EnvironmentSummary,
    Stage, TemplateSet,
};
pub use error::{Error, Result};
pub use gateway::{ArgoCliGateway, ExecutionGateway, GatewayError, GatewayResult};
pub use store::EnvironmentStore;
pub use workflow::{RawWorkflow, WorkflowLinks, WorkflowReference, WorkflowStatusView};
