//! Environment orchestration.
//!
//! An environment is intent (`EnvironmentSpec`) plus the references of the
//! workflows submitted for it. Execution state is never kept here; it is
//! read from the execution plane whenever it is asked for.

mod orchestrator;
mod spec;
mod summary;

pub use orchestrator::{
    EnvironmentOrchestrator, TemplateSet, CREATE_NAME_PREFIX, DESTROY_NAME_PREFIX,
    PARAM_ENV_NAME, PARAM_EXPIRES_AT, PARAM_SERVICE, TTL_NAME_PREFIX,
};
pub use spec::{parse_ttl, Environment, EnvironmentSpec, EnvironmentState, Stage};
pub use summary::{EnvironmentSummary, EnvironmentView, EnvironmentWorkflows, WorkflowWithStatus};
