//! Live, typed summary of one environment.
//!
//! Assembled on demand from a stored `Environment` plus fresh status
//! reads. A status that cannot be read is reported as absent; the summary
//! itself always succeeds.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Environment, EnvironmentOrchestrator, EnvironmentState, Stage};
use crate::workflow::{Parameters, WorkflowLinks, WorkflowReference, WorkflowStatusView};
use crate::{elog_warn, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub environment: EnvironmentView,
    pub state: EnvironmentState,
    pub workflows: EnvironmentWorkflows,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentView {
    pub name: String,
    pub service: String,
    pub ttl_seconds: u64,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentWorkflows {
    pub create: WorkflowWithStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<WorkflowWithStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destroy: Option<WorkflowWithStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowWithStatus {
    pub reference: WorkflowReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `None` when the execution plane has no status yet or the read
    /// failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatusView>,
}

impl EnvironmentOrchestrator {
    /// Build a live summary of `env`, reading each workflow's status.
    pub async fn summarize(
        &self,
        ctx: &CancellationToken,
        env: &Environment,
        links: Option<&WorkflowLinks>,
    ) -> EnvironmentSummary {
        let create_status = self.get_create_status(ctx, env).await;
        let ttl_status = self.get_ttl_status(ctx, env).await;
        let destroy_status = self.get_destroy_status(ctx, env).await;

        let entry = |stage: Stage, reference: &WorkflowReference, status: Result<Option<WorkflowStatusView>>| {
            WorkflowWithStatus {
                reference: reference.clone(),
                url: links.map(|l| l.workflow_url(reference)),
                status: tolerate(env.name(), stage, status),
            }
        };

        let spec = env.spec();
        EnvironmentSummary {
            environment: EnvironmentView {
                name: spec.name.clone(),
                service: spec.service.clone(),
                ttl_seconds: spec.ttl.as_secs(),
                parameters: spec.parameters.clone(),
            },
            state: env.state(),
            workflows: EnvironmentWorkflows {
                create: entry(Stage::Create, env.create_workflow(), create_status),
                ttl: env
                    .ttl_workflow()
                    .map(|r| entry(Stage::Ttl, r, ttl_status)),
                destroy: env
                    .destroy_workflow()
                    .map(|r| entry(Stage::Destroy, r, destroy_status)),
            },
        }
    }
}

/// A failed read degrades to "status unavailable".
fn tolerate(
    environment: &str,
    stage: Stage,
    status: Result<Option<WorkflowStatusView>>,
) -> Option<WorkflowStatusView> {
    match status {
        Ok(status) => status,
        Err(e) if e.is_not_found() => {
            elog_warn!("{} workflow of {} no longer exists: {}", stage, environment, e);
            None
        }
        Err(e) => {
            elog_warn!("{} status of {} unavailable: {}", stage, environment, e);
            None
        }
    }
}
