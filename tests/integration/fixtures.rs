//! Test fixtures for integration tests.
//!
//! Provides:
//! - `FakeGateway`, an `ExecutionGateway` that records every call and can
//!   be scripted to fail or to report a phase
//! - helpers for building orchestrators and specs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;

use envplane::labels::Labels;
use envplane::workflow::{ObjectMeta, Parameters, RawWorkflow, RawWorkflowStatus};
use envplane::{
    EnvironmentOrchestrator, EnvironmentSpec, ExecutionGateway, GatewayError, GatewayResult,
    TemplateSet,
};

pub const NAMESPACE: &str = "argo";

/// One recorded `submit_from_template` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub template: String,
    pub generate_name: String,
    pub parameters: Parameters,
    pub labels: Labels,
    /// Name the fake generated, empty when the call failed.
    pub name: String,
}

/// Failure a scripted call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Rejected,
    Transport,
}

impl Failure {
    fn to_error(self, subject: &str) -> GatewayError {
        match self {
            Failure::NotFound => GatewayError::NotFound(subject.to_string()),
            Failure::Rejected => {
                GatewayError::Rejected(format!("workflowtemplate {} rejected", subject))
            }
            Failure::Transport => GatewayError::Transport(format!(
                "dial tcp 10.0.0.1:443: connect: connection refused ({})",
                subject
            )),
        }
    }
}

#[derive(Default)]
struct FakeState {
    submissions: Vec<Submission>,
    get_calls: Vec<String>,
    cancel_calls: Vec<String>,
    workflows: HashMap<String, RawWorkflow>,
    submit_failures: HashMap<String, Failure>,
    get_failures: HashMap<String, Failure>,
}

/// Recording gateway double.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every submission to `template` fails with `failure`.
    pub fn fail_submit(&self, template: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .submit_failures
            .insert(template.to_string(), failure);
    }

    /// Every read of `name` fails with `failure`.
    pub fn fail_get(&self, name: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .get_failures
            .insert(name.to_string(), failure);
    }

    /// Give a submitted workflow a status.
    pub fn set_status(&self, name: &str, phase: &str, started_at: Option<&str>, finished_at: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let workflow = state
            .workflows
            .get_mut(name)
            .unwrap_or_else(|| panic!("no workflow named {}", name));
        workflow.status = Some(RawWorkflowStatus {
            phase: Some(phase.to_string()),
            started_at: started_at.map(String::from),
            finished_at: finished_at.map(String::from),
            message: None,
        });
    }

    /// Forget a workflow, as if it had been garbage collected.
    pub fn delete(&self, name: &str) {
        self.state.lock().unwrap().workflows.remove(name);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().get_calls.clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().cancel_calls.clone()
    }
}

#[async_trait]
impl ExecutionGateway for FakeGateway {
    async fn submit_from_template(
        &self,
        ctx: &CancellationToken,
        template: &str,
        generate_name: &str,
        parameters: &Parameters,
        labels: &Labels,
    ) -> GatewayResult<RawWorkflow> {
        let mut state = self.state.lock().unwrap();
        let mut submission = Submission {
            template: template.to_string(),
            generate_name: generate_name.to_string(),
            parameters: parameters.clone(),
            labels: labels.clone(),
            name: String::new(),
        };

        if ctx.is_cancelled() {
            state.submissions.push(submission);
            return Err(GatewayError::Cancelled);
        }
        if let Some(failure) = state.submit_failures.get(template).copied() {
            state.submissions.push(submission);
            return Err(failure.to_error(template));
        }

        let uid = uuid::Uuid::new_v4();
        let name = format!("{}{}", generate_name, &uid.simple().to_string()[..5]);
        let workflow = RawWorkflow {
            metadata: ObjectMeta {
                name: name.clone(),
                namespace: NAMESPACE.to_string(),
                uid: uid.to_string(),
                creation_timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
                labels: labels.clone(),
            },
            status: None,
        };

        submission.name = name.clone();
        state.submissions.push(submission);
        state.workflows.insert(name, workflow.clone());
        Ok(workflow)
    }

    async fn get_by_name(&self, ctx: &CancellationToken, name: &str) -> GatewayResult<RawWorkflow> {
        let mut state = self.state.lock().unwrap();
        state.get_calls.push(name.to_string());

        if ctx.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        if let Some(failure) = state.get_failures.get(name).copied() {
            return Err(failure.to_error(name));
        }
        state
            .workflows
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(name.to_string()))
    }

    async fn cancel(&self, ctx: &CancellationToken, name: &str) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls.push(name.to_string());

        if ctx.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        let workflow = state
            .workflows
            .get_mut(name)
            .ok_or_else(|| GatewayError::NotFound(name.to_string()))?;
        workflow.status = Some(RawWorkflowStatus {
            phase: Some("Failed".to_string()),
            message: Some("Stopped with strategy 'Stop'".to_string()),
            ..Default::default()
        });
        Ok(())
    }
}

/// Orchestrator over `gateway` with the default template names.
pub fn orchestrator(gateway: &Arc<FakeGateway>) -> EnvironmentOrchestrator {
    EnvironmentOrchestrator::new(gateway.clone(), TemplateSet::default())
}

pub fn spec(name: &str, service: &str, ttl: Duration) -> EnvironmentSpec {
    EnvironmentSpec::new(name, service, ttl)
}

pub const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
