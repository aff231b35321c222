//! Platform label schema attached to every submitted workflow.
//!
//! These keys are a contract with anything that filters workflows on the
//! execution plane. Do not rename them.

use std::collections::BTreeMap;

/// Label set attached to a submission.
pub type Labels = BTreeMap<String, String>;

/// Prefix shared by every platform-owned key. Caller labels under this
/// prefix are dropped.
pub const RESERVED_PREFIX: &str = "platform.";

pub const LABEL_CONTROL_PLANE: &str = "platform.control-plane";
pub const LABEL_EXECUTOR: &str = "platform.executor";
pub const LABEL_WORKFLOW_TYPE: &str = "platform.workflow.type";
pub const LABEL_SERVICE: &str = "platform.service";
pub const LABEL_ENVIRONMENT: &str = "platform.environment";
pub const LABEL_TRIGGER: &str = "platform.trigger";
pub const LABEL_WORKFLOW_TEMPLATE: &str = "platform.workflow.template";

pub const CONTROL_PLANE_MARKER: &str = "true";
pub const EXECUTOR_ARGO: &str = "argo";

/// Kind of work a submission performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowType {
    EnvironmentCreate,
    EnvironmentDestroy,
    EnvironmentTtl,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::EnvironmentCreate => "environment-create",
            WorkflowType::EnvironmentDestroy => "environment-destroy",
            WorkflowType::EnvironmentTtl => "environment-ttl",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Api,
    System,
    PullRequest,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Api => "api",
            Trigger::System => "system",
            Trigger::PullRequest => "pull_request",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `key` belongs to the platform namespace.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

/// Builds the label set for one submission.
///
/// The four mandatory keys are seeded on construction. Each setter owns
/// exactly one key. [`LabelBuilder::build`] hands out a fresh copy, so a
/// builder can keep being modified after a build without touching labels
/// that were already submitted.
///
/// ```ignore
/// let labels = LabelBuilder::new(WorkflowType::EnvironmentCreate, "checkout")
///     .with_environment("pr-42")
///     .with_trigger(Trigger::Api)
///     .with_template("env-create-template")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct LabelBuilder {
    labels: Labels,
}

impl LabelBuilder {
    pub fn new(workflow_type: WorkflowType, service: &str) -> Self {
        let mut labels = Labels::new();
        labels.insert(LABEL_CONTROL_PLANE.to_string(), CONTROL_PLANE_MARKER.to_string());
        labels.insert(LABEL_EXECUTOR.to_string(), EXECUTOR_ARGO.to_string());
        labels.insert(LABEL_WORKFLOW_TYPE.to_string(), workflow_type.as_str().to_string());
        labels.insert(LABEL_SERVICE.to_string(), service.to_string());
        Self { labels }
    }

    pub fn with_environment(&mut self, environment: &str) -> &mut Self {
        self.labels
            .insert(LABEL_ENVIRONMENT.to_string(), environment.to_string());
        self
    }

    pub fn with_trigger(&mut self, trigger: Trigger) -> &mut Self {
        self.labels
            .insert(LABEL_TRIGGER.to_string(), trigger.as_str().to_string());
        self
    }

    pub fn with_template(&mut self, template: &str) -> &mut Self {
        self.labels
            .insert(LABEL_WORKFLOW_TEMPLATE.to_string(), template.to_string());
        self
    }

    /// Add caller labels. Keys in the platform namespace are skipped, so
    /// this can never replace a value set by the builder.
    pub fn with_caller_labels<'a, I>(&mut self, labels: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in labels {
            if is_reserved(key) {
                continue;
            }
            self.labels.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn build(&self) -> Labels {
        self.labels.clone()
    }
}
