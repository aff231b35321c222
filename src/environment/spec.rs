//! Environment intent and the control-plane aggregate built from it.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::labels::Labels;
use crate::workflow::{Parameters, WorkflowReference};
use crate::{Error, Result};

/// Environment names end up as label values and inside generated
/// resource names, so they follow DNS-1123 label rules.
static ENVIRONMENT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

/// Kubernetes label value syntax.
static LABEL_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").unwrap());

/// Optional DNS subdomain prefix for a label key.
static LABEL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

const MAX_LABEL_VALUE_LEN: usize = 63;
const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Caller intent for one ephemeral environment. `name` is the identity
/// key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    /// Owning service.
    pub service: String,
    /// Time until scheduled teardown. Zero means no TTL cleanup is
    /// submitted.
    #[serde(rename = "ttl_seconds", with = "duration_secs")]
    pub ttl: Duration,
    /// Passed to the create workflow as template parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: Parameters,
    /// Extra labels for every submission. Platform keys are ignored.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

impl EnvironmentSpec {
    pub fn new(name: impl Into<String>, service: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            ttl,
            parameters: Parameters::new(),
            labels: Labels::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Whether a TTL cleanup workflow should accompany the create.
    pub fn wants_ttl(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Check the fields that end up in labels and names.
    pub fn validate(&self) -> Result<()> {
        validate_environment_name(&self.name).map_err(Error::InvalidSpec)?;
        validate_service(&self.service).map_err(Error::InvalidSpec)?;
        for (key, value) in &self.labels {
            validate_label(key, value).map_err(Error::InvalidSpec)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_environment_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("environment name is required".to_string());
    }
    if name.len() > MAX_LABEL_VALUE_LEN {
        return Err(format!(
            "environment name '{}' exceeds {} characters",
            name, MAX_LABEL_VALUE_LEN
        ));
    }
    if !ENVIRONMENT_NAME_RE.is_match(name) {
        return Err(format!(
            "environment name '{}' must be lowercase alphanumerics and '-'",
            name
        ));
    }
    Ok(())
}

/// Caller labels are joined into one `k=v,k=v` selector on submit, so
/// anything outside Kubernetes label syntax is refused.
pub(crate) fn validate_label(key: &str, value: &str) -> std::result::Result<(), String> {
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty()
            || prefix.len() > MAX_LABEL_PREFIX_LEN
            || !LABEL_PREFIX_RE.is_match(prefix)
        {
            return Err(format!("label key '{}' has an invalid prefix", key));
        }
    }
    if name.is_empty() || name.len() > MAX_LABEL_VALUE_LEN || !LABEL_VALUE_RE.is_match(name) {
        return Err(format!("label key '{}' is not a valid label name", key));
    }
    if !value.is_empty() && (value.len() > MAX_LABEL_VALUE_LEN || !LABEL_VALUE_RE.is_match(value)) {
        return Err(format!("label {}='{}' is not a valid label value", key, value));
    }
    Ok(())
}

pub(crate) fn validate_service(service: &str) -> std::result::Result<(), String> {
    if service.is_empty() {
        return Err("service is required".to_string());
    }
    if service.len() > MAX_LABEL_VALUE_LEN || !LABEL_VALUE_RE.is_match(service) {
        return Err(format!("service '{}' is not a valid label value", service));
    }
    Ok(())
}

/// Which submission of an environment's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Create,
    Ttl,
    Destroy,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Create => write!(f, "create"),
            Stage::Ttl => write!(f, "ttl"),
            Stage::Destroy => write!(f, "destroy"),
        }
    }
}

/// Lifecycle position, derived only from which references are present.
///
/// Whether the underlying workflows finished is a property of their live
/// phase and is never tracked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
    /// Create submitted; a TTL was requested but has not been recorded.
    Creating,
    /// Create submitted and TTL recorded (or not requested).
    Active,
    /// Destroy submitted.
    Destroying,
}

impl std::fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentState::Creating => write!(f, "creating"),
            EnvironmentState::Active => write!(f, "active"),
            EnvironmentState::Destroying => write!(f, "destroying"),
        }
    }
}

/// The control plane's view of one environment: intent plus workflow
/// references, never execution state.
///
/// Returned by value from the orchestrator, which keeps no copy. Whoever
/// holds it is responsible for persisting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    spec: EnvironmentSpec,
    create_workflow: WorkflowReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl_workflow: Option<WorkflowReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destroy_workflow: Option<WorkflowReference>,
}

impl Environment {
    pub(crate) fn new(
        spec: EnvironmentSpec,
        create_workflow: WorkflowReference,
        ttl_workflow: Option<WorkflowReference>,
    ) -> Self {
        Self {
            spec,
            create_workflow,
            ttl_workflow,
            destroy_workflow: None,
        }
    }

    pub fn spec(&self) -> &EnvironmentSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn create_workflow(&self) -> &WorkflowReference {
        &self.create_workflow
    }

    pub fn ttl_workflow(&self) -> Option<&WorkflowReference> {
        self.ttl_workflow.as_ref()
    }

    pub fn destroy_workflow(&self) -> Option<&WorkflowReference> {
        self.destroy_workflow.as_ref()
    }

    /// Record the destroy submission. The only mutation an environment
    /// ever sees; a second destroy replaces the first reference.
    pub fn with_destroy(mut self, reference: WorkflowReference) -> Self {
        self.destroy_workflow = Some(reference);
        self
    }

    pub fn state(&self) -> EnvironmentState {
        if self.destroy_workflow.is_some() {
            EnvironmentState::Destroying
        } else if self.spec.wants_ttl() && self.ttl_workflow.is_none() {
            EnvironmentState::Creating
        } else {
            EnvironmentState::Active
        }
    }

    /// All recorded references, in submission order.
    pub fn workflows(&self) -> Vec<(Stage, &WorkflowReference)> {
        let mut refs = vec![(Stage::Create, &self.create_workflow)];
        if let Some(ttl) = &self.ttl_workflow {
            refs.push((Stage::Ttl, ttl));
        }
        if let Some(destroy) = &self.destroy_workflow {
            refs.push((Stage::Destroy, destroy));
        }
        refs
    }
}

/// Parse a TTL such as `90s`, `15m`, `1h`, `2d`, or a bare number of
/// seconds. `0` disables the TTL.
pub fn parse_ttl(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("ttl is required".to_string());
    }

    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid ttl '{}'", input))?;

    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(format!("invalid ttl unit in '{}' (use s, m, h or d)", input)),
    };

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("ttl '{}' is too large", input))
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
