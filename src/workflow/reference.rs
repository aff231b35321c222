use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RawWorkflow;

/// Stable identifier for one submitted workflow.
///
/// Captured once from the object the execution plane returned on submit.
/// There is no API to change it afterwards; it goes away only with the
/// `Environment` that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowReference {
    name: String,
    namespace: String,
    uid: String,
    template: String,
    submitted_at: DateTime<Utc>,
}

impl WorkflowReference {
    /// Extract the identity of a freshly submitted workflow.
    ///
    /// Copies name, namespace and uid. The submission time is the
    /// object's creation timestamp when present and parseable, otherwise
    /// the current time. Status is never looked at.
    pub fn from_raw(raw: &RawWorkflow, template: &str) -> Self {
        let submitted_at = raw
            .metadata
            .creation_timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Self {
            name: raw.metadata.name.clone(),
            namespace: raw.metadata.namespace.clone(),
            uid: raw.metadata.uid.clone(),
            template: template.to_string(),
            submitted_at,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Opaque identity assigned by the execution plane.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Template the workflow was instantiated from.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

impl std::fmt::Display for WorkflowReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
