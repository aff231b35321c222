use super::WorkflowReference;

/// Builds links into the execution plane's web UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowLinks {
    base_url: String,
}

impl WorkflowLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/workflows/<namespace>/<name>`
    pub fn workflow_url(&self, reference: &WorkflowReference) -> String {
        format!(
            "{}/workflows/{}/{}",
            self.base_url,
            reference.namespace(),
            reference.name()
        )
    }
}
