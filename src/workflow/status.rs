use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RawWorkflowStatus;

/// Minimal, read-only status of a workflow.
///
/// Built fresh on every read and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatusView {
    /// Phase exactly as the execution plane reports it (`Pending`,
    /// `Running`, `Succeeded`, `Failed`, `Error`, ...).
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowStatusView {
    /// Translate a raw status.
    ///
    /// Returns `None` when there is no status or no phase yet: absence is
    /// reported as absence, never guessed into a phase. Timestamps that
    /// fail to parse are dropped.
    pub fn from_raw(raw: Option<&RawWorkflowStatus>) -> Option<Self> {
        let raw = raw?;
        let phase = raw.phase.as_deref().filter(|p| !p.is_empty())?;

        Some(Self {
            phase: phase.to_string(),
            started_at: parse_timestamp(raw.started_at.as_deref()),
            finished_at: parse_timestamp(raw.finished_at.as_deref()),
        })
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
