//! Execution-plane workflow model.
//!
//! `RawWorkflow` is what the gateway hands back. Everything the control
//! plane keeps or shows is derived from it: the immutable
//! `WorkflowReference` captured at submission, and the on-demand
//! `WorkflowStatusView`.

mod links;
mod raw;
mod reference;
mod status;

pub use links::WorkflowLinks;
pub use raw::{ObjectMeta, RawWorkflow, RawWorkflowStatus};
pub use reference::WorkflowReference;
pub use status::WorkflowStatusView;

use std::collections::BTreeMap;

/// Template parameters for a submission.
pub type Parameters = BTreeMap<String, String>;
