use thiserror::Error;

use crate::environment::{Environment, Stage};
use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Invalid environment spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Submit {stage} workflow from template {template}: {source}")]
    Submit {
        stage: Stage,
        template: String,
        #[source]
        source: GatewayError,
    },

    /// The create workflow was submitted but the TTL cleanup was not.
    /// `environment` holds the TTL-less aggregate, including the create
    /// reference the caller may want to cancel.
    #[error(
        "Environment {} created as {} but TTL submission from template {template} failed: {source}",
        .environment.name(),
        .environment.create_workflow().name()
    )]
    PartialCreate {
        environment: Box<Environment>,
        template: String,
        #[source]
        source: GatewayError,
    },

    #[error("Read status of workflow {workflow}: {source}")]
    StatusRead {
        workflow: String,
        #[source]
        source: GatewayError,
    },

    #[error("Cancel workflow {workflow}: {source}")]
    Cancel {
        workflow: String,
        #[source]
        source: GatewayError,
    },

    #[error("Execution gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store file {path} has version {found}, this build reads version {supported}")]
    UnsupportedStoreVersion {
        path: String,
        found: u32,
        supported: u32,
    },

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Environment already exists: {0}")]
    EnvironmentExists(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    /// True when the execution plane reported the workflow as absent, as
    /// opposed to a transport or decode failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::StatusRead { source, .. } | Error::Cancel { source, .. } => {
                matches!(source, GatewayError::NotFound(_))
            }
            Error::EnvironmentNotFound(_) => true,
            _ => false,
        }
    }

    /// True when the caller's context was cancelled mid-call.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Submit { source, .. }
            | Error::PartialCreate { source, .. }
            | Error::StatusRead { source, .. }
            | Error::Cancel { source, .. }
            | Error::Gateway(source) => matches!(source, GatewayError::Cancelled),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
