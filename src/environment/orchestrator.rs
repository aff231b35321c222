//! Environment orchestrator.
//!
//! Maps environment intent onto workflow submissions and reads their live
//! status back. Holds no state between calls: every call is a short,
//! ordered sequence of gateway requests, and every result is handed to the
//! caller to keep.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::spec::{validate_environment_name, validate_service};
use super::{Environment, EnvironmentSpec, Stage};
use crate::gateway::{ExecutionGateway, GatewayResult};
use crate::labels::{LabelBuilder, Labels, Trigger, WorkflowType};
use crate::workflow::{Parameters, WorkflowReference, WorkflowStatusView};
use crate::{elog, elog_debug, elog_error, elog_warn, Error, Result};

pub const CREATE_NAME_PREFIX: &str = "env-create-";
pub const TTL_NAME_PREFIX: &str = "env-ttl-";
pub const DESTROY_NAME_PREFIX: &str = "env-destroy-";

pub const PARAM_ENV_NAME: &str = "env_name";
pub const PARAM_SERVICE: &str = "service";
pub const PARAM_EXPIRES_AT: &str = "expires_at";

/// Names of the templates registered on the execution plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSet {
    pub create: String,
    pub ttl: String,
    pub destroy: String,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            create: "env-create-template".to_string(),
            ttl: "env-ttl-cleanup-template".to_string(),
            destroy: "env-destroy-template".to_string(),
        }
    }
}

/// Turns environment intent into workflow submissions.
///
/// ```ignore
/// let orchestrator = EnvironmentOrchestrator::new(Arc::new(gateway), TemplateSet::default());
/// let env = orchestrator.create(&ctx, spec).await?;
/// store.insert(env.clone())?;
/// let status = orchestrator.get_create_status(&ctx, &env).await?;
/// ```
#[derive(Clone)]
pub struct EnvironmentOrchestrator {
    gateway: Arc<dyn ExecutionGateway>,
    templates: TemplateSet,
}

impl EnvironmentOrchestrator {
    pub fn new(gateway: Arc<dyn ExecutionGateway>, templates: TemplateSet) -> Self {
        Self { gateway, templates }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Submit the create workflow and, when the spec has a TTL, its
    /// scheduled cleanup.
    ///
    /// The create submission is always issued first. If it fails nothing
    /// else is attempted. If the TTL submission fails afterwards the
    /// create workflow is already running; that case comes back as
    /// [`Error::PartialCreate`] carrying the TTL-less environment, and no
    /// compensation is attempted here.
    pub async fn create(&self, ctx: &CancellationToken, spec: EnvironmentSpec) -> Result<Environment> {
        spec.validate()?;

        let expires_at = expiry(Utc::now(), &spec)?;
        elog!(
            "Creating environment {} for service {} (expires_at={})",
            spec.name,
            spec.service,
            expires_at
        );

        let mut create_params = spec.parameters.clone();
        create_params.insert(PARAM_ENV_NAME.to_string(), spec.name.clone());
        create_params.insert(PARAM_SERVICE.to_string(), spec.service.clone());
        create_params.insert(PARAM_EXPIRES_AT.to_string(), expires_at.clone());

        let create_labels = self.labels(
            WorkflowType::EnvironmentCreate,
            Trigger::Api,
            &self.templates.create,
            &spec.service,
            &spec.name,
            &spec.labels,
        );

        let create_workflow = self
            .submit(
                ctx,
                Stage::Create,
                &self.templates.create,
                CREATE_NAME_PREFIX,
                &create_params,
                &create_labels,
            )
            .await
            .map_err(|source| {
                elog_error!("Create submission for {} failed: {}", spec.name, source);
                Error::Submit {
                    stage: Stage::Create,
                    template: self.templates.create.clone(),
                    source,
                }
            })?;

        if !spec.wants_ttl() {
            elog_debug!("Environment {} has no TTL, skipping cleanup workflow", spec.name);
            return Ok(Environment::new(spec, create_workflow, None));
        }

        let mut ttl_params = Parameters::new();
        ttl_params.insert(PARAM_ENV_NAME.to_string(), spec.name.clone());
        ttl_params.insert(PARAM_EXPIRES_AT.to_string(), expires_at);

        let ttl_labels = self.labels(
            WorkflowType::EnvironmentTtl,
            Trigger::System,
            &self.templates.ttl,
            &spec.service,
            &spec.name,
            &spec.labels,
        );

        let ttl_result = self
            .submit(
                ctx,
                Stage::Ttl,
                &self.templates.ttl,
                TTL_NAME_PREFIX,
                &ttl_params,
                &ttl_labels,
            )
            .await;

        match ttl_result {
            Ok(ttl_workflow) => Ok(Environment::new(spec, create_workflow, Some(ttl_workflow))),
            Err(source) => {
                elog_warn!(
                    "TTL submission for {} failed after create {} was submitted: {}",
                    spec.name,
                    create_workflow.name(),
                    source
                );
                Err(Error::PartialCreate {
                    environment: Box::new(Environment::new(spec, create_workflow, None)),
                    template: self.templates.ttl.clone(),
                    source,
                })
            }
        }
    }

    /// Submit the destroy workflow for `name`.
    ///
    /// No environment state is kept here, so the caller resolves the
    /// owning `service` (from its store) and passes it in.
    pub async fn destroy(
        &self,
        ctx: &CancellationToken,
        name: &str,
        service: &str,
    ) -> Result<WorkflowReference> {
        validate_environment_name(name).map_err(Error::InvalidRequest)?;
        validate_service(service).map_err(Error::InvalidRequest)?;

        elog!("Destroying environment {} for service {}", name, service);

        let mut params = Parameters::new();
        params.insert(PARAM_ENV_NAME.to_string(), name.to_string());

        let labels = self.labels(
            WorkflowType::EnvironmentDestroy,
            Trigger::Api,
            &self.templates.destroy,
            service,
            name,
            &Labels::new(),
        );

        self.submit(
            ctx,
            Stage::Destroy,
            &self.templates.destroy,
            DESTROY_NAME_PREFIX,
            &params,
            &labels,
        )
        .await
        .map_err(|source| {
            elog_error!("Destroy submission for {} failed: {}", name, source);
            Error::Submit {
                stage: Stage::Destroy,
                template: self.templates.destroy.clone(),
                source,
            }
        })
    }

    /// Live status of the create workflow.
    pub async fn get_create_status(
        &self,
        ctx: &CancellationToken,
        env: &Environment,
    ) -> Result<Option<WorkflowStatusView>> {
        self.read_status(ctx, env.create_workflow()).await
    }

    /// Live status of the TTL workflow. `Ok(None)` without a gateway call
    /// when the environment has none.
    pub async fn get_ttl_status(
        &self,
        ctx: &CancellationToken,
        env: &Environment,
    ) -> Result<Option<WorkflowStatusView>> {
        match env.ttl_workflow() {
            Some(reference) => self.read_status(ctx, reference).await,
            None => Ok(None),
        }
    }

    /// Live status of the destroy workflow. `Ok(None)` without a gateway
    /// call when destroy has not been submitted.
    pub async fn get_destroy_status(
        &self,
        ctx: &CancellationToken,
        env: &Environment,
    ) -> Result<Option<WorkflowStatusView>> {
        match env.destroy_workflow() {
            Some(reference) => self.read_status(ctx, reference).await,
            None => Ok(None),
        }
    }

    /// Ask the execution plane to stop a referenced workflow, e.g. the
    /// orphaned create left behind by a partial create.
    pub async fn cancel(&self, ctx: &CancellationToken, reference: &WorkflowReference) -> Result<()> {
        elog!("Cancelling workflow {}", reference);
        self.gateway
            .cancel(ctx, reference.name())
            .await
            .map_err(|source| Error::Cancel {
                workflow: reference.name().to_string(),
                source,
            })
    }

    fn labels(
        &self,
        workflow_type: WorkflowType,
        trigger: Trigger,
        template: &str,
        service: &str,
        environment: &str,
        caller_labels: &Labels,
    ) -> Labels {
        LabelBuilder::new(workflow_type, service)
            .with_caller_labels(caller_labels)
            .with_environment(environment)
            .with_trigger(trigger)
            .with_template(template)
            .build()
    }

    async fn submit(
        &self,
        ctx: &CancellationToken,
        stage: Stage,
        template: &str,
        generate_name: &str,
        parameters: &Parameters,
        labels: &Labels,
    ) -> GatewayResult<WorkflowReference> {
        let raw = self
            .gateway
            .submit_from_template(ctx, template, generate_name, parameters, labels)
            .await?;
        let reference = WorkflowReference::from_raw(&raw, template);
        elog!(
            "Submitted {} workflow {} from template {}",
            stage,
            reference,
            template
        );
        Ok(reference)
    }

    pub(crate) async fn read_status(
        &self,
        ctx: &CancellationToken,
        reference: &WorkflowReference,
    ) -> Result<Option<WorkflowStatusView>> {
        elog_debug!("Reading status of workflow {}", reference);
        let raw = self
            .gateway
            .get_by_name(ctx, reference.name())
            .await
            .map_err(|source| Error::StatusRead {
                workflow: reference.name().to_string(),
                source,
            })?;
        Ok(WorkflowStatusView::from_raw(raw.status()))
    }
}

/// `now + ttl` as an RFC 3339 UTC timestamp with second precision.
fn expiry(now: DateTime<Utc>, spec: &EnvironmentSpec) -> Result<String> {
    TimeDelta::from_std(spec.ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| Error::InvalidSpec(format!("ttl {:?} is out of range", spec.ttl)))
}
