use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use envplane::environment::parse_ttl;
use envplane::{
    elog, elog_error, ArgoCliGateway, Config, Environment, EnvironmentOrchestrator,
    EnvironmentSpec, EnvironmentStore, Error, Result,
};

/// envplane - ephemeral environments on Argo Workflows
#[derive(Parser, Debug)]
#[command(name = "envplane")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    ENVPLANE_DEBUG=1        Enable debug logging (alternative to --debug)\n    ENVPLANE_NAMESPACE      Override the workflow namespace\n    ENVPLANE_LOG_LEVEL      error, warn, info, debug or trace")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.envplane/envplane.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create an environment: submit its create workflow and TTL cleanup
    Create {
        /// Environment name (DNS label)
        name: String,

        /// Owning service
        #[arg(short, long)]
        service: String,

        /// Time to live, e.g. 30m, 4h, 2d. 0 disables cleanup
        #[arg(long, value_parser = parse_ttl)]
        ttl: std::time::Duration,

        /// Extra create workflow parameter (repeatable)
        #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Extra label for every submitted workflow (repeatable)
        #[arg(short = 'l', long = "label", value_parser = parse_key_val)]
        labels: Vec<(String, String)>,
    },

    /// Submit the destroy workflow for a stored environment
    Destroy {
        name: String,
    },

    /// Show an environment with live workflow status
    Get {
        name: String,
    },

    /// List stored environments
    List,

    /// Stop a workflow referenced by a stored environment
    Cancel {
        /// Workflow name, e.g. env-create-x7k2p
        workflow: String,
    },
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            elog_error!("Command failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Log at the env/flag level while the config loads, then apply its level.
    envplane::log::init(
        Config::log_path()?,
        envplane::log::resolve_level(None, cli.debug),
    );
    let config = Config::load()?;
    envplane::log::set_level(envplane::log::resolve_level(
        config.log_level.as_deref(),
        cli.debug,
    ));
    elog!("envplane {:?} (namespace={})", cli.command, config.namespace);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let ctx = CancellationToken::new();
        let interrupt = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                elog!("Interrupted, cancelling in-flight call");
                interrupt.cancel();
            }
        });

        let mut store = EnvironmentStore::load().await?;

        match cli.command {
            Command::Create {
                name,
                service,
                ttl,
                params,
                labels,
            } => {
                let mut spec = EnvironmentSpec::new(name, service, ttl);
                spec.parameters.extend(params);
                spec.labels.extend(labels);
                run_create(&ctx, &config, &mut store, spec).await
            }
            Command::Destroy { name } => run_destroy(&ctx, &config, &mut store, &name).await,
            Command::Get { name } => run_get(&ctx, &config, &store, &name).await,
            Command::List => {
                run_list(&store);
                Ok(())
            }
            Command::Cancel { workflow } => run_cancel(&ctx, &config, &store, &workflow).await,
        }
    })
}

fn orchestrator(config: &Config) -> Result<EnvironmentOrchestrator> {
    let gateway = ArgoCliGateway::new(&config.argo_command, &config.namespace)?
        .with_timeout(config.call_timeout());
    Ok(EnvironmentOrchestrator::new(
        Arc::new(gateway),
        config.templates.clone(),
    ))
}

async fn run_create(
    ctx: &CancellationToken,
    config: &Config,
    store: &mut EnvironmentStore,
    spec: EnvironmentSpec,
) -> Result<()> {
    if store.contains(&spec.name) {
        return Err(Error::EnvironmentExists(spec.name));
    }

    match orchestrator(config)?.create(ctx, spec).await {
        Ok(env) => {
            store.insert(env.clone())?;
            store.save().await?;
            println!("{}", serde_json::to_string_pretty(&env)?);
            Ok(())
        }
        Err(err) => {
            // The create workflow is running either way; keep its reference.
            if let Error::PartialCreate { environment, .. } = &err {
                store.insert(environment.as_ref().clone())?;
                store.save().await?;
                eprintln!(
                    "Environment {} was recorded without TTL cleanup. Stop it with: envplane cancel {}",
                    environment.name(),
                    environment.create_workflow().name()
                );
            }
            Err(err)
        }
    }
}

async fn run_destroy(
    ctx: &CancellationToken,
    config: &Config,
    store: &mut EnvironmentStore,
    name: &str,
) -> Result<()> {
    let service = store.get(name)?.spec().service.clone();
    let reference = orchestrator(config)?.destroy(ctx, name, &service).await?;

    store.record_destroy(name, reference.clone())?;
    store.save().await?;
    println!("{}", serde_json::to_string_pretty(&reference)?);
    Ok(())
}

async fn run_get(
    ctx: &CancellationToken,
    config: &Config,
    store: &EnvironmentStore,
    name: &str,
) -> Result<()> {
    let env = store.get(name)?;
    let links = config.links();
    let summary = orchestrator(config)?
        .summarize(ctx, env, links.as_ref())
        .await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_list(store: &EnvironmentStore) {
    if store.is_empty() {
        println!("No environments");
        return;
    }

    println!(
        "{:<24} {:<20} {:<11} {:<28} {}",
        "NAME", "SERVICE", "STATE", "CREATE WORKFLOW", "SUBMITTED"
    );
    for env in store.list() {
        println!("{}", list_row(env));
    }
}

fn list_row(env: &Environment) -> String {
    let create = env.create_workflow();
    format!(
        "{:<24} {:<20} {:<11} {:<28} {}",
        env.name(),
        env.spec().service,
        env.state().to_string(),
        create.name(),
        create.submitted_at().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

async fn run_cancel(
    ctx: &CancellationToken,
    config: &Config,
    store: &EnvironmentStore,
    workflow: &str,
) -> Result<()> {
    let reference = store
        .list()
        .flat_map(|env| env.workflows())
        .map(|(_, reference)| reference)
        .find(|reference| reference.name() == workflow)
        .cloned()
        .ok_or_else(|| {
            Error::InvalidRequest(format!(
                "workflow {} is not referenced by any stored environment",
                workflow
            ))
        })?;

    orchestrator(config)?.cancel(ctx, &reference).await?;
    println!("Stopped {}", reference);
    Ok(())
}
