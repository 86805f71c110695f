//! CLI subcommand handlers.

use crate::render;
use crate::{Commands, ConfigAction, HyperparameterArgs, RunArgs};
use anyhow::Context;
use imputex_core::client::{HttpImputationClient, ImputationApi, UploadFile};
use imputex_core::config::{ImputexConfig, to_toml};
use imputex_core::model::HyperparameterBag;
use imputex_core::schema::SchemaReview;
use imputex_core::types::{ColumnRole, ColumnType, Phase};
use imputex_core::{TickOutcome, Workflow};
use std::sync::Arc;
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: ImputexConfig,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => handle_run(args, config, quiet).await,
        Commands::Analyze { file } => handle_analyze(&file, config).await,
        Commands::Status { job_id, json } => handle_status(&job_id, json, config).await,
        Commands::Cancel { job_id } => handle_cancel(&job_id, config).await,
        Commands::Config { action } => handle_config(action, config),
    }
}

fn connect(config: &ImputexConfig) -> anyhow::Result<Arc<HttpImputationClient>> {
    let client = HttpImputationClient::new(&config.api)?;
    info!(base_url = %client.base_url(), "Using imputation service");
    Ok(Arc::new(client))
}

/// Analyze `file`; a rejected upload becomes the returned error.
async fn analyze_into(workflow: &mut Workflow, file: &std::path::Path) -> anyhow::Result<()> {
    let upload = UploadFile::from_path(file)
        .await
        .with_context(|| format!("Cannot upload {}", file.display()))?;
    if let Err(e) = workflow.analyze(upload).await {
        anyhow::bail!("Analysis failed: {}", e);
    }
    Ok(())
}

async fn handle_analyze(file: &std::path::Path, config: ImputexConfig) -> anyhow::Result<()> {
    let mut workflow = Workflow::new(connect(&config)?, &config);
    analyze_into(&mut workflow, file).await?;
    if let Some(schema) = workflow.schema() {
        println!("Job: {}", schema.job_id);
        print!("{}", render::schema_table(schema));
        println!("{}", render::role_summary(schema));
    }
    Ok(())
}

async fn handle_run(args: RunArgs, config: ImputexConfig, quiet: bool) -> anyhow::Result<()> {
    let mut workflow = Workflow::new(connect(&config)?, &config);
    analyze_into(&mut workflow, &args.file).await?;

    let schema = workflow.schema_mut()?;
    apply_edits(schema, &args)?;
    if !quiet {
        print!("{}", render::schema_table(schema));
        println!("{}", render::role_summary(schema));
    }

    let selection = hyperparameter_bag(&args.params).select(args.model);
    if let Err(e) = workflow.start_job(selection).await {
        anyhow::bail!("Could not start job: {}", e);
    }
    if let Some(job) = workflow.job() {
        println!("Started {} job {}", job.model, job.job_id);
        if !quiet {
            print!("{}", render::column_progress(job));
        }
    }
    if let Some(date) = &args.date {
        workflow.select_preview_date(date.clone());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_line = String::new();

    loop {
        tokio::select! {
            outcome = workflow.pump() => match outcome {
                Some(TickOutcome::Progress { .. }) => {
                    if let Some(job) = workflow.job() {
                        let line = render::progress_line(job);
                        if !quiet && line != last_line {
                            println!("{line}");
                            last_line = line;
                        }
                    }
                }
                Some(TickOutcome::Ignored) => {}
                Some(TickOutcome::Completed) | None => break,
                Some(TickOutcome::Failed { message }) => {
                    if let Some(job) = workflow.job() {
                        println!("{}", render::stages(job));
                        println!("{}", render::log_tail(job, config.ui.log_tail));
                    }
                    anyhow::bail!("Job failed: {}", message);
                }
            },
            _ = &mut ctrl_c => {
                println!("\nCancelling job...");
                workflow.cancel().await?;
                println!("Job cancelled.");
                return Ok(());
            }
        }
    }

    if workflow.phase() != Phase::Complete {
        anyhow::bail!("Polling stopped before the job finished");
    }
    if let Some(job) = workflow.job() {
        println!("{}", render::progress_line(job));
        if !quiet {
            println!("{}", render::stages(job));
            println!("{}", render::log_tail(job, config.ui.log_tail));
        }
    }
    print!("{}", render::chart(&workflow.chart()));

    match workflow.download_url() {
        Some(url) => {
            println!("Result: {url}");
            if args.open || config.ui.open_download {
                if let Err(e) = open::that(&url) {
                    warn!(url = %url, error = %e, "Could not open download location");
                }
            }
        }
        None => println!("The service did not provide a result download."),
    }
    Ok(())
}

/// Apply bulk edits first, then per-column type and role overrides.
fn apply_edits(schema: &mut SchemaReview, args: &RunArgs) -> anyhow::Result<()> {
    if args.targets_with_missing {
        schema.mark_missing_as_targets();
    }
    if args.ignore_ids {
        schema.ignore_id_columns();
    }
    for edit in &args.types {
        let (name, ty) = edit
            .split_once('=')
            .with_context(|| format!("Expected COLUMN=TYPE, got '{edit}'"))?;
        let column_type: ColumnType = ty.parse().map_err(anyhow::Error::msg)?;
        schema.set_type(name, column_type)?;
    }
    let roles = [
        (&args.targets, ColumnRole::Target),
        (&args.features, ColumnRole::Feature),
        (&args.ignored, ColumnRole::Ignore),
    ];
    for (names, role) in roles {
        for name in names {
            schema.set_role(name, role)?;
        }
    }
    Ok(())
}

fn hyperparameter_bag(params: &HyperparameterArgs) -> HyperparameterBag {
    let mut bag = HyperparameterBag::default();
    macro_rules! set {
        ($($field:ident),+) => {$(
            if let Some(value) = params.$field {
                bag.$field = value;
            }
        )+};
    }
    set!(
        max_iter,
        random_state,
        estimator,
        n_neighbors,
        weights,
        metric,
        hidden_dim,
        epochs,
        lr,
        window_size,
        batch_size,
        n_layers,
        highest,
        clip,
        preview_updates,
        totem_window_size,
        totem_normalization,
        totem_preview_updates
    );
    bag
}

async fn handle_status(job_id: &str, json: bool, config: ImputexConfig) -> anyhow::Result<()> {
    let api = connect(&config)?;
    let status = api.get_status(job_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", render::job_status(&status));
    }
    Ok(())
}

async fn handle_cancel(job_id: &str, config: ImputexConfig) -> anyhow::Result<()> {
    let api = connect(&config)?;
    api.cancel_job(job_id).await?;
    println!("Cancellation requested for job {job_id}");
    Ok(())
}

fn handle_config(action: ConfigAction, config: ImputexConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", to_toml(&config)?);
            Ok(())
        }
    }
}
