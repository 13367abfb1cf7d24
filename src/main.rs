use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use encounter_core::audit::{AuditSink, InMemoryAuditSink, TracingAuditSink};
use encounter_core::config::AuditSinkKind;
use encounter_core::domain::{AuthorityClaims, Capability, PatientId, TenantId};
use encounter_core::error::map_error_code;
use encounter_core::repository::InMemoryEncounterRepository;
use encounter_core::{telemetry, Config, EncounterService, ErrorResponse, ServiceError};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "encounter-core", version, about = "Encounter lifecycle service tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run create, activate and complete against an in-memory store and print
    /// the records and audit trail as JSON
    Scenario {
        #[arg(long, default_value = "t1")]
        tenant: String,
        #[arg(long, default_value = "p1")]
        patient: String,
        #[arg(long, default_value = "operator")]
        actor: String,
        /// Correlation id attached to every audit entry (generated if absent)
        #[arg(long)]
        correlation_id: Option<String>,
    },
    /// Print the transport response for an error kind code
    RenderError { code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let metrics_handle = telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Scenario {
            tenant,
            patient,
            actor,
            correlation_id,
        } => run_scenario(&config, tenant, patient, actor, correlation_id).await?,
        Command::RenderError { code } => {
            let response = map_error_code(&code);
            let body = json!({
                "status": response.status.as_u16(),
                "body": response,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }
    Ok(())
}

async fn run_scenario(
    config: &Config,
    tenant: String,
    patient: String,
    actor: String,
    correlation_id: Option<String>,
) -> Result<()> {
    let tenant_id = TenantId::parse(tenant.as_str()).context("Invalid --tenant")?;
    let patient_id = PatientId::parse(patient).context("Invalid --patient")?;

    let mut claims = AuthorityClaims::new(actor, tenant, &[Capability::EncounterAll]);
    claims.correlation_id = correlation_id;

    let memory_sink = Arc::new(InMemoryAuditSink::new());
    let sink: Arc<dyn AuditSink> = match config.audit.sink {
        AuditSinkKind::Memory => memory_sink.clone(),
        AuditSinkKind::Tracing => Arc::new(TracingAuditSink::new()),
    };
    info!(sink = sink.sink_name(), "Running encounter scenario");

    let service = EncounterService::new(Arc::new(InMemoryEncounterRepository::new()), sink);

    let created = service
        .create(&tenant_id, &patient_id, &claims)
        .await
        .map_err(failure)?;
    let id = created.encounter_id();
    let activated = service
        .activate(&tenant_id, id, &claims)
        .await
        .map_err(failure)?;
    let completed = service
        .complete(&tenant_id, id, &claims)
        .await
        .map_err(failure)?;

    let output = json!({
        "records": [created, activated, completed],
        "audit": memory_sink.entries_for(id).await,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn failure(err: ServiceError) -> anyhow::Error {
    let response = ErrorResponse::from_error(&err);
    anyhow!(
        "{} {}: {}",
        response.status.as_u16(),
        response.error,
        response.message
    )
}
