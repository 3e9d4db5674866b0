//! VM lifecycle command
//!
//! Reads one request document (YAML or JSON) from stdin, runs it against
//! the cluster in the current kubeconfig context and prints the JSON
//! response on stdout. Failures print a structured error document and exit
//! non-zero. Configuration comes from `KUBEVIRT_*` environment variables.

use anyhow::Context;
use kubevirt_client::KubeVirtClient;
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vm_lifecycle::{EngineConfig, EngineError, LifecycleEngine, Request, handle};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Request failed: {:#}", e);
            let document = match e.downcast_ref::<EngineError>() {
                Some(engine_error) => engine_error.to_document(),
                None => serde_json::json!({
                    "error": { "kind": "request", "message": format!("{:#}", e) }
                }),
            };
            println!("{}", document);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<serde_json::Value> {
    let config = EngineConfig::from_env().context("Failed to load configuration")?;
    let request = read_request().context("Failed to read request")?;

    info!("Configuration:");
    info!("  Default namespace: {}", config.default_namespace);
    info!("  Managed tag: {}", config.managed_tag);
    info!("  Inline cloud-init limit: {} bytes", config.inline_limit);

    let client = KubeVirtClient::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let engine = LifecycleEngine::new(Box::new(client), config);

    let response = handle(&engine, request).await?;
    serde_json::to_value(&response).context("Failed to serialize response")
}

fn read_request() -> anyhow::Result<Request> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read stdin")?;
    serde_yaml::from_str(&raw).context("Failed to parse request document")
}
