use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;

use adf_client::{InMemoryFactory, ResourceId};
use adf_core::{json_equivalent, normalize_json, Diagnostics, PropertyBag};
use adf_resource::{
    binary_dataset, custom_dataset, linked_custom_service, pipeline, sql_linked_service,
    ResourceData,
};

#[derive(Parser, Debug)]
#[command(name = "adfctl", version, about = "Data Factory resource codec CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Kind {
    LinkedCustomService,
    CustomDataset,
    Pipeline,
    BinaryDataset,
    SqlLinkedService,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Re-serialize a JSON document in canonical (key-sorted) form
    Normalize {
        /// Path to a JSON file
        file: String,
    },
    /// Compare two JSON documents up to key ordering
    Diff {
        old: String,
        new: String,
        /// Compare as connection strings (password-token aware) instead of JSON
        #[arg(long = "connection-string", action = ArgAction::SetTrue)]
        connection_string: bool,
    },
    /// Validate an activities_json array and re-encode it
    Activities {
        /// Path to a file holding a bare JSON array of activities
        file: String,
    },
    /// Expand flat resource config into the wire-level properties body
    Expand {
        #[arg(long = "kind", value_enum)]
        kind: Kind,
        /// Path to a flat config JSON object
        file: String,
    },
    /// Flatten a wire-level properties body back into flat config fields
    Flatten {
        #[arg(long = "kind", value_enum)]
        kind: Kind,
        /// Path to a properties JSON object
        file: String,
    },
    /// Create, read back, and delete a resource against an in-memory factory
    Smoke {
        #[arg(long = "kind", value_enum)]
        kind: Kind,
        /// Path to a flat config JSON object
        file: String,
    },
}

fn init_tracing() {
    let env = std::env::var("ADF_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("ADF_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid ADF_METRICS_ADDR; expected host:port");
        }
    }
}

fn load_json(path: &str) -> Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", path))
}

fn build_for(kind: Kind, label: &str, data: &ResourceData) -> Result<PropertyBag> {
    match kind {
        Kind::LinkedCustomService => linked_custom_service::build_properties(label, data),
        Kind::CustomDataset => custom_dataset::build_properties(label, data),
        Kind::Pipeline => pipeline::build_properties(label, data),
        Kind::BinaryDataset => binary_dataset::build_properties(label, data),
        Kind::SqlLinkedService => sql_linked_service::build_properties(label, data),
    }
}

fn absorb_for(
    kind: Kind,
    bag: PropertyBag,
    label: &str,
    data: &mut ResourceData,
) -> Result<Diagnostics> {
    match kind {
        Kind::LinkedCustomService => linked_custom_service::absorb_properties(bag, label, data),
        Kind::CustomDataset => custom_dataset::absorb_properties(bag, label, data),
        Kind::Pipeline => pipeline::absorb_properties(bag, label, data),
        Kind::BinaryDataset => binary_dataset::absorb_properties(bag, label, data),
        Kind::SqlLinkedService => sql_linked_service::absorb_properties(bag, label, data),
    }
}

fn print_diags(diags: &Diagnostics) {
    for d in diags.entries() {
        eprintln!("warning: {}: {}", d.field, d.detail);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file))?;
            println!("{}", normalize_json(&raw)?);
        }
        Commands::Diff { old, new, connection_string } => {
            let old_raw =
                std::fs::read_to_string(&old).with_context(|| format!("reading {}", old))?;
            let new_raw =
                std::fs::read_to_string(&new).with_context(|| format!("reading {}", new))?;
            let equivalent = if connection_string {
                adf_codec::connection_strings_equivalent(old_raw.trim(), new_raw.trim())
            } else {
                json_equivalent(&old_raw, &new_raw)
            };
            match cli.output {
                Output::Human => {
                    println!("{}", if equivalent { "equivalent" } else { "different" })
                }
                Output::Json => println!("{}", serde_json::json!({ "equivalent": equivalent })),
            }
            if !equivalent {
                std::process::exit(1);
            }
        }
        Commands::Activities { file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file))?;
            let activities = adf_pipeline::deserialize_activities(&raw)?;
            info!(count = activities.len(), "activities decoded");
            match cli.output {
                Output::Human => {
                    for a in &activities {
                        println!("{} • {}", a.kind.as_tag(), a.name);
                    }
                }
                Output::Json => println!("{}", adf_pipeline::serialize_activities(&activities)?),
            }
        }
        Commands::Expand { kind, file } => {
            let data = ResourceData::from_json(load_json(&file)?)?;
            let bag = build_for(kind, &file, &data)?;
            println!("{}", serde_json::to_string_pretty(&Value::Object(bag))?);
        }
        Commands::Flatten { kind, file } => {
            let v = load_json(&file)?;
            // Accept either a bare properties object or a full envelope.
            let props = v.get("properties").cloned().unwrap_or(v);
            let bag = match props {
                Value::Object(map) => map,
                _ => anyhow::bail!("{}: expected a JSON object of properties", file),
            };
            let mut data = ResourceData::new();
            let diags = absorb_for(kind, bag, &file, &mut data)?;
            print_diags(&diags);
            println!("{}", serde_json::to_string_pretty(&data.to_json())?);
        }
        Commands::Smoke { kind, file } => {
            let client = InMemoryFactory::new();
            let id = ResourceId::new("rg", "factory", "smoke");
            let mut data = ResourceData::from_json(load_json(&file)?)?;
            match kind {
                Kind::LinkedCustomService => {
                    linked_custom_service::create(&client, &id, &mut data).await?;
                    let diags = linked_custom_service::read(&client, &id, &mut data).await?;
                    print_diags(&diags);
                    linked_custom_service::delete(&client, &id).await?;
                }
                Kind::CustomDataset => {
                    custom_dataset::create(&client, &id, &mut data).await?;
                    let diags = custom_dataset::read(&client, &id, &mut data).await?;
                    print_diags(&diags);
                    custom_dataset::delete(&client, &id).await?;
                }
                Kind::Pipeline => {
                    pipeline::create(&client, &id, &mut data).await?;
                    let diags = pipeline::read(&client, &id, &mut data).await?;
                    print_diags(&diags);
                    pipeline::delete(&client, &id).await?;
                }
                Kind::BinaryDataset => {
                    binary_dataset::create(&client, &id, &mut data).await?;
                    let diags = binary_dataset::read(&client, &id, &mut data).await?;
                    print_diags(&diags);
                    binary_dataset::delete(&client, &id).await?;
                }
                Kind::SqlLinkedService => {
                    sql_linked_service::create(&client, &id, &mut data).await?;
                    let diags = sql_linked_service::read(&client, &id, &mut data).await?;
                    print_diags(&diags);
                    sql_linked_service::delete(&client, &id).await?;
                }
            }
            match cli.output {
                Output::Human => println!("create/read/delete round trip ok"),
                Output::Json => println!("{}", serde_json::to_string_pretty(&data.to_json())?),
            }
        }
    }

    Ok(())
}
