//! hermod — back-office data CLI
//!
//! Reads and writes the four resource domains through the same cache and
//! mutation pipeline the library exposes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hermod::{Config, Domain, Filters, Hermod, HermodBuilder, ResourceClient};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Hermod CLI client
#[derive(Parser)]
#[command(name = "hermod")]
#[command(version = hermod::PKG_VERSION)]
#[command(about = "Back-office resource client")]
struct Args {
    /// Config file (default: ~/.hermod/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(short, long, env = "HERMOD_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token (overrides the config file)
    #[arg(long, env = "HERMOD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List records of a domain
    List {
        /// Domain (customer-types, manpower-services, invoices, visa-processing-services)
        domain: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        status: Option<String>,
        /// Free-text search
        #[arg(short = 'q', long)]
        search: Option<String>,
        /// Extra filter as key=value (repeatable)
        #[arg(short, long = "filter", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
    },

    /// List invoices with an outstanding balance
    Pending {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show one record
    Get { domain: String, id: String },

    /// Create a record from key=value fields
    Create {
        domain: String,
        #[arg(short, long = "set", value_parser = parse_pair, required = true)]
        fields: Vec<(String, String)>,
    },

    /// Update fields of a record
    Update {
        domain: String,
        id: String,
        #[arg(short, long = "set", value_parser = parse_pair, required = true)]
        fields: Vec<(String, String)>,
    },

    /// Delete one or more records
    Delete {
        domain: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let hermod = connect(&args)?;

    match args.command {
        Command::List {
            domain,
            page,
            limit,
            status,
            search,
            filters,
        } => {
            let mut f = Filters::new()
                .with_opt("page", page)
                .with_opt("limit", limit)
                .with_opt("status", status)
                .with_opt("q", search);
            for (key, value) in filters {
                f.set(key, value);
            }
            let page = match domain.parse::<Domain>()? {
                Domain::CustomerTypes => list(hermod.customer_types(), &f).await?,
                Domain::ManpowerServices => list(hermod.manpower_services(), &f).await?,
                Domain::Invoices => list(hermod.invoices(), &f).await?,
                Domain::VisaProcessingServices => list(hermod.visa_processing(), &f).await?,
            };
            print_json(&page)?;
        }

        Command::Pending { page, limit } => {
            let f = Filters::new().with_opt("page", page).with_opt("limit", limit);
            let pending = hermod
                .invoices()
                .sub_list(hermod::domains::invoices::PENDING, &f)
                .await?;
            print_json(&pending)?;
        }

        Command::Get { domain, id } => {
            let record = match domain.parse::<Domain>()? {
                Domain::CustomerTypes => detail(hermod.customer_types(), &id).await?,
                Domain::ManpowerServices => detail(hermod.manpower_services(), &id).await?,
                Domain::Invoices => detail(hermod.invoices(), &id).await?,
                Domain::VisaProcessingServices => detail(hermod.visa_processing(), &id).await?,
            };
            print_json(&record)?;
        }

        Command::Create { domain, fields } => {
            let body = body_of(fields);
            let record = match domain.parse::<Domain>()? {
                Domain::CustomerTypes => create(hermod.customer_types(), body).await?,
                Domain::ManpowerServices => create(hermod.manpower_services(), body).await?,
                Domain::Invoices => create(hermod.invoices(), body).await?,
                Domain::VisaProcessingServices => create(hermod.visa_processing(), body).await?,
            };
            print_json(&record)?;
        }

        Command::Update { domain, id, fields } => {
            let body = body_of(fields);
            let record = match domain.parse::<Domain>()? {
                Domain::CustomerTypes => update(hermod.customer_types(), &id, body).await?,
                Domain::ManpowerServices => update(hermod.manpower_services(), &id, body).await?,
                Domain::Invoices => update(hermod.invoices(), &id, body).await?,
                Domain::VisaProcessingServices => {
                    update(hermod.visa_processing(), &id, body).await?
                }
            };
            print_json(&record)?;
        }

        Command::Delete { domain, ids } => {
            let outcome = match domain.parse::<Domain>()? {
                Domain::CustomerTypes => hermod.customer_types().delete_many(&ids).await,
                Domain::ManpowerServices => hermod.manpower_services().delete_many(&ids).await,
                Domain::Invoices => hermod.invoices().delete_many(&ids).await,
                Domain::VisaProcessingServices => {
                    hermod.visa_processing().delete_many(&ids).await
                }
            };
            println!("deleted: {}/{}", outcome.success_count, outcome.total());
            for (id, err) in &outcome.failures {
                eprintln!("{id}: {err}");
            }
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Build the client from the config file and command-line overrides.
fn connect(args: &Args) -> hermod::Result<Hermod> {
    let mut builder = match Config::load(args.config.as_deref()) {
        Ok(config) => HermodBuilder::from_config(&config),
        // Without --config, a missing default file is fine when --base-url is given.
        Err(_) if args.config.is_none() && args.base_url.is_some() => HermodBuilder::new(),
        Err(err) => return Err(err),
    };
    if let Some(url) = &args.base_url {
        builder = builder.base_url(url);
    }
    if let Some(token) = &args.token {
        builder = builder.bearer_token(token);
    }
    builder.build()
}

async fn list<E: Serialize + DeserializeOwned>(
    client: &ResourceClient<E>,
    filters: &Filters,
) -> hermod::Result<Value> {
    Ok(serde_json::to_value(client.list(filters).await?)?)
}

async fn detail<E: Serialize + DeserializeOwned>(
    client: &ResourceClient<E>,
    id: &str,
) -> hermod::Result<Value> {
    Ok(serde_json::to_value(client.detail(id).await?)?)
}

async fn create<E: Serialize + DeserializeOwned>(
    client: &ResourceClient<E>,
    body: Value,
) -> hermod::Result<Value> {
    Ok(serde_json::to_value(client.create(body).await?)?)
}

async fn update<E: Serialize + DeserializeOwned>(
    client: &ResourceClient<E>,
    id: &str,
    body: Value,
) -> hermod::Result<Value> {
    Ok(serde_json::to_value(client.update(id, body).await?)?)
}

/// `key=value` pairs as a JSON object. Values that parse as JSON numbers
/// or booleans keep that type.
fn body_of(fields: Vec<(String, String)>) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(key, raw)| {
            let value = match serde_json::from_str::<Value>(&raw) {
                Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
                _ => Value::String(raw),
            };
            (key, value)
        })
        .collect();
    Value::Object(map)
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
