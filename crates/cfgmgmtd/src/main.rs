//! cfgmgmtd entry point.
//!
//! File-backed front end for the configuration-management engine: validate a
//! config dump against the schema modules, or run a dynamic port breakout
//! against it. The live-datastore front ends drive the same library through
//! the `ConfigDb`/`AsicDb` traits.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use sonic_cfgmgmt_common::read_json_file;
use sonic_cfgmgmtd::tables::{DEFAULT_CONFIG_DB_JSON_FILE, DEFAULT_SCHEMA_DIR};
use sonic_cfgmgmtd::{ConfigMgmt, ConfigMgmtDpb, DpbStatus, JsonSchemaEngine, MemoryAsicDb, MemoryConfigDb};

#[derive(Parser)]
#[command(name = "cfgmgmtd", about = "SONiC config management and port breakout")]
struct Cli {
    /// Directory holding the schema modules.
    #[arg(long, default_value = DEFAULT_SCHEMA_DIR, global = true)]
    schema_dir: PathBuf,

    /// Fail if the config has tables without a schema module (tolerated by
    /// default).
    #[arg(long, global = true)]
    strict_schema: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validates a config dump against the schema.
    Validate {
        /// Config dump (config_db.json format).
        #[arg(long)]
        config: PathBuf,
    },
    /// Runs a dynamic port breakout against a config dump.
    Breakout {
        /// Config dump (config_db.json format).
        #[arg(long)]
        config: PathBuf,

        /// Ports to delete.
        #[arg(long, value_delimiter = ',', required = true)]
        delete_ports: Vec<String>,

        /// Ports to add.
        #[arg(long, value_delimiter = ',', required = true)]
        add_ports: Vec<String>,

        /// JSON file with the PORT-table config for the new ports.
        #[arg(long)]
        port_json: PathBuf,

        /// Delete dependent configuration instead of stopping.
        #[arg(long)]
        force: bool,

        /// Skip merging default config for the new ports.
        #[arg(long)]
        no_default_config: bool,

        /// Master default-configuration document.
        #[arg(long, default_value = DEFAULT_CONFIG_DB_JSON_FILE)]
        default_config: PathBuf,

        /// Write the resulting config dump here (defaults to stdout).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run_validate(cli: &Cli, config: &PathBuf) -> anyhow::Result<bool> {
    let tree = read_json_file(config).context("reading config dump")?;
    let engine = JsonSchemaEngine::new(&cli.schema_dir);
    let db = MemoryConfigDb::with_config(tree);

    let mut mgmt = ConfigMgmt::new(
        Box::new(engine),
        Box::new(db),
        !cli.strict_schema,
    )
    .await?;

    let without = mgmt.tables_without_schema();
    if !without.is_empty() {
        info!("Tables without schema models: {:?}", without);
    }
    Ok(mgmt.validate_config_data()?)
}

#[allow(clippy::too_many_arguments)]
async fn run_breakout(
    cli: &Cli,
    config: &PathBuf,
    delete_ports: &[String],
    add_ports: &[String],
    port_json: &PathBuf,
    force: bool,
    no_default_config: bool,
    default_config: &PathBuf,
    out: Option<&PathBuf>,
) -> anyhow::Result<bool> {
    let tree = read_json_file(config).context("reading config dump")?;
    let port_cfg = read_json_file(port_json).context("reading port config")?;

    let engine = JsonSchemaEngine::new(&cli.schema_dir);
    let config_db = MemoryConfigDb::with_config(tree);
    // File mode has no live hardware; map the deleted ports as already
    // unprogrammed so the checkpoint passes immediately.
    let asic_db = MemoryAsicDb::new();
    for (i, port) in delete_ports.iter().enumerate() {
        asic_db.map_port(port, &format!("{:x}", 0x1000_0000_0000 + i as u64));
    }

    let mut dpb = ConfigMgmtDpb::new(
        Box::new(engine),
        Box::new(config_db.clone()),
        Box::new(asic_db),
        !cli.strict_schema,
    )
    .await?
    .with_default_config_path(default_config);

    let status = dpb
        .break_out_port(delete_ports, add_ports, &port_cfg, force, !no_default_config)
        .await?;

    match status {
        DpbStatus::Completed => {
            let final_cfg = serde_json::to_string_pretty(&config_db.config())?;
            match out {
                Some(path) => std::fs::write(path, final_cfg)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{final_cfg}"),
            }
            info!("Breakout complete");
            Ok(true)
        }
        DpbStatus::Blocked(deps) => {
            error!("Breakout blocked; dependent configuration exists:");
            for dep in deps {
                error!("  {}", dep);
            }
            error!("Re-run with --force to delete dependents");
            Ok(false)
        }
        DpbStatus::ValidationFailed => {
            error!("Breakout aborted: resulting config failed validation");
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Validate { config } => run_validate(&cli, config).await,
        Command::Breakout {
            config,
            delete_ports,
            add_ports,
            port_json,
            force,
            no_default_config,
            default_config,
            out,
        } => {
            run_breakout(
                &cli,
                config,
                delete_ports,
                add_ports,
                port_json,
                *force,
                *no_default_config,
                default_config,
                out.as_ref(),
            )
            .await
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("cfgmgmtd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
