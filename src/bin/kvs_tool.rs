//! SafeKVS Tool
//!
//! Command-line access to a store directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use safekvs::{Config, Kvs, KvsValue, OpenNeedDefaults, OpenNeedKvs, SnapshotId};
use serde_json::Value as JsonValue;
use tracing_subscriber::{fmt, EnvFilter};

/// SafeKVS Tool
#[derive(Parser, Debug)]
#[command(name = "kvs-tool")]
#[command(about = "Inspect and edit a SafeKVS store")]
#[command(version)]
struct Args {
    /// Base directory of the store
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Process name (subdirectory under the base directory)
    #[arg(short, long, default_value = "default")]
    process: String,

    /// Instance id
    #[arg(short, long, default_value = "0")]
    instance: usize,

    /// Fail if the default file is missing
    #[arg(long)]
    require_defaults: bool,

    /// Fail if generation 0 is missing
    #[arg(long)]
    require_kvs: bool,

    /// Do not flush on exit
    #[arg(long)]
    no_flush: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key (default fallback applies)
    Get {
        key: String,
    },

    /// Get the default value of a key
    GetDefault {
        key: String,
    },

    /// Set a key to a JSON value
    Set {
        key: String,

        /// JSON text, e.g. 42, "text" or {"a":[1,2]}
        value: String,
    },

    /// Remove a key from the working set
    Remove {
        key: String,
    },

    /// List working-set keys
    Keys,

    /// Clear the working set
    Reset,

    /// Flush now
    Flush,

    /// Show snapshot count and bound
    Snapshots,

    /// Restore a snapshot generation into the working set
    Restore {
        id: usize,
    },

    /// Show the files of a generation
    Files {
        id: usize,
    },
}

impl Commands {
    /// Whether the command changes the working set
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Set { .. } | Commands::Remove { .. } | Commands::Reset | Commands::Restore { .. }
        )
    }
}

fn main() {
    // Logs go to stderr so command output stays clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,safekvs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("SafeKVS Tool v{}", safekvs::VERSION);

    let config = Config::builder()
        .dir(&args.dir)
        .process_name(&args.process)
        .instance_id(args.instance)
        .need_defaults(if args.require_defaults {
            OpenNeedDefaults::Required
        } else {
            OpenNeedDefaults::Optional
        })
        .need_kvs(if args.require_kvs {
            OpenNeedKvs::Required
        } else {
            OpenNeedKvs::Optional
        })
        .build();

    let kvs = match Kvs::open(config) {
        Ok(kvs) => kvs,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };
    // Only edits persist on exit; every flush rotates out the oldest generation
    kvs.set_flush_on_exit(args.command.mutates() && !args.no_flush);

    if let Err(e) = run(&kvs, args.command) {
        tracing::error!(code = ?e.code(), "{}", e);
        kvs.set_flush_on_exit(false);
        drop(kvs);
        std::process::exit(2);
    }
}

fn run(kvs: &Kvs, command: Commands) -> safekvs::Result<()> {
    match command {
        Commands::Get { key } => print_value(&kvs.get_value(&key)?)?,
        Commands::GetDefault { key } => print_value(&kvs.get_default_value(&key)?)?,
        Commands::Set { key, value } => {
            let json: JsonValue = serde_json::from_str(&value)
                .map_err(|e| safekvs::KvsError::JsonParser(e.to_string()))?;
            kvs.set_value(key, KvsValue::try_from(&json)?)?;
        }
        Commands::Remove { key } => kvs.remove_key(&key)?,
        Commands::Keys => {
            for key in kvs.get_all_keys()? {
                println!("{}", key);
            }
        }
        Commands::Reset => kvs.reset()?,
        Commands::Flush => kvs.flush()?,
        Commands::Snapshots => {
            println!("{} / {}", kvs.snapshot_count(), Kvs::max_snapshot_count());
        }
        Commands::Restore { id } => kvs.snapshot_restore(SnapshotId::new(id))?,
        Commands::Files { id } => {
            let id = SnapshotId::new(id);
            println!("{}", kvs.get_kvs_filename(id)?.display());
            println!("{}", kvs.get_hash_filename(id)?.display());
        }
    }
    Ok(())
}

fn print_value(value: &KvsValue) -> safekvs::Result<()> {
    let json = JsonValue::try_from(value)?;
    println!("{}", json);
    Ok(())
}
