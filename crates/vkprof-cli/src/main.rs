mod manifest;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use vkprof_core::ProfilerConfig;

use crate::manifest::LayerManifest;

#[derive(Parser)]
#[command(name = "vkprof")]
#[command(about = "vkprof - Vulkan profiling layer tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the loader manifest (JSON) for the layer library
    Manifest {
        /// Path to the layer shared library
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate an implicit layer manifest
        #[arg(long)]
        implicit: bool,
    },

    /// Print the effective profiler configuration as TOML
    Config {
        /// Configuration file path (default search order when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    vkprof_common::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest {
            library,
            output,
            implicit,
        } => {
            let library = library.unwrap_or_else(|| PathBuf::from(vkprof_common::platform::layer_library_name()));
            let json = LayerManifest::new(&library, implicit)
                .to_json()
                .context("failed to serialize layer manifest")?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json + "\n")
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(
                        "wrote {} manifest for {} ({})",
                        if implicit { "implicit" } else { "explicit" },
                        library.display(),
                        vkprof_common::platform::platform_name()
                    );
                }
                None => println!("{}", json),
            }
        }
        Commands::Config { config } => {
            let path = config.unwrap_or_else(vkprof_common::platform::default_config_path);
            info!("reading configuration from {}", path.display());
            let config = ProfilerConfig::load_or_default(&path);
            let text = config
                .to_toml_string()
                .context("failed to serialize configuration")?;
            print!("{}", text);
        }
    }

    Ok(())
}
