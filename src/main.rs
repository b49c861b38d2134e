//! Command line entry point for inspecting NextItNet models
//!
//! - `summary`: build the model described by a config file and print its layout
//! - `forward`: run a random batch through the model and report the output
//! - `init-config`: write a default configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::info;

use nextitnet_rec::{setup_logging, Config, NextItNet};

#[derive(Parser)]
#[command(name = "nextitnet")]
#[command(version)]
#[command(about = "Dilated causal convolution networks for next-item prediction", long_about = None)]
struct Cli {
    /// Path to configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the model summary
    Summary,

    /// Run a random batch of item sequences through the model
    Forward {
        /// Number of sequences
        #[arg(short, long, default_value = "2")]
        batch: usize,

        /// Sequence length
        #[arg(short, long, default_value = "16")]
        seq_len: usize,

        /// Seed for the random item ids
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Apply the explicit weight initialization before the forward pass
        #[arg(long)]
        init_weights: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "config/default.toml")]
        output: String,
    },
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("failed to load config from {}", path)),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    setup_logging(level);

    match cli.command {
        Commands::Summary => {
            let model = NextItNet::new(config.model)?;
            println!("{}", model.summary());
        }
        Commands::Forward {
            batch,
            seq_len,
            seed,
            init_weights,
        } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut model = NextItNet::new(config.model)?;
            if init_weights {
                model.init_weights(&mut rng)?;
            }

            let vocab_size = model.config.vocab_size;
            let pad_token = model.config.pad_token;
            let item_seq = Array2::from_shape_simple_fn((batch, seq_len), || loop {
                let id = rng.gen_range(0..=vocab_size);
                if id != pad_token {
                    break id;
                }
            });

            let start = Instant::now();
            let logits = model.forward(&item_seq)?;
            let elapsed = start.elapsed();

            let finite = logits.iter().all(|v| v.is_finite());
            info!(shape = ?logits.shape(), ?elapsed, finite, "forward pass complete");

            println!("Input shape:  {:?}", item_seq.shape());
            println!("Output shape: {:?}", logits.shape());
            println!("All finite:   {}", finite);
            println!("Elapsed:      {:?}", elapsed);
        }
        Commands::InitConfig { output } => {
            if let Some(parent) = std::path::Path::new(&output).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Config::create_default(&output)?;
            info!(path = %output, "default configuration written");
        }
    }

    Ok(())
}
