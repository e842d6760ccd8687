//! Causal tracer: record episodes and replay counterfactual branches.
//!
//! Provides subcommands that exercise the tracer on the reference chain
//! environment:
//!
//! - `trace`           -- Record one episode and optionally save it as JSON
//! - `counterfactual`  -- Record one episode, then branch it
//! - `train`           -- Run the causal tracer agent over several episodes
//! - `inspect`         -- Summarise a saved trace

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use causal_tracer::agent::{flip_binary_action, Agent, CausalTracer};
use causal_tracer::config::TracerConfig;
use causal_tracer::env::chain::{always_advance, chain_symbol, ChainEnv, ChainModel};
use causal_tracer::env::Environment;
use causal_tracer::trace::{Metadata, Recorder, Step, TraceBuffer};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Record agent-environment episodes and replay counterfactual branches.
#[derive(Parser)]
#[command(name = "causal-tracer", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for branch sampling (overrides the configuration file).
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one episode with the always-advance policy.
    Trace {
        /// Path to save the recorded trace.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Record one episode, then build a counterfactual from it.
    Counterfactual {
        /// Branch index (sampled when omitted).
        #[arg(long)]
        index: Option<usize>,

        /// Action to take at the branch (flips the recorded action when omitted).
        #[arg(long)]
        action: Option<u32>,
    },

    /// Run the causal tracer agent for several episodes.
    Train {
        /// Number of episodes to observe.
        #[arg(long, default_value_t = 3)]
        episodes: usize,
    },

    /// Summarise a saved trace.
    Inspect {
        /// Path to the trace JSON file.
        #[arg(default_value = "data/trace.json")]
        path: PathBuf,
    },
}

/// On-disk form of a recorded episode.
#[derive(Debug, Serialize, Deserialize)]
struct SavedTrace {
    episode_id: String,
    goal: u32,
    steps: Vec<Metadata>,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TracerConfig::load_from_file(path)?,
        None => TracerConfig::default(),
    };
    if cli.seed.is_some() {
        config.sampling.seed = cli.seed;
    }

    match cli.command {
        Commands::Trace { output } => cmd_trace(&config, output.as_deref()),
        Commands::Counterfactual { index, action } => cmd_counterfactual(&config, index, action),
        Commands::Train { episodes } => cmd_train(&config, episodes),
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_trace(config: &TracerConfig, output: Option<&Path>) -> Result<()> {
    let mut recorder = build_recorder(config);
    let mut env = ChainEnv::new(config.chain.goal);

    let buffer = recorder.trace_episode(&mut env, &mut always_advance, config.episode.max_steps)?;
    tracing::info!(steps = buffer.len(), "Recorded episode");
    print_trace("Recorded trace", buffer.as_slice());

    if let Some(path) = output {
        let saved = SavedTrace {
            episode_id: Uuid::new_v4().to_string(),
            goal: config.chain.goal,
            steps: buffer.to_records()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&saved)?;
        std::fs::write(path, json)?;

        tracing::info!(path = %path.display(), episode_id = %saved.episode_id, "Saved trace");
    }

    Ok(())
}

fn cmd_counterfactual(
    config: &TracerConfig,
    index: Option<usize>,
    action: Option<u32>,
) -> Result<()> {
    let mut recorder = build_recorder(config);
    let mut env = ChainEnv::new(config.chain.goal);

    recorder.trace_episode(&mut env, &mut always_advance, config.episode.max_steps)?;
    print_trace("Recorded trace", recorder.buffer().as_slice());

    let (branch_index, steps) = match index {
        Some(index) => {
            let new_action = match action {
                Some(a) => a,
                None => {
                    let step = recorder
                        .buffer()
                        .get(index)
                        .with_context(|| format!("No recorded step at index {index}"))?;
                    flip_binary_action(step)?
                }
            };
            (index, recorder.generate_counterfactual(index, new_action)?)
        }
        None => {
            let cf = match action {
                Some(a) => recorder.sample_counterfactual(&config.sampling.method, |_| Ok(a))?,
                None => recorder
                    .sample_counterfactual(&config.sampling.method, flip_binary_action::<u32, u32>)?,
            };
            (cf.branch_index, cf.steps)
        }
    };

    tracing::info!(branch_index, steps = steps.len(), "Built counterfactual");
    print_trace(&format!("Counterfactual (branch at {branch_index})"), &steps);
    Ok(())
}

fn cmd_train(config: &TracerConfig, episodes: usize) -> Result<()> {
    let mut agent = CausalTracer::new(build_recorder(config))
        .with_intervention_method(config.sampling.method.clone());
    let mut env = ChainEnv::new(config.chain.goal);

    for episode in 0..episodes {
        agent.reset();
        let mut state = env.reset()?;

        for _ in 0..config.episode.max_steps {
            let action = always_advance(&state)?;
            let outcome = env.step(&action)?;
            let next_state = outcome.next_state;
            let done = outcome.done;
            agent.observe(state, action, outcome)?;
            if done {
                break;
            }
            state = next_state;
        }

        let observed = agent.recorder().buffer().len();
        match agent.train()? {
            Some(cf) => tracing::info!(
                episode,
                observed,
                branch_index = cf.branch_index,
                "Episode contrasted"
            ),
            None => tracing::warn!(episode, observed, "Episode too short to contrast"),
        }
    }

    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let saved: SavedTrace = serde_json::from_str(&text).context("Failed to parse saved trace")?;
    let buffer: TraceBuffer<u32, u32> = TraceBuffer::from_records(saved.steps)?;

    let total_reward: f64 = buffer.as_slice().iter().map(Step::reward).sum();
    let terminated = buffer.as_slice().last().is_some_and(Step::done);

    println!("Trace: {}", path.display());
    println!("  Episode: {}", saved.episode_id);
    println!("  Goal: {}", saved.goal);
    println!("  Steps: {}", buffer.len());
    println!("  Total reward: {total_reward}");
    println!("  Terminated: {terminated}");
    println!();
    print_trace("Steps", buffer.as_slice());

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_recorder(config: &TracerConfig) -> Recorder<u32, u32, ChainModel> {
    let recorder = Recorder::new(ChainModel::new(config.chain.goal)).with_mapper(chain_symbol);
    match config.sampling.seed {
        Some(seed) => recorder.with_seed(seed),
        None => recorder,
    }
}

fn print_trace(title: &str, steps: &[Step<u32, u32>]) {
    println!("{title}:");
    for (i, step) in steps.iter().enumerate() {
        println!(
            "  Step {i}: S={}, A={}, R={}, S'={}, Done={}",
            step.state(),
            step.symbol(),
            step.reward(),
            step.next_state(),
            step.done()
        );
    }
}
