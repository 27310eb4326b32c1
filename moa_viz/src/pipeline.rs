//! Stages run by subcommands of `moa` binary.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use anyhow::{anyhow, bail, Context};
use log::{info, warn};
use plotters::style::RGBColor;
use serde::Serialize;
use moa_core::env::Environment;
use moa_core::table::CompleteRollout;
use moa_rl::artifact::PolicyArtifact;
use moa_rl::policy::{MixtureOfActorsPolicy, PolicySpec};
use moa_rl::tch::{self, Device};
use moa_rl::tch::nn::VarStore;
use moa_rl::train::{PpoTrainer, TrainSummary};
use crate::capture::{BitmapCapture, NoCapture};
use crate::collect::{collect, CollectionSummary};
use crate::embedding::{embed, EmbeddingTable, EMBEDDING_FILE};
use crate::envs::{AnyEnv, EnvName};
use crate::options::{ArtifactArgs, CollectOptions, EmbedOptions, EnvArgs, PlotOptions, RunOptions, TrainOptions};
use crate::plots::{plot_embedding, plot_many_series, PlotSeries, SCATTER_FILE};
use crate::tsne::TsneConfig;

/// File name of collection summary inside data directory.
pub const COLLECTION_SUMMARY_FILE: &str = "collection.yaml";

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()>{
    let file = File::create(path)
        .with_context(|| format!("Creating {}", path.display()))?;
    serde_yaml::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

fn build_env(env: &EnvArgs) -> AnyEnv{
    tch::manual_seed(env.seed as i64);
    env.env_name.build(env.seed)
}

/// Loads policy artifact stored for environment, checking that it was trained on it.
pub fn load_policy(env: &EnvArgs, artifact: &ArtifactArgs, device: Device) -> anyhow::Result<MixtureOfActorsPolicy>{
    let location = PolicyArtifact::at(&artifact.load_dir, env.env_name.id(), &artifact.artifact);
    if !location.exists(){
        bail!("No policy artifact at {} (train one with `moa train`)", location.weights_path().display());
    }
    let (meta, policy) = location.load(device)?;
    let trained_on = EnvName::from_id(&meta.env_name)?;
    if trained_on != env.env_name{
        bail!("Artifact {} was trained on {}, not {}", location.meta_path().display(), meta.env_name, env.env_name.id());
    }
    if policy.spec().num_stack != env.num_stack{
        warn!("Artifact stacks {} frames, ignoring --num-stack {}", policy.spec().num_stack, env.num_stack);
    }
    Ok(policy)
}

/// Trains new policy and saves it as artifact.
pub fn run_train(options: &TrainOptions, device: Device) -> anyhow::Result<TrainSummary>{
    let env = build_env(&options.env);
    let spec = PolicySpec::new(env.observation_size(), options.env.num_stack, options.num_actors, env.action_space())
        .with_hidden_size(options.hidden_size);
    let policy = MixtureOfActorsPolicy::new(VarStore::new(device), spec)?;
    let config = options.ppo_config();
    info!("Training {} actors on {} for {} updates of {} steps",
        options.num_actors, options.env.env_name.id(), config.num_updates(), config.num_steps());

    let mut trainer = PpoTrainer::new(env, policy, config)?;
    let summary = trainer.train()?;
    info!("Finished {} episodes, last mean return {:?}", summary.episodes, summary.last_mean_return());

    PolicyArtifact::at(&options.artifact.load_dir, options.env.env_name.id(), &options.artifact.artifact)
        .save(trainer.policy(), options.env.env_name.id())?;

    if let Some(path) = &options.summary_file{
        write_yaml(path, &summary)?;
    }
    if let Some(path) = &options.plot_file{
        let returns = summary.updates.iter()
            .map(|u| u.mean_return.unwrap_or(0.0))
            .collect();
        plot_many_series(path, "Mean episode return", &[PlotSeries{
            data: returns,
            description: "mean return".into(),
            color: RGBColor(0x1f, 0x77, 0xb4),
        }], "update", "return").map_err(|e| anyhow!("Plotting training curve: {e}"))?;
    }
    Ok(summary)
}

/// Collects rollout with trained policy and writes `X.csv`, `y.csv` and frames.
pub fn run_collect(options: &CollectOptions, device: Device) -> anyhow::Result<(CompleteRollout, CollectionSummary, usize)>{
    let policy = load_policy(&options.env, &options.artifact, device)?;
    let mut env = build_env(&options.env);
    let config = options.collector_config();
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Creating data directory {}", config.data_dir.display()))?;

    let (rollout, summary) = match options.no_images{
        true => collect(&mut env, &policy, &mut NoCapture, &config)?,
        false => collect(&mut env, &policy, &mut BitmapCapture::default(), &config)?,
    };
    rollout.save(&config.data_dir)?;
    write_yaml(&config.data_dir.join(COLLECTION_SUMMARY_FILE), &summary)?;
    info!("Saved {} rows to {}", rollout.len(), config.data_dir.display());
    Ok((rollout, summary, policy.num_actors()))
}

fn embed_rollout(rollout: &CompleteRollout, data_dir: &Path, config: TsneConfig) -> anyhow::Result<EmbeddingTable>{
    let table = embed(rollout, config)?;
    table.save(&data_dir.join(EMBEDDING_FILE))?;
    Ok(table)
}

/// Embeds tables previously written to data directory.
pub fn run_embed(options: &EmbedOptions) -> anyhow::Result<EmbeddingTable>{
    let rollout = CompleteRollout::load(&options.data_dir)?;
    embed_rollout(&rollout, &options.data_dir, options.tsne.tsne_config())
}

/// Plots embedding table previously written to data directory.
pub fn run_plot(options: &PlotOptions) -> anyhow::Result<()>{
    let table = EmbeddingTable::load(&options.data_dir.join(EMBEDDING_FILE))?;
    if table.label_count() > options.num_actors{
        warn!("Table has labels up to {}, plotting only {} actors", table.label_count() - 1, options.num_actors);
    }
    plot_embedding(&options.data_dir.join(SCATTER_FILE), &table, options.num_actors)
        .map_err(|e| anyhow!("Plotting embedding: {e}"))
}

/// Collects (or loads) rollout, embeds it and plots the embedding.
pub fn run_all(options: &RunOptions, device: Device) -> anyhow::Result<()>{
    let data_dir = &options.collect.data_dir;
    let (rollout, policy_actors) = match options.load{
        true => {
            let rollout = CompleteRollout::load(data_dir)?;
            info!("Loaded {} rows from {}", rollout.len(), data_dir.display());
            (rollout, None)
        },
        false => {
            let (rollout, _, actors) = run_collect(&options.collect, device)?;
            (rollout, Some(actors))
        }
    };
    let table = embed_rollout(&rollout, data_dir, options.tsne.tsne_config())?;
    let num_actors = options.num_actors
        .or(policy_actors)
        .unwrap_or_else(|| table.label_count());
    plot_embedding(&data_dir.join(SCATTER_FILE), &table, num_actors)
        .map_err(|e| anyhow!("Plotting embedding: {e}"))
}
