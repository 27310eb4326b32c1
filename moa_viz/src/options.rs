use std::path::PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use moa_rl::policy::ActMode;
use moa_rl::distribution::SelectionMode;
use moa_rl::tch::Device;
use moa_rl::train::ConfigPpo;
use crate::collect::CollectorConfig;
use crate::envs::EnvName;
use crate::tsne::TsneConfig;

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum ComputeDevice{
    Cpu,
    Cuda,
}

impl ComputeDevice{
    pub fn device(&self) -> Device{
        match self{
            ComputeDevice::Cpu => Device::Cpu,
            ComputeDevice::Cuda => Device::Cuda(0),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct MoaOptions{

    #[arg(short = 'v', long = "log-level", default_value = "info", global = true)]
    pub log_level: LevelFilter,

    #[arg(short = 'A', long = "log-level-rl", default_value = "warn", global = true)]
    pub log_level_rl: LevelFilter,

    #[arg(short = 'o', long = "logfile", global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(short = 'd', long = "device", value_enum, default_value = "cpu", global = true)]
    pub device: ComputeDevice,

    #[command(subcommand)]
    pub command: MoaCommand,
}

#[derive(Subcommand, Debug)]
pub enum MoaCommand{
    /// Train mixture-of-actors policy with PPO and save artifact
    Train(TrainOptions),
    /// Roll policy out and record observations with chosen actors
    Collect(CollectOptions),
    /// Embed recorded observations with t-SNE
    Embed(EmbedOptions),
    /// Scatter plot of embedding coloured by actor
    Plot(PlotOptions),
    /// Collect (or load), embed and plot
    Run(RunOptions),
}

#[derive(Args, Debug, Clone)]
pub struct EnvArgs{
    #[arg(short = 'e', long = "env-name", value_enum, default_value = "cart-pole")]
    pub env_name: EnvName,

    #[arg(short = 's', long = "seed", default_value = "2")]
    pub seed: u64,

    /// Number of most recent frames stacked into one observation
    #[arg(long = "num-stack", default_value = "1")]
    pub num_stack: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs{
    #[arg(long = "load-dir", default_value = "./trained_models/ppo/")]
    pub load_dir: PathBuf,

    /// Artifact name, files are `<load-dir>/<env>/<name>.ot` and `.json`
    #[arg(long = "artifact", default_value = "policy")]
    pub artifact: String,
}

#[derive(Args, Debug, Clone)]
pub struct TrainOptions{
    #[command(flatten)]
    pub env: EnvArgs,

    #[command(flatten)]
    pub artifact: ArtifactArgs,

    #[arg(short = 'k', long = "num-actors", default_value = "3")]
    pub num_actors: usize,

    #[arg(long = "hidden-size", default_value = "64")]
    pub hidden_size: usize,

    #[arg(short = 'u', long = "updates", default_value = "100")]
    pub num_updates: usize,

    #[arg(long = "num-steps", default_value = "2048")]
    pub num_steps: usize,

    #[arg(long = "ppo-epochs", default_value = "10")]
    pub ppo_epochs: usize,

    #[arg(short = 'm', long = "minibatch-size", default_value = "64")]
    pub mini_batch_size: usize,

    #[arg(long = "learning-rate", default_value = "3e-4")]
    pub learning_rate: f64,

    #[arg(short = 'l', long = "gae-lambda")]
    pub gae_lambda: Option<f64>,

    #[arg(long = "ent-coef")]
    pub ent_coef: Option<f64>,

    /// Yaml file for training summary
    #[arg(long = "summary")]
    pub summary_file: Option<PathBuf>,

    /// Svg file for plot of mean return per update
    #[arg(long = "plot")]
    pub plot_file: Option<PathBuf>,
}

impl TrainOptions{
    pub fn ppo_config(&self) -> ConfigPpo{
        let mut config = ConfigPpo::default();
        config.set_num_updates(self.num_updates)
            .set_num_steps(self.num_steps)
            .set_ppo_epochs(self.ppo_epochs)
            .set_mini_batch_size(self.mini_batch_size)
            .set_learning_rate(self.learning_rate)
            .set_seed(self.env.seed);
        if let Some(lambda) = self.gae_lambda{
            config.set_gae_lambda(lambda);
        }
        if let Some(ent_coef) = self.ent_coef{
            config.set_ent_coef(ent_coef);
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct CollectOptions{
    #[command(flatten)]
    pub env: EnvArgs,

    #[command(flatten)]
    pub artifact: ArtifactArgs,

    #[arg(long = "data-dir", default_value = "data")]
    pub data_dir: PathBuf,

    #[arg(short = 'n', long = "num-samples", default_value = "1000")]
    pub num_samples: usize,

    /// Frame is captured every `save-rate` recorded rows
    #[arg(long = "save-rate", default_value = "1")]
    pub save_rate: usize,

    /// Sample actions instead of taking distribution mode
    #[arg(long = "stochastic-action")]
    pub stochastic_action: bool,

    /// Take most probable actor instead of sampling choice
    #[arg(long = "greedy-choice")]
    pub greedy_choice: bool,

    #[arg(long = "no-images")]
    pub no_images: bool,
}

impl CollectOptions{
    pub fn act_mode(&self) -> ActMode{
        ActMode{
            choice: match self.greedy_choice{
                true => SelectionMode::Greedy,
                false => SelectionMode::Sample,
            },
            action: match self.stochastic_action{
                true => SelectionMode::Sample,
                false => SelectionMode::Greedy,
            },
        }
    }

    pub fn collector_config(&self) -> CollectorConfig{
        let mut config = CollectorConfig::new(self.data_dir.clone(), self.num_samples);
        config.save_rate = self.save_rate;
        config.mode = self.act_mode();
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct TsneArgs{
    #[arg(long = "perplexity", default_value = "40")]
    pub perplexity: f64,

    #[arg(long = "iterations", default_value = "300")]
    pub iterations: usize,

    #[arg(long = "tsne-seed", default_value = "0")]
    pub tsne_seed: u64,
}

impl TsneArgs{
    pub fn tsne_config(&self) -> TsneConfig{
        TsneConfig{
            perplexity: self.perplexity,
            iterations: self.iterations,
            seed: self.tsne_seed,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EmbedOptions{
    #[arg(long = "data-dir", default_value = "data")]
    pub data_dir: PathBuf,

    #[command(flatten)]
    pub tsne: TsneArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PlotOptions{
    #[arg(long = "data-dir", default_value = "data")]
    pub data_dir: PathBuf,

    #[arg(short = 'k', long = "num-actors", default_value = "3")]
    pub num_actors: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RunOptions{
    #[command(flatten)]
    pub collect: CollectOptions,

    #[command(flatten)]
    pub tsne: TsneArgs,

    /// Read `X.csv` and `y.csv` from data directory instead of collecting
    #[arg(long = "load")]
    pub load: bool,

    /// Number of actors on plot, taken from policy (or labels when loading) if not set
    #[arg(short = 'k', long = "num-actors")]
    pub num_actors: Option<usize>,
}

#[cfg(test)]
mod tests{
    use clap::Parser;
    use log::LevelFilter;
    use moa_rl::distribution::SelectionMode;
    use crate::envs::EnvName;
    use crate::options::{MoaCommand, MoaOptions};

    #[test]
    fn collect_defaults(){
        let options = MoaOptions::try_parse_from(["moa", "collect"]).unwrap();
        assert_eq!(options.log_level, LevelFilter::Info);
        let MoaCommand::Collect(collect) = options.command else {
            panic!("expected collect command")
        };
        assert_eq!(collect.env.env_name, EnvName::CartPole);
        assert_eq!(collect.env.seed, 2);
        assert_eq!(collect.num_samples, 1000);
        assert_eq!(collect.artifact.artifact, "policy");
        let mode = collect.act_mode();
        assert_eq!(mode.choice, SelectionMode::Sample);
        assert_eq!(mode.action, SelectionMode::Greedy);
    }

    #[test]
    fn run_with_load_and_flags(){
        let options = MoaOptions::try_parse_from([
            "moa", "-v", "debug", "run", "--load", "--env-name", "pendulum",
            "-n", "50", "--greedy-choice", "--perplexity", "5", "-k", "4",
        ]).unwrap();
        assert_eq!(options.log_level, LevelFilter::Debug);
        let MoaCommand::Run(run) = options.command else {
            panic!("expected run command")
        };
        assert!(run.load);
        assert_eq!(run.num_actors, Some(4));
        assert_eq!(run.collect.env.env_name, EnvName::Pendulum);
        assert_eq!(run.collect.collector_config().num_samples, 50);
        assert_eq!(run.collect.act_mode().choice, SelectionMode::Greedy);
        assert_eq!(run.tsne.tsne_config().perplexity, 5.0);
    }

    #[test]
    fn logging_options_follow_subcommand(){
        let options = MoaOptions::try_parse_from([
            "moa", "collect", "-v", "debug", "-A", "trace", "-o", "moa.log", "-d", "cpu",
        ]).unwrap();
        assert_eq!(options.log_level, LevelFilter::Debug);
        assert_eq!(options.log_level_rl, LevelFilter::Trace);
        assert_eq!(options.log_file, Some(std::path::PathBuf::from("moa.log")));
        assert!(matches!(options.command, MoaCommand::Collect(_)));
    }

    #[test]
    fn train_options_set_ppo_config(){
        let options = MoaOptions::try_parse_from([
            "moa", "train", "-u", "3", "--num-steps", "128", "-l", "0.9",
        ]).unwrap();
        let MoaCommand::Train(train) = options.command else {
            panic!("expected train command")
        };
        let config = train.ppo_config();
        assert_eq!(config.num_updates(), 3);
        assert_eq!(config.num_steps(), 128);
        assert_eq!(config.gae_lambda(), 0.9);
        assert_eq!(config.gamma(), 0.99);
        assert_eq!(config.seed(), 2);
    }
}
