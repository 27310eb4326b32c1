use std::path::PathBuf;
use moa_core::env::ActionSpace;
use moa_core::table::{CompleteRollout, CHOICES_FILE, OBSERVATIONS_FILE};
use moa_rl::artifact::PolicyArtifact;
use moa_rl::policy::{MixtureOfActorsPolicy, PolicySpec};
use moa_rl::tch::{self, Device};
use moa_rl::tch::nn::VarStore;
use moa_viz::capture::{BitmapCapture, NoCapture};
use moa_viz::collect::{collect, CollectorConfig};
use moa_viz::embedding::{embed, EmbeddingTable, EMBEDDING_FILE};
use moa_viz::envs::{CartPole, EnvName, Pendulum};
use moa_viz::options::{ArtifactArgs, CollectOptions, EnvArgs, RunOptions, TsneArgs};
use moa_viz::pipeline;
use moa_viz::plots::{plot_embedding, SCATTER_FILE};
use moa_viz::tsne::TsneConfig;

fn temp_dir(name: &str) -> PathBuf{
    let dir = std::env::temp_dir().join(format!("moa_viz_it_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn cart_pole_policy(num_stack: usize) -> MixtureOfActorsPolicy{
    tch::manual_seed(2);
    MixtureOfActorsPolicy::new(
        VarStore::new(Device::Cpu),
        PolicySpec::new(4, num_stack, 3, ActionSpace::Discrete(2)),
    ).unwrap()
}

#[test]
fn cart_pole_rollout_is_embedded_and_plotted(){
    let dir = temp_dir("cart_pole");
    let policy = cart_pole_policy(1);
    let mut env = CartPole::new(2);
    let config = CollectorConfig::new(dir.clone(), 40);

    let (rollout, summary) = collect(&mut env, &policy, &mut NoCapture, &config).unwrap();
    assert_eq!(rollout.len(), 40);
    assert_eq!(rollout.observation_size(), 4);
    assert_eq!(summary.env_steps, 39);
    assert_eq!(summary.frames_captured, 0);
    assert_eq!(summary.choice_histogram.iter().sum::<usize>(), 40);
    assert!(rollout.choices().iter().all(|c| *c < 3));
    assert!(!config.image_dir().exists());

    rollout.save(&dir).unwrap();
    assert!(dir.join(OBSERVATIONS_FILE).is_file());
    assert!(dir.join(CHOICES_FILE).is_file());
    let loaded = CompleteRollout::load(&dir).unwrap();
    assert_eq!(loaded.len(), 40);
    assert_eq!(loaded.choices(), rollout.choices());

    let table = embed(&loaded, TsneConfig{iterations: 80, seed: 1, ..Default::default()}).unwrap();
    assert_eq!(table.len(), 40);
    assert_eq!(table.feature_count(), 4);
    table.save(&dir.join(EMBEDDING_FILE)).unwrap();
    let reread = EmbeddingTable::load(&dir.join(EMBEDDING_FILE)).unwrap();
    assert_eq!(reread.len(), 40);
    for (p, c) in reread.points().iter().zip(rollout.choices()){
        assert_eq!(p.label, *c);
    }

    plot_embedding(&dir.join(SCATTER_FILE), &reread, 3).unwrap();
    assert!(dir.join(SCATTER_FILE).is_file());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn episode_end_zeroes_older_stacked_frames(){
    let dir = temp_dir("stacked");
    let policy = cart_pole_policy(3);
    // short episodes force several resets during collection
    let mut env = CartPole::new(5).with_max_episode_steps(4);
    let config = CollectorConfig::new(dir.clone(), 30);

    let (rollout, summary) = collect(&mut env, &policy, &mut NoCapture, &config).unwrap();
    assert_eq!(rollout.len(), 30);
    assert_eq!(rollout.observation_size(), 12);
    assert_eq!(summary.env_steps, 29);
    assert_eq!(summary.episodes_finished, 7);

    let is_zero = |row: &[f32]| row.iter().all(|v| *v == 0.0);
    let is_frame = |row: &[f32]| row.iter().any(|v| *v != 0.0);
    // row 4k is recorded right after reset, older frames of previous episode are zeroed
    for first in (0..30).step_by(4){
        let row = rollout.observation(first).unwrap();
        assert!(is_zero(&row[0..8]), "row {first}: {row:?}");
        assert!(is_frame(&row[8..12]), "row {first}: {row:?}");

        let second = rollout.observation(first + 1).unwrap();
        assert!(is_zero(&second[0..4]), "row {}: {second:?}", first + 1);
        assert!(is_frame(&second[4..8]) && is_frame(&second[8..12]));
        assert_eq!(&second[4..8], &row[8..12]);

        if first + 3 < 30{
            let full = rollout.observation(first + 3).unwrap();
            assert!(full.chunks(4).all(is_frame), "row {}: {full:?}", first + 3);
        }
    }
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn frames_are_captured_at_save_rate(){
    let dir = temp_dir("frames");
    let policy = cart_pole_policy(1);
    let mut env = CartPole::new(2);
    let mut config = CollectorConfig::new(dir.clone(), 7);
    config.save_rate = 3;

    let (_, summary) = collect(&mut env, &policy, &mut BitmapCapture::new(50, 70), &config).unwrap();
    assert_eq!(summary.frames_captured, 2);
    assert!(config.image_path(3).is_file());
    assert!(config.image_path(6).is_file());
    assert!(!config.image_path(0).exists());
    assert!(!config.image_path(1).exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn policy_for_other_environment_is_rejected(){
    let dir = temp_dir("mismatch");
    let policy = cart_pole_policy(1);
    let mut env = Pendulum::new(0);
    let config = CollectorConfig::new(dir.clone(), 5);
    assert!(collect(&mut env, &policy, &mut NoCapture, &config).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn run_from_artifact_and_from_loaded_tables(){
    let dir = temp_dir("run");
    let load_dir = dir.join("models");
    let data_dir = dir.join("data");
    let policy = cart_pole_policy(1);
    PolicyArtifact::at(&load_dir, EnvName::CartPole.id(), "policy")
        .save(&policy, EnvName::CartPole.id()).unwrap();

    let collect_options = CollectOptions{
        env: EnvArgs{env_name: EnvName::CartPole, seed: 2, num_stack: 1},
        artifact: ArtifactArgs{load_dir: load_dir.clone(), artifact: "policy".into()},
        data_dir: data_dir.clone(),
        num_samples: 25,
        save_rate: 1,
        stochastic_action: false,
        greedy_choice: false,
        no_images: true,
    };
    let mut options = RunOptions{
        collect: collect_options,
        tsne: TsneArgs{perplexity: 40.0, iterations: 60, tsne_seed: 0},
        load: false,
        num_actors: None,
    };
    pipeline::run_all(&options, Device::Cpu).unwrap();
    assert!(data_dir.join(SCATTER_FILE).is_file());
    assert_eq!(EmbeddingTable::load(&data_dir.join(EMBEDDING_FILE)).unwrap().len(), 25);

    std::fs::remove_file(data_dir.join(SCATTER_FILE)).unwrap();
    options.load = true;
    pipeline::run_all(&options, Device::Cpu).unwrap();
    assert!(data_dir.join(SCATTER_FILE).is_file());

    options.load = false;
    options.collect.env.env_name = EnvName::Pendulum;
    assert!(pipeline::run_all(&options, Device::Cpu).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn artifact_trained_on_other_environment_is_rejected(){
    let dir = temp_dir("wrong_env");
    let load_dir = dir.join("models");
    let policy = cart_pole_policy(1);
    PolicyArtifact::at(&load_dir, EnvName::Pendulum.id(), "policy")
        .save(&policy, EnvName::CartPole.id()).unwrap();

    let env = EnvArgs{env_name: EnvName::Pendulum, seed: 0, num_stack: 1};
    let artifact = ArtifactArgs{load_dir: load_dir.clone(), artifact: "policy".into()};
    let error = pipeline::load_policy(&env, &artifact, Device::Cpu).err().unwrap();
    assert!(error.to_string().contains("was trained on"), "{error}");

    let env = EnvArgs{env_name: EnvName::CartPole, seed: 0, num_stack: 1};
    let error = pipeline::load_policy(&env, &artifact, Device::Cpu).err().unwrap();
    assert!(error.to_string().contains("No policy artifact"), "{error}");
    std::fs::remove_dir_all(&dir).unwrap();
}
