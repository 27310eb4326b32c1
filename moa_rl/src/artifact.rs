use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tch::Device;
use tch::nn::VarStore;
use crate::error::MoaRlError;
use crate::policy::{MixtureOfActorsPolicy, PolicySpec};

/// Extension of file holding network variables.
pub const WEIGHTS_EXTENSION: &str = "ot";
/// Extension of file holding [`ArtifactMeta`].
pub const META_EXTENSION: &str = "json";

/// Description stored next to weights, enough to rebuild network before loading variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta{
    pub env_name: String,
    pub policy: PolicySpec,
}

/// Location of trained policy: `<load_dir>/<env_name>/<name>.ot` and `<name>.json`.
#[derive(Debug, Clone)]
pub struct PolicyArtifact{
    directory: PathBuf,
    name: String,
}

impl PolicyArtifact{
    pub fn at(load_dir: &Path, env_name: &str, name: &str) -> Self{
        Self{
            directory: load_dir.join(env_name),
            name: name.to_string(),
        }
    }

    pub fn weights_path(&self) -> PathBuf{
        self.directory.join(format!("{}.{WEIGHTS_EXTENSION}", self.name))
    }

    pub fn meta_path(&self) -> PathBuf{
        self.directory.join(format!("{}.{META_EXTENSION}", self.name))
    }

    pub fn exists(&self) -> bool{
        self.weights_path().is_file() && self.meta_path().is_file()
    }

    fn error(&self, path: &Path, explanation: String) -> MoaRlError{
        MoaRlError::Artifact {
            path: path.display().to_string(),
            explanation,
        }
    }

    /// Writes weights (with normalizer statistics) and metadata.
    pub fn save(&self, policy: &MixtureOfActorsPolicy, env_name: &str) -> Result<(), MoaRlError>{
        std::fs::create_dir_all(&self.directory)
            .map_err(|e| self.error(&self.directory, format!("Cannot create directory: {e}")))?;
        let meta = ArtifactMeta{
            env_name: env_name.to_string(),
            policy: policy.spec().clone(),
        };
        let meta_path = self.meta_path();
        let file = File::create(&meta_path)
            .map_err(|e| self.error(&meta_path, format!("{e}")))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &meta)
            .map_err(|e| self.error(&meta_path, format!("Serializing metadata: {e}")))?;

        let weights_path = self.weights_path();
        policy.network().save(&weights_path)
            .map_err(|e| self.error(&weights_path, format!("Saving variables: {e}")))?;
        #[cfg(feature = "log_info")]
        log::info!("Saved policy artifact to {}", weights_path.display());
        Ok(())
    }

    pub fn load_meta(&self) -> Result<ArtifactMeta, MoaRlError>{
        let meta_path = self.meta_path();
        let file = File::open(&meta_path)
            .map_err(|e| self.error(&meta_path, format!("{e}")))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| self.error(&meta_path, format!("Parsing metadata: {e}")))
    }

    /// Rebuilds policy described by metadata and loads its variables.
    pub fn load(&self, device: Device) -> Result<(ArtifactMeta, MixtureOfActorsPolicy), MoaRlError>{
        let meta = self.load_meta()?;
        let mut policy = MixtureOfActorsPolicy::new(VarStore::new(device), meta.policy.clone())?;
        let weights_path = self.weights_path();
        policy.network_mut().load(&weights_path)
            .map_err(|e| self.error(&weights_path, format!("Loading variables: {e}")))?;
        #[cfg(feature = "log_info")]
        log::info!("Loaded policy for {} with {} actors from {}",
            meta.env_name, meta.policy.num_actors, weights_path.display());
        Ok((meta, policy))
    }
}

#[cfg(test)]
mod tests{
    use tch::{Device, Kind, Tensor};
    use tch::nn::VarStore;
    use moa_core::env::ActionSpace;
    use crate::artifact::PolicyArtifact;
    use crate::policy::{MixtureOfActorsPolicy, PolicySpec};

    #[test]
    fn saved_policy_loads_with_same_outputs(){
        let dir = std::env::temp_dir().join(format!("moa_rl_artifact_{}", std::process::id()));
        tch::manual_seed(3);
        let mut policy = MixtureOfActorsPolicy::new(
            VarStore::new(Device::Cpu),
            PolicySpec::new(3, 1, 2, ActionSpace::Discrete(4))).unwrap();
        policy.normalizer_mut().update_slice(&[1.0, 2.0, 3.0]).unwrap();

        let artifact = PolicyArtifact::at(&dir, "test-env", "policy");
        assert!(!artifact.exists());
        artifact.save(&policy, "test-env").unwrap();
        assert!(artifact.exists());

        let (meta, loaded) = artifact.load(Device::Cpu).unwrap();
        assert_eq!(meta.env_name, "test-env");
        assert_eq!(loaded.spec(), policy.spec());

        let obs = Tensor::randn([4, 3], (Kind::Float, Device::Cpu));
        let a = policy.forward(&obs).unwrap();
        let b = loaded.forward(&obs).unwrap();
        assert!((a.decider - b.decider).abs().max().double_value(&[]) < 1e-6);
        assert!((a.critic - b.critic).abs().max().double_value(&[]) < 1e-6);
        assert!((loaded.normalizer().count() - policy.normalizer().count()).abs() < 1e-6);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_artifact_is_error(){
        let artifact = PolicyArtifact::at(&std::env::temp_dir(), "no-such-env", "nothing");
        assert!(artifact.load(Device::Cpu).is_err());
    }
}
