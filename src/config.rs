use crate::types::Config;
use anyhow::Result;
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter sets the regulation law cannot work with.
    pub fn validate(&self) -> Result<()> {
        let m = &self.model;
        if m.gaussians == 0 {
            anyhow::bail!("model.gaussians must be at least 1");
        }
        if !(m.beta_m < m.beta_s && m.beta_s <= m.beta_d && m.beta_d <= m.beta_b) {
            anyhow::bail!(
                "learning-rate bounds must satisfy beta_m < beta_s <= beta_d <= beta_b \
                 (got beta_m={}, beta_s={}, beta_d={}, beta_b={})",
                m.beta_m,
                m.beta_s,
                m.beta_d,
                m.beta_b
            );
        }
        if m.initial_variance <= 0.0 {
            anyhow::bail!("model.initial_variance must be positive");
        }
        if m.blur_size <= 0 || m.blur_size % 2 == 0 {
            anyhow::bail!("model.blur_size must be a positive odd kernel size");
        }
        if self.runtime.workers == 0 {
            anyhow::bail!("runtime.workers must be at least 1");
        }
        Ok(())
    }
}
