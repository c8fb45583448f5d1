//! Reading and writing the configuration file

use std::fs;
use std::path::Path;
use tracing::info;
use visalign_core::{ConfigFormat, RobotConfig, Result};

pub struct ConfigStore;

impl ConfigStore {
    /// Load `path`, filling missing keys with defaults, and write the
    /// completed configuration back. A missing file is created.
    pub fn load_or_init(path: &Path) -> Result<RobotConfig> {
        let format = ConfigFormat::from_path(path);
        let config = if path.exists() {
            RobotConfig::parse(&fs::read_to_string(path)?, format)?
        } else {
            info!("No configuration at {}, writing defaults", path.display());
            RobotConfig::default()
        };

        Self::save(path, &config)?;
        Ok(config)
    }

    pub fn save(path: &Path, config: &RobotConfig) -> Result<()> {
        let text = config.render(ConfigFormat::from_path(path))?;
        fs::write(path, text)?;
        Ok(())
    }
}
