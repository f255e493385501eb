use dwh_config::load_config;
use dwh_config::shared::LoaderConfig;

use crate::error::LoaderResult;

/// Loads and validates the loader configuration.
pub fn load_loader_config() -> LoaderResult<LoaderConfig> {
    let config = load_config::<LoaderConfig>()?;
    config.validate()?;

    Ok(config)
}
