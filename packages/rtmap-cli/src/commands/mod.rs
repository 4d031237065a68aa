pub mod run;
pub mod validate;

use crate::exit_codes;
use rtmap::{MapError, RtMapConfig};

/// Load a config file, then apply environment overrides and re-validate
pub fn load_config(path: &str) -> Result<RtMapConfig, MapError> {
    let mut config = RtMapConfig::load(path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Exit code for a library error
pub fn exit_code_for(err: &MapError) -> i32 {
    match err {
        MapError::InvalidConfig(_) | MapError::ConfigNotFound(_) => exit_codes::CONFIG_ERROR,
        MapError::ChannelOutOfRange { .. } | MapError::Parse(_) | MapError::Io(_) => {
            exit_codes::INPUT_ERROR
        }
        MapError::ThreadPool(_) | MapError::Mapping(_) => exit_codes::EXECUTION_ERROR,
    }
}
