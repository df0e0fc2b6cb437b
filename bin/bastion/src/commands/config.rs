//! `bastion config`.

use bastion_node_core::{BastionConfig, ConfigError};

use crate::cli::ConfigCommands;

pub(crate) fn run(command: &ConfigCommands) -> Result<String, ConfigError> {
    match command {
        ConfigCommands::Default => BastionConfig::default().to_toml(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_loads_back() {
        let toml = run(&ConfigCommands::Default).unwrap();
        assert!(toml.contains("[gating]"));
        assert_eq!(BastionConfig::from_toml(&toml).unwrap(), BastionConfig::default());
    }
}
