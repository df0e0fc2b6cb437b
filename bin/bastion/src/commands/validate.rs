//! `bastion validate`.

use std::fmt::Write as _;

use bastion_net_connmgr::ConnManager;
use bastion_node_core::{BastionConfig, ConfigError, NodeComponents};
use humantime::format_duration;

/// Build every component from `config` and describe the result.
pub(crate) fn summary(config: &BastionConfig) -> Result<String, ConfigError> {
    let components = NodeComponents::build(config)?;
    let gating = components.gating.snapshot();
    let info = components.connections.get_info();

    let mut out = String::new();
    let _ = writeln!(out, "configuration ok");
    let _ = writeln!(out, "trust policy:      {:?}", gating.trust_policy);
    let _ = writeln!(
        out,
        "addresses:         {} banned, {} trusted",
        gating.banned_addr_rules, gating.trusted_addr_rules
    );
    let _ = writeln!(
        out,
        "peers:             {} banned, {} trusted",
        gating.banned_peers, gating.trusted_peers
    );
    let _ = writeln!(
        out,
        "watermarks:        low {}, high {}",
        info.low_water, info.high_water
    );
    let _ = writeln!(
        out,
        "grace / silence:   {} / {}",
        format_duration(info.grace_period),
        format_duration(info.silence_period)
    );
    for addr in &components.listen_addrs {
        let _ = writeln!(out, "listen:            {addr}");
    }
    for addr in &components.advertised_addrs {
        let _ = writeln!(out, "advertise:         {addr}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_default_config() {
        let summary = summary(&BastionConfig::default()).unwrap();
        assert!(summary.contains("trust policy:      Symmetric"));
        assert!(summary.contains("watermarks:        low 25, high 50"));
        assert!(summary.contains("grace / silence:   30s / 10s"));
        assert!(summary.contains("listen:            /ip4/0.0.0.0/tcp/8302"));
        assert!(summary.contains("advertise:         /ip4/0.0.0.0/tcp/8302"));
    }

    #[test]
    fn test_summary_reports_counts() {
        let config = BastionConfig::from_toml(
            r#"
            [gating]
            banned_addrs = ["203.0.113.0/24", "198.51.100.0/24"]
            symmetric_trust = false

            [network]
            external_addr = "/ip4/198.51.100.7/tcp/8302"
            "#,
        )
        .unwrap();
        let summary = summary(&config).unwrap();
        assert!(summary.contains("addresses:         2 banned, 0 trusted"));
        assert!(summary.contains("trust policy:      Asymmetric"));
        assert!(summary.contains("advertise:         /ip4/198.51.100.7/tcp/8302"));
    }
}
