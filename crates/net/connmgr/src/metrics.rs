//! Connection Manager Metrics

use metrics::Counter;

/// Connection Manager Metrics
#[derive(Clone, Debug)]
pub(crate) struct ConnManagerMetrics {
    /// Number of connections closed by trims
    pub(crate) trimmed_connections_total: Counter,
    /// Number of trims that selected victims
    pub(crate) trim_runs_total: Counter,
    /// Number of connections registered
    pub(crate) connected_total: Counter,
    /// Number of connections removed
    pub(crate) disconnected_total: Counter,
}

impl Default for ConnManagerMetrics {
    fn default() -> Self {
        Self {
            trimmed_connections_total: metrics::counter!("connmgr.trimmed_connections_total"),
            trim_runs_total: metrics::counter!("connmgr.trim_runs_total"),
            connected_total: metrics::counter!("connmgr.connected_total"),
            disconnected_total: metrics::counter!("connmgr.disconnected_total"),
        }
    }
}
