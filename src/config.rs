use clap::Args;
use std::time::Duration;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(50);

/// Tunables of the transfer engine and its cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Lifetime of a cached account snapshot.
    pub cache_ttl: Duration,
    /// Upper bound on any single cache call; slower calls count as misses.
    pub cache_timeout: Duration,
    /// Upper bound on waiting for an account lock. `None` waits forever.
    pub lock_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            lock_timeout: None,
        }
    }
}

/// Command line / environment view of [`EngineConfig`].
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Seconds a cached account snapshot stays valid.
    #[arg(long, env = "TRANSFER_CACHE_TTL_SECS", default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    /// Milliseconds before a cache call is abandoned and treated as a miss.
    #[arg(long, env = "TRANSFER_CACHE_TIMEOUT_MS", default_value_t = 50)]
    pub cache_timeout_ms: u64,

    /// Milliseconds to wait for an account lock before giving up.
    #[arg(long, env = "TRANSFER_LOCK_TIMEOUT_MS")]
    pub lock_timeout_ms: Option<u64>,
}

impl From<&EngineArgs> for EngineConfig {
    fn from(args: &EngineArgs) -> Self {
        Self {
            cache_ttl: Duration::from_secs(args.cache_ttl_secs),
            cache_timeout: Duration::from_millis(args.cache_timeout_ms),
            lock_timeout: args.lock_timeout_ms.map(Duration::from_millis),
        }
    }
}
