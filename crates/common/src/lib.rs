
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Identifier for a page on disk.
///
/// Non-negative; the sentinel `PageId::INVALID` (`-1`) denotes "no page".
/// Two page IDs compare equal iff their integer values match.
/// Examples:
/// - `let p = PageId(0); // first page of a file`
/// - `let missing = PageId::INVALID;`
/// - `assert!(PageId(42).is_valid());`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub i32);

impl PageId {
    pub const INVALID: PageId = PageId(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully-qualified identifier for a record within a page.
/// Examples:
/// - `let rid = RecordId::new(PageId(42), 3);`
/// - `let rid = RecordId::new(PageId(1024), 0);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

/// Canonical error type shared across the storage, buffer, sort, and
/// optimizer crates, classified per the kernel's error handling design:
/// `InvalidArgument` and `Capacity` are recoverable, `Invariant` is fatal
/// (the caller must treat the instance as closed), and `Io` propagates
/// after the owning layer has flushed and shut down.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("capacity exhausted: {0}")]
    Capacity(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("codec: {0}")]
    Codec(String),
    #[error("optimizer: {0}")]
    Optimizer(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Buffer pool page-replacement strategy, selected per-instance via
/// [`Config::replacement_policy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementPolicyKind {
    Random,
    #[default]
    Lru,
    Mru,
    Clock,
}

/// Runtime configuration for the storage, buffer, sort, and optimizer
/// components.
///
/// # Example
/// ```
/// use common::{Config, ReplacementPolicyKind};
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .page_size(4096)
///     .buffer_pool_frames(128)
///     .replacement_policy(ReplacementPolicyKind::Clock)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where data files live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed-size page allocation in bytes.
    #[builder(default = 1024)]
    pub page_size: usize,
    /// Number of frames the buffer pool keeps resident.
    #[builder(default = 64)]
    pub buffer_pool_frames: usize,
    /// Page-replacement strategy for the buffer pool.
    #[builder(default)]
    pub replacement_policy: ReplacementPolicyKind,
    /// Frames reserved (not usable for the external-sort working set) to
    /// guarantee forward progress during multi-way merges.
    #[builder(default = 2)]
    pub sort_reserved_frames: usize,
    /// Global epsilon pruning cost bound (§4.8) for the Cascades search
    /// loop: a plan costing at or below this value is accepted as its
    /// context's winner immediately instead of comparing every
    /// alternative. `None` disables the mechanism.
    pub optimizer_epsilon: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

/// Installs a `tracing` subscriber whose filter comes from `RUST_LOG`,
/// falling back to `level` when the environment variable is unset.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).compact().try_init();
}
