pub mod artifact;
pub mod artwork;
pub mod catalog;
pub mod config;
pub mod metrics;
pub mod museum;
pub mod orchestrator;
pub mod progress;
pub mod rate_limiter;
pub mod retry;
pub mod testing;

pub use artifact::{FsImageStore, ImageStore, ImageStoreError};
pub use artwork::{ArtworkIdentifier, CanonicalArtworkRecord, IdentifierError, MuseumTag};
pub use catalog::{ArtworkCatalog, CatalogError, CatalogStats, SqliteArtworkCatalog};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError,
};
pub use museum::{MuseumClient, MuseumError, MuseumRegistry};
pub use orchestrator::{
    DownloadOrchestrator, OrchestratorConfig, OrchestratorError, RunOptions, RunSummary,
    StopHandle,
};
pub use progress::{
    DownloadItem, ItemStatus, ProgressError, ProgressStore, SqliteProgressStore, StatusSummary,
};
pub use retry::{classify, ErrorKind, RetryConfig, RetryDecision};
