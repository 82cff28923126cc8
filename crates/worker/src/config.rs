use crate::error::WorkerError;
use crate::factory::ConnectorKind;
use floe_common::CasePolicy;
use floe_connector::{MismatchPolicy, ReadOptions, DEFAULT_MAX_SPLITS_PER_REQUEST};
use floe_connector_jdbc::{KeyStatistics, PartitionCatalog, PartitionSplitPlanner, RangeSplitPlanner};
use floe_connector_search::SearchOptions;
use serde::Deserialize;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "FLOE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "FLOE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub connector: ConnectorKind,
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_splits_per_request")]
    pub max_splits_per_request: usize,
    #[serde(default)]
    pub mismatch_policy: MismatchPolicy,
    /// Batches buffered between a split task and its consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub range: RangeSettings,
    #[serde(default)]
    pub search: SearchOptions,
}

/// Sizing of key-range splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RangeSettings {
    pub target_rows_per_split: u64,
    pub max_splits: usize,
}

impl Default for RangeSettings {
    fn default() -> Self {
        Self { target_rows_per_split: 1_000_000, max_splits: 64 }
    }
}

fn default_case_insensitive() -> bool {
    true
}

fn default_batch_size() -> usize {
    ReadOptions::default().batch_size
}

fn default_max_splits_per_request() -> usize {
    DEFAULT_MAX_SPLITS_PER_REQUEST
}

fn default_channel_capacity() -> usize {
    8
}

impl Settings {
    /// Loads the file named by `FLOE_CONFIG_PATH`, or `config/default.toml`.
    pub fn new() -> Result<Self, WorkerError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(&path)
    }

    pub fn from_path(path: &str) -> Result<Self, WorkerError> {
        Self::build(config::File::with_name(path).required(true))
    }

    pub fn from_toml(text: &str) -> Result<Self, WorkerError> {
        Self::build(config::File::from_str(text, config::FileFormat::Toml))
    }

    /// `FLOE__BATCH_SIZE`, `FLOE__SEARCH__PAGE_SIZE` and so on override the file.
    fn build<S>(file: S) -> Result<Self, WorkerError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        tracing::debug!(connector = %settings.connector, batch_size = settings.batch_size, "settings loaded");
        Ok(settings)
    }

    fn validate(&self) -> Result<(), WorkerError> {
        let positive = [
            ("batch_size", self.batch_size),
            ("max_splits_per_request", self.max_splits_per_request),
            ("channel_capacity", self.channel_capacity),
            ("range.max_splits", self.range.max_splits),
            ("search.page_size", self.search.page_size),
        ];
        match positive.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(WorkerError::InvalidSetting(format!("{name} must be greater than zero"))),
            None => Ok(()),
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            batch_size: self.batch_size,
            case_policy: CasePolicy::from_flag(self.case_insensitive),
            mismatch_policy: self.mismatch_policy,
        }
    }

    /// Search tuning with the global split ceiling applied.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions { max_splits_per_request: self.max_splits_per_request, ..self.search.clone() }
    }

    pub fn partition_planner<C: PartitionCatalog>(&self, catalog: C) -> PartitionSplitPlanner<C> {
        PartitionSplitPlanner::new(catalog).with_max_splits_per_request(self.max_splits_per_request)
    }

    pub fn range_planner<S: KeyStatistics>(&self, statistics: S) -> RangeSplitPlanner<S> {
        RangeSplitPlanner::new(statistics, self.range.target_rows_per_split, self.range.max_splits)
            .with_max_splits_per_request(self.max_splits_per_request)
    }
}
