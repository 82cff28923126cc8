//! Library side of the `floe` binary: settings resolution and rendering of
//! explained requests.

use floe_connector::{Explained, ReadRequest};
use floe_worker::{ConnectorKind, Settings, WorkerError};
use std::fmt::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("Invalid request file: {0}")]
    Request(#[from] serde_json::Error),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Connector(#[from] floe_common::Error),

    #[error("No connector configured: pass --connector or --config")]
    NoConnector,
}

/// Settings from `config`, from the default settings file when it exists,
/// or built-in defaults. `connector` overrides whatever the file says.
pub fn resolve_settings(config: Option<&str>, connector: Option<ConnectorKind>) -> Result<Settings, CliError> {
    let mut settings = match (config, connector) {
        (Some(path), _) => Settings::from_path(path)?,
        (None, _) if Path::new(floe_worker::config::DEFAULT_CONFIG_PATH).exists() => Settings::new()?,
        (None, Some(kind)) => Settings::from_toml(&format!("connector = \"{kind}\""))?,
        (None, None) => return Err(CliError::NoConnector),
    };
    if let Some(kind) = connector {
        settings.connector = kind;
    }
    Ok(settings)
}

pub fn load_request(path: &str) -> Result<ReadRequest, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_string(), source })?;
    Ok(serde_json::from_str(&text)?)
}

pub fn explain(settings: &Settings, request: &ReadRequest) -> Result<Explained, CliError> {
    let compiler = settings.connector.compiler(settings);
    tracing::debug!(connector = %settings.connector, table = %request.table, "explaining request");
    Ok(compiler.explain(&request.table, &request.columns, &request.constraints, &request.split)?)
}

/// Human-readable form: the native query, then one line per parameter.
pub fn render(connector: ConnectorKind, explained: &Explained) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = writeln!(out, "-- {connector}{}", if explained.pass_through { " (pass-through)" } else { "" });
    let _ = writeln!(out, "{}", explained.query);
    for (i, param) in explained.params.iter().enumerate() {
        let _ = writeln!(out, "-- ${} {} {} = {}", i + 1, param.column, param.data_type, param.value);
    }
    if !explained.limit_pushed_down {
        let _ = writeln!(out, "-- limit applied after reading");
    }
    out
}
