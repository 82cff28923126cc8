//! Connector selection. The backend is picked once from settings and never
//! re-examined by shared code.

use crate::config::Settings;
use floe_common::Error;
use floe_connector::Explain;
use floe_connector_gremlin::GremlinCompiler;
use floe_connector_jdbc::{AnsiDialect, MySqlDialect, PostgresDialect, SqlCompiler};
use floe_connector_search::SearchCompiler;
use floe_connector_sparql::SparqlCompiler;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Postgres,
    Mysql,
    Ansi,
    Gremlin,
    Sparql,
    Search,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 6] = [
        ConnectorKind::Postgres,
        ConnectorKind::Mysql,
        ConnectorKind::Ansi,
        ConnectorKind::Gremlin,
        ConnectorKind::Sparql,
        ConnectorKind::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::Postgres => "postgres",
            ConnectorKind::Mysql => "mysql",
            ConnectorKind::Ansi => "ansi",
            ConnectorKind::Gremlin => "gremlin",
            ConnectorKind::Sparql => "sparql",
            ConnectorKind::Search => "search",
        }
    }

    /// The predicate compiler of this backend, able to render requests
    /// without a live driver.
    pub fn compiler(&self, settings: &Settings) -> Box<dyn Explain> {
        match self {
            ConnectorKind::Postgres => Box::new(SqlCompiler::new(PostgresDialect)),
            ConnectorKind::Mysql => Box::new(SqlCompiler::new(MySqlDialect)),
            ConnectorKind::Ansi => Box::new(SqlCompiler::new(AnsiDialect)),
            ConnectorKind::Gremlin => Box::new(GremlinCompiler::new()),
            ConnectorKind::Sparql => Box::new(SparqlCompiler::new()),
            ConnectorKind::Search => Box::new(SearchCompiler::new(settings.search.page_size)),
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown connector '{s}'")))
    }
}
