//! Split properties and pass-through arguments.

use floe_common::Error;
use std::fmt;
use std::str::FromStr;

/// Split property holding the [`QueryMode`].
pub const QUERY_MODE: &str = "query_mode";
/// Split property holding the class IRI of a class-mode table.
pub const CLASS: &str = "class";
/// Split property holding the IRI prefix column names are appended to.
pub const PREDICATE_PREFIX: &str = "predicate_prefix";
/// Split property naming the column bound to the subject.
pub const SUBJECT_COLUMN: &str = "subject_column";
/// Split property holding the stored query of a sparql-mode table.
pub const STORED_QUERY: &str = "stored_query";

/// Pass-through argument naming the RDF dataset.
pub const DATABASE: &str = "database";

pub const DEFAULT_SUBJECT_COLUMN: &str = "subject";

/// How a table is turned into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Instances of a class, one optional triple per column.
    Class,
    /// A stored query run as is.
    Sparql,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Class => "class",
            QueryMode::Sparql => "sparql",
        }
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "class" => Ok(QueryMode::Class),
            "sparql" => Ok(QueryMode::Sparql),
            other => Err(Error::malformed(format!("invalid query mode '{other}'"))),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
