//! DESCRIBE, LIST and TERMINATE.

use crate::error::{BuildError, BuildResult};
use crate::expr::Expression;

/// `DESCRIBE name [EXTENDED];`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Describe {
    relation: String,
    extended: bool,
}

impl Describe {
    /// Describes `relation`.
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            extended: false,
        }
    }

    /// Requests runtime statistics as well.
    #[must_use]
    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    /// The described relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }
}

impl Expression for Describe {
    fn to_sql(&self) -> BuildResult<String> {
        if self.relation.trim().is_empty() {
            return Err(BuildError::EmptyRelation("DESCRIBE"));
        }
        let extended = if self.extended { " EXTENDED" } else { "" };
        Ok(format!("DESCRIBE {}{};", self.relation, extended))
    }
}

/// What a LIST statement enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Streams.
    Streams,
    /// Tables.
    Tables,
    /// Topics.
    Topics,
    /// Running queries.
    Queries,
}

impl ListKind {
    /// Returns the keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ListKind::Streams => "STREAMS",
            ListKind::Tables => "TABLES",
            ListKind::Topics => "TOPICS",
            ListKind::Queries => "QUERIES",
        }
    }
}

/// `LIST STREAMS|TABLES|TOPICS|QUERIES [EXTENDED];`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct List {
    kind: ListKind,
    extended: bool,
}

impl List {
    /// Lists `kind`.
    pub const fn new(kind: ListKind) -> Self {
        Self {
            kind,
            extended: false,
        }
    }

    /// `LIST STREAMS`
    pub const fn streams() -> Self {
        Self::new(ListKind::Streams)
    }

    /// `LIST TABLES`
    pub const fn tables() -> Self {
        Self::new(ListKind::Tables)
    }

    /// `LIST TOPICS`
    pub const fn topics() -> Self {
        Self::new(ListKind::Topics)
    }

    /// `LIST QUERIES`
    pub const fn queries() -> Self {
        Self::new(ListKind::Queries)
    }

    /// Requests details.
    #[must_use]
    pub const fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    /// What is listed.
    pub const fn kind(&self) -> ListKind {
        self.kind
    }
}

impl Expression for List {
    fn to_sql(&self) -> BuildResult<String> {
        let extended = if self.extended { " EXTENDED" } else { "" };
        Ok(format!("LIST {}{};", self.kind.as_sql(), extended))
    }
}

/// `TERMINATE query_id;` or `TERMINATE ALL;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminate {
    /// One query by identifier.
    Query(String),
    /// Every running query.
    All,
}

impl Terminate {
    /// Terminates one query.
    pub fn query(id: impl Into<String>) -> Self {
        Terminate::Query(id.into())
    }

    /// Terminates every query.
    pub const fn all() -> Self {
        Terminate::All
    }
}

impl Expression for Terminate {
    fn to_sql(&self) -> BuildResult<String> {
        match self {
            Terminate::All => Ok("TERMINATE ALL;".to_string()),
            Terminate::Query(id) if id.trim().is_empty() => {
                Err(BuildError::EmptyRelation("TERMINATE"))
            }
            Terminate::Query(id) => Ok(format!("TERMINATE {};", id)),
        }
    }
}
