use serde::{Deserialize, Serialize};

/// The operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// SELECT / GET
    #[default]
    Select,
    /// INSERT / POST
    Insert,
    /// UPDATE / PATCH
    Update,
    /// INSERT ... ON CONFLICT / POST with a resolution preference
    Upsert,
    /// DELETE / DELETE
    Delete,
    /// Stored procedure call, `POST /rpc/<name>`
    Rpc,
}

impl Operation {
    /// Returns true for insert, update, upsert and delete.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::Insert | Operation::Update | Operation::Upsert | Operation::Delete
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Select => write!(f, "SELECT"),
            Operation::Insert => write!(f, "INSERT"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Upsert => write!(f, "UPSERT"),
            Operation::Delete => write!(f, "DELETE"),
            Operation::Rpc => write!(f, "RPC"),
        }
    }
}

/// Canonical filter operators.
///
/// The discriminant order matches the rows of [`crate::codec::OPERATORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `eq` (=)
    Eq,
    /// `neq` (!=)
    Neq,
    /// `gt` (>)
    Gt,
    /// `gte` (>=)
    Gte,
    /// `lt` (<)
    Lt,
    /// `lte` (<=)
    Lte,
    /// `like` (LIKE)
    Like,
    /// `ilike` (ILIKE)
    ILike,
    /// `match` (~) POSIX regex
    Match,
    /// `imatch` (~*) case-insensitive regex
    IMatch,
    /// `cs` (@>) contains
    Contains,
    /// `cd` (<@) contained by
    ContainedBy,
    /// `ov` (&&) overlaps
    Overlaps,
    /// `sl` (<<) strictly left of
    StrictlyLeft,
    /// `sr` (>>) strictly right of
    StrictlyRight,
    /// `nxr` (&<) does not extend to the right of
    NotExtendRight,
    /// `nxl` (&>) does not extend to the left of
    NotExtendLeft,
    /// `adj` (-|-) adjacent to
    Adjacent,
    /// `is` (IS) null / true / false / unknown
    Is,
    /// `in` (IN) list membership
    In,
    /// `fts` (@@ to_tsquery)
    Fts,
    /// `plfts` (@@ plainto_tsquery)
    PlFts,
    /// `phfts` (@@ phraseto_tsquery)
    PhFts,
    /// `wfts` (@@ websearch_to_tsquery)
    WFts,
}

/// Logical connective between filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogicalOp {
    #[default]
    And,
    /// Parsed only to be rejected: OR groups are never flattened.
    Or,
}

/// Where NULLs sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

/// `Prefer: count=<mode>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    Exact,
    Planned,
    Estimated,
}

impl CountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMode::Exact => "exact",
            CountMode::Planned => "planned",
            CountMode::Estimated => "estimated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(CountMode::Exact),
            "planned" => Some(CountMode::Planned),
            "estimated" => Some(CountMode::Estimated),
            _ => None,
        }
    }
}

/// `.single()` / `.maybeSingle()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SingleMode {
    /// Exactly one row, error otherwise.
    One,
    /// Zero or one row.
    MaybeOne,
}
