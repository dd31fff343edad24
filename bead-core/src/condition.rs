//! Translates a list of `(ConditionKind, value)` pairs into a parameterized
//! SQL WHERE-clause fragment. This is the only module that constructs SQL
//! text from caller-supplied values; every value flows out as a bound
//! parameter, never interpolated into the fragment itself.

use rusqlite::ToSql;

/// The closed set of condition kinds `query` understands. This list is
/// exhaustive by design (spec's "Supported kinds" table is the complete
/// surface), so the enum is not `#[non_exhaustive]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    BeadName,
    Kind,
    ContentId,
    AtTime,
    NewerThan,
    OlderThan,
    AtOrNewer,
    AtOrOlder,
}

impl ConditionKind {
    fn column(self) -> &'static str {
        match self {
            ConditionKind::BeadName => "name",
            ConditionKind::Kind => "kind",
            ConditionKind::ContentId => "content_id",
            ConditionKind::AtTime
            | ConditionKind::NewerThan
            | ConditionKind::OlderThan
            | ConditionKind::AtOrNewer
            | ConditionKind::AtOrOlder => "freeze_time_str",
        }
    }

    fn operator(self) -> &'static str {
        match self {
            ConditionKind::BeadName | ConditionKind::Kind | ConditionKind::ContentId => "=",
            ConditionKind::AtTime => "=",
            ConditionKind::NewerThan => ">",
            ConditionKind::OlderThan => "<",
            ConditionKind::AtOrNewer => ">=",
            ConditionKind::AtOrOlder => "<=",
        }
    }
}

/// One `(kind, value)` pair accumulated by a search builder.
#[derive(Debug, Clone)]
pub struct Condition {
    pub kind: ConditionKind,
    pub value: String,
}

impl Condition {
    pub fn new(kind: ConditionKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A compiled fragment: a WHERE clause with positional placeholders (`?1`,
/// `?2`, ...) over the `beads` table, plus the parallel parameter list in
/// the same order. An empty condition list compiles to `WHERE 1=1`, which
/// selects every row without needing a special-cased query string upstream.
pub struct CompiledQuery {
    pub where_clause: String,
    pub params: Vec<Box<dyn ToSql>>,
}

impl std::fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("where_clause", &self.where_clause)
            .field("param_count", &self.params.len())
            .finish()
    }
}

/// Conjoin every condition with AND; an empty list matches all rows.
pub fn compile(conditions: &[Condition]) -> CompiledQuery {
    if conditions.is_empty() {
        return CompiledQuery {
            where_clause: "1=1".to_string(),
            params: Vec::new(),
        };
    }

    let mut clause = String::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::with_capacity(conditions.len());

    for (i, cond) in conditions.iter().enumerate() {
        if i > 0 {
            clause.push_str(" AND ");
        }
        clause.push_str(cond.kind.column());
        clause.push_str(cond.kind.operator());
        clause.push('?');
        clause.push_str(&(i + 1).to_string());
        params.push(Box::new(cond.value.clone()) as Box<dyn ToSql>);
    }

    CompiledQuery {
        where_clause: clause,
        params,
    }
}

/// In-memory equivalent of a compiled WHERE clause, used by `BoxIndex`'s
/// degraded (filesystem-enumeration) mode when no SQLite connection is
/// available to evaluate conditions against. Column/operator semantics must
/// stay identical to `compile`'s SQL form.
pub fn record_matches(conditions: &[Condition], name: &str, kind: &str, content_id: &str, freeze_time: &str) -> bool {
    conditions.iter().all(|c| {
        let field = match c.kind {
            ConditionKind::BeadName => name,
            ConditionKind::Kind => kind,
            ConditionKind::ContentId => content_id,
            ConditionKind::AtTime
            | ConditionKind::NewerThan
            | ConditionKind::OlderThan
            | ConditionKind::AtOrNewer
            | ConditionKind::AtOrOlder => freeze_time,
        };
        match c.kind {
            ConditionKind::BeadName | ConditionKind::Kind | ConditionKind::ContentId | ConditionKind::AtTime => {
                field == c.value
            }
            ConditionKind::NewerThan => field > c.value.as_str(),
            ConditionKind::OlderThan => field < c.value.as_str(),
            ConditionKind::AtOrNewer => field >= c.value.as_str(),
            ConditionKind::AtOrOlder => field <= c.value.as_str(),
        }
    })
}
