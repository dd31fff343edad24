//! [`BeadSearch`] is the fluent condition-accumulating query builder.
//! A tagged-variant enum instead of a trait object or generic parameter —
//! single-box and multi-box search share one set of builder methods and one
//! set of terminators without a class hierarchy, per the redesign note this
//! crate follows for search composition.

use crate::box_::Box;
use crate::condition::{Condition, ConditionKind};
use crate::error::Result;
use crate::record::BeadRecord;

/// Accumulates `(ConditionKind, value)` pairs and drives one or many boxes.
/// **Single** binds to one box and delegates directly. **Multi** holds an
/// ordered list of boxes, queries each in turn, and unions the results; box
/// order is the primary ordering key for `first`, overridden only by
/// `newest`/`oldest`, which sort globally by `freeze_time`.
pub enum BeadSearch<'a> {
    Single(&'a Box, Vec<Condition>),
    Multi(Vec<&'a Box>, Vec<Condition>),
}

macro_rules! builder_method {
    ($name:ident, $kind:expr) => {
        pub fn $name(mut self, value: impl Into<String>) -> Self {
            self.conditions_mut().push(Condition::new($kind, value));
            self
        }
    };
}

impl<'a> BeadSearch<'a> {
    pub fn single(b: &'a Box) -> Self {
        BeadSearch::Single(b, Vec::new())
    }

    pub fn multi(boxes: Vec<&'a Box>) -> Self {
        BeadSearch::Multi(boxes, Vec::new())
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        match self {
            BeadSearch::Single(_, conditions) => conditions,
            BeadSearch::Multi(_, conditions) => conditions,
        }
    }

    builder_method!(by_name, ConditionKind::BeadName);
    builder_method!(by_kind, ConditionKind::Kind);
    builder_method!(by_content_id, ConditionKind::ContentId);
    builder_method!(at_time, ConditionKind::AtTime);
    builder_method!(newer_than, ConditionKind::NewerThan);
    builder_method!(older_than, ConditionKind::OlderThan);
    builder_method!(at_or_newer, ConditionKind::AtOrNewer);
    builder_method!(at_or_older, ConditionKind::AtOrOlder);

    /// All matches across the bound box(es).
    pub fn all(self) -> Result<Vec<BeadRecord>> {
        match self {
            BeadSearch::Single(b, conditions) => b.get_beads(&conditions),
            BeadSearch::Multi(boxes, conditions) => {
                let mut out = Vec::new();
                for b in boxes {
                    out.extend(b.get_beads(&conditions)?);
                }
                Ok(out)
            }
        }
    }

    /// Any match; for `Multi`, the first box (in the given order) with any
    /// match wins — order is otherwise unspecified within that box's
    /// result set.
    pub fn first(self) -> Result<Option<BeadRecord>> {
        match self {
            BeadSearch::Single(b, conditions) => Ok(b.get_beads(&conditions)?.into_iter().next()),
            BeadSearch::Multi(boxes, conditions) => {
                for b in boxes {
                    if let Some(r) = b.get_beads(&conditions)?.into_iter().next() {
                        return Ok(Some(r));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Max by `freeze_time`, ties broken by `content_id` ascending — global
    /// across every bound box, regardless of box order.
    pub fn newest(self) -> Result<Option<BeadRecord>> {
        Ok(self.all()?.into_iter().max())
    }

    /// Min by `freeze_time`, same tie-breaker, same global scope as `newest`.
    pub fn oldest(self) -> Result<Option<BeadRecord>> {
        Ok(self.all()?.into_iter().min())
    }

    pub fn exists(self) -> Result<bool> {
        Ok(self.first()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_multi_search_has_no_matches() {
        let search: BeadSearch = BeadSearch::multi(Vec::new());
        assert!(search.all().unwrap().is_empty());
    }
}
