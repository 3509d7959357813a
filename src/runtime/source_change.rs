//! The algebra of proposed program edits. A `SourceChange` is a tree of
//! literal edits combined conjunctively (`And`: apply all together) or
//! disjunctively (`Or`: any branch suffices, the first is canonical).

use crate::language::span::Range;
use crate::language::tree::InputEdit;

#[derive(Clone, Debug, PartialEq)]
pub struct SourceEdit {
    pub range: Range,
    pub replacement: String,
}

impl SourceEdit {
    pub fn new(range: Range, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }
}

impl From<SourceEdit> for InputEdit {
    fn from(edit: SourceEdit) -> Self {
        InputEdit {
            range: edit.range,
            replacement: edit.replacement,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SourceChange {
    Edit(SourceEdit),
    And(Vec<SourceChange>),
    Or(Vec<SourceChange>),
}

impl SourceChange {
    pub fn edit(range: Range, replacement: impl Into<String>) -> Self {
        SourceChange::Edit(SourceEdit::new(range, replacement))
    }

    /// Conjunction of two changes, flattening nested `And`s.
    pub fn and(self, other: SourceChange) -> SourceChange {
        let mut children = match self {
            SourceChange::And(children) => children,
            other => vec![other],
        };
        match other {
            SourceChange::And(more) => children.extend(more),
            single => children.push(single),
        }
        SourceChange::And(children)
    }

    /// Disjunction of two changes, flattening nested `Or`s. The left
    /// operand stays canonical.
    pub fn or(self, other: SourceChange) -> SourceChange {
        let mut branches = match self {
            SourceChange::Or(branches) => branches,
            other => vec![other],
        };
        match other {
            SourceChange::Or(more) => branches.extend(more),
            single => branches.push(single),
        }
        SourceChange::Or(branches)
    }

    /// Combines two optional changes conjunctively; `None` is the neutral
    /// element.
    pub fn combine(lhs: Option<SourceChange>, rhs: Option<SourceChange>) -> Option<SourceChange> {
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Some(lhs.and(rhs)),
            (Some(lhs), None) => Some(lhs),
            (None, rhs) => rhs,
        }
    }

    /// Combines two optional changes disjunctively.
    pub fn alternative(
        lhs: Option<SourceChange>,
        rhs: Option<SourceChange>,
    ) -> Option<SourceChange> {
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Some(lhs.or(rhs)),
            (Some(lhs), None) => Some(lhs),
            (None, rhs) => rhs,
        }
    }

    /// Flattens to concrete edits: `And` conjunctively, the first branch
    /// of every `Or`.
    pub fn first_alternative(&self) -> Vec<SourceEdit> {
        let mut edits = Vec::new();
        self.collect_first(&mut edits);
        edits
    }

    fn collect_first(&self, edits: &mut Vec<SourceEdit>) {
        match self {
            SourceChange::Edit(edit) => edits.push(edit.clone()),
            SourceChange::And(children) => {
                for child in children {
                    child.collect_first(edits);
                }
            }
            SourceChange::Or(branches) => {
                if let Some(first) = branches.first() {
                    first.collect_first(edits);
                }
            }
        }
    }
}

/// Returns the first overlapping pair, if any. Callers treat overlap as a
/// fatal input error.
pub fn find_overlap(edits: &[SourceEdit]) -> Option<(Range, Range)> {
    let mut sorted: Vec<&SourceEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.range.start.byte);
    for pair in sorted.windows(2) {
        if pair[0].range.overlaps(&pair[1].range) {
            return Some((pair[0].range, pair[1].range));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Location;

    fn range(start: usize, end: usize) -> Range {
        Range::new(Location::new(0, start, start), Location::new(0, end, end))
    }

    #[test]
    fn combine_is_conjunctive_and_flattens() {
        let a = SourceChange::edit(range(0, 1), "x");
        let b = SourceChange::edit(range(2, 3), "y");
        let c = SourceChange::edit(range(4, 5), "z");
        let combined = SourceChange::combine(
            SourceChange::combine(Some(a.clone()), Some(b.clone())),
            Some(c.clone()),
        )
        .unwrap();
        assert_eq!(combined, SourceChange::And(vec![a, b, c]));
    }

    #[test]
    fn combine_with_none_is_identity() {
        let a = SourceChange::edit(range(0, 1), "x");
        assert_eq!(SourceChange::combine(Some(a.clone()), None), Some(a.clone()));
        assert_eq!(SourceChange::combine(None, Some(a.clone())), Some(a));
        assert_eq!(SourceChange::combine(None, None), None);
    }

    #[test]
    fn first_alternative_takes_first_or_branch() {
        let change = SourceChange::Or(vec![
            SourceChange::edit(range(0, 1), "a"),
            SourceChange::edit(range(2, 3), "b"),
        ]);
        let edits = change.first_alternative();
        assert_eq!(edits, vec![SourceEdit::new(range(0, 1), "a")]);
    }

    #[test]
    fn first_alternative_walks_and_nodes() {
        let change = SourceChange::And(vec![
            SourceChange::edit(range(0, 1), "a"),
            SourceChange::Or(vec![
                SourceChange::edit(range(2, 3), "b"),
                SourceChange::edit(range(4, 5), "c"),
            ]),
        ]);
        assert_eq!(
            change.first_alternative(),
            vec![
                SourceEdit::new(range(0, 1), "a"),
                SourceEdit::new(range(2, 3), "b"),
            ]
        );
    }

    #[test]
    fn overlap_detection() {
        let edits = vec![
            SourceEdit::new(range(0, 3), "a"),
            SourceEdit::new(range(2, 5), "b"),
        ];
        assert!(find_overlap(&edits).is_some());
        let disjoint = vec![
            SourceEdit::new(range(0, 2), "a"),
            SourceEdit::new(range(2, 5), "b"),
        ];
        assert!(find_overlap(&disjoint).is_none());
    }
}
