//! Provenance of runtime values. An `Origin` is a small expression tree
//! describing how a value was computed from source literals; `force`
//! reverses it into a `SourceChange` that would make the program produce
//! a desired value at the same point.
//!
//! Operators register their reverse rules as closures captured when the
//! origin is built, so forcing needs no central dispatch table.

use crate::language::span::Range;
use crate::runtime::source_change::SourceChange;
use crate::runtime::value::{Value, ValueData};
use std::fmt;
use std::rc::Rc;

pub type ReverseBinary = dyn Fn(&Value, &Value, &Value) -> Option<SourceChange>;
pub type ReverseUnary = dyn Fn(&Value, &Value) -> Option<SourceChange>;

#[derive(Clone, Default)]
pub enum Origin {
    /// No provenance.
    #[default]
    None,
    /// Produced by the host; known but not forceable.
    External,
    /// Came verbatim from the bytes at a range.
    Literal(LiteralOrigin),
    Binary(BinaryOrigin),
    Unary(UnaryOrigin),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiteralOrigin {
    pub range: Range,
}

#[derive(Clone)]
pub struct BinaryOrigin {
    pub lhs: Box<Value>,
    pub rhs: Box<Value>,
    pub location: Option<Range>,
    pub reverse: Option<Rc<ReverseBinary>>,
}

#[derive(Clone)]
pub struct UnaryOrigin {
    pub value: Box<Value>,
    pub location: Option<Range>,
    pub reverse: Option<Rc<ReverseUnary>>,
}

impl Origin {
    pub fn literal(range: Range) -> Self {
        Origin::Literal(LiteralOrigin { range })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Origin::None)
    }

    /// Computes a change that would make the program produce `target`
    /// where this origin's value was produced. `None` means the value is
    /// not forceable (or `target` has no literal form).
    pub fn force(&self, target: &Value) -> Option<SourceChange> {
        match self {
            Origin::None | Origin::External => None,
            Origin::Literal(origin) => target
                .to_literal()
                .ok()
                .map(|literal| SourceChange::edit(origin.range, literal)),
            Origin::Binary(origin) => origin
                .reverse
                .as_ref()
                .and_then(|reverse| reverse(target, &origin.lhs, &origin.rhs)),
            Origin::Unary(origin) => origin
                .reverse
                .as_ref()
                .and_then(|reverse| reverse(target, &origin.value)),
        }
    }
}

impl PartialEq for Origin {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Origin::None, Origin::None) => true,
            (Origin::External, Origin::External) => true,
            (Origin::Literal(a), Origin::Literal(b)) => a == b,
            (Origin::Binary(a), Origin::Binary(b)) => {
                a.location == b.location
                    && a.lhs == b.lhs
                    && a.rhs == b.rhs
                    && a.lhs.origin() == b.lhs.origin()
                    && a.rhs.origin() == b.rhs.origin()
            }
            (Origin::Unary(a), Origin::Unary(b)) => {
                a.location == b.location
                    && a.value == b.value
                    && a.value.origin() == b.value.origin()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::None => write!(f, "None"),
            Origin::External => write!(f, "External"),
            Origin::Literal(origin) => write!(f, "Literal({})", origin.range),
            Origin::Binary(origin) => write!(
                f,
                "Binary({:?}, {:?})",
                origin.lhs.data(),
                origin.rhs.data()
            ),
            Origin::Unary(origin) => write!(f, "Unary({:?})", origin.value.data()),
        }
    }
}

/// Reverse rule for arithmetic operators: each solver recovers one
/// operand from the desired result and the other operand's value.
/// `both_solve` handles the case where both operands share one origin
/// (`x + x`): the shared origin absorbs the whole delta at once.
pub fn binary_num_reverse(
    lhs_solve: impl Fn(f64, f64) -> f64 + 'static,
    rhs_solve: impl Fn(f64, f64) -> f64 + 'static,
    both_solve: Option<fn(f64) -> f64>,
) -> Rc<ReverseBinary> {
    Rc::new(move |target, lhs, rhs| {
        let desired = target.as_number()?;

        if let Some(both) = both_solve {
            if !lhs.origin().is_none() && lhs.origin() == rhs.origin() {
                let change = lhs.origin().force(&Value::number(both(desired)))?;
                return Some(SourceChange::And(vec![change]));
            }
        }

        let mut branches = Vec::new();
        if let Some(rhs_num) = rhs.as_number() {
            let candidate = lhs_solve(desired, rhs_num);
            if candidate.is_finite() {
                if let Some(change) = lhs.origin().force(&Value::number(candidate)) {
                    branches.push(change);
                }
            }
        }
        if let Some(lhs_num) = lhs.as_number() {
            let candidate = rhs_solve(desired, lhs_num);
            if candidate.is_finite() {
                if let Some(change) = rhs.origin().force(&Value::number(candidate)) {
                    branches.push(change);
                }
            }
        }

        let mut branches = branches.into_iter();
        let first = branches.next()?;
        match branches.next() {
            Some(second) => Some(first.or(second)),
            None => Some(first),
        }
    })
}

pub fn unary_num_reverse(solve: impl Fn(f64) -> f64 + 'static) -> Rc<ReverseUnary> {
    Rc::new(move |target, value| {
        let desired = target.as_number()?;
        let candidate = solve(desired);
        if !candidate.is_finite() {
            return None;
        }
        value.origin().force(&Value::number(candidate))
    })
}

/// Reverse rule for `not`: the operand must get the opposite truthiness.
/// Boolean operands flip their literal; number literals are rewritten to
/// 1/0; anything else becomes a boolean literal.
pub fn not_reverse() -> Rc<ReverseUnary> {
    Rc::new(|target, value| {
        let desired = !target.truthy();
        let replacement = match value.data() {
            ValueData::Bool(_) => Value::from(desired),
            ValueData::Number(_) => Value::number(if desired { 1.0 } else { 0.0 }),
            _ => Value::from(desired),
        };
        value.origin().force(&replacement)
    })
}

/// Reverse rule for `and`/`or`: the change routes to whichever operand
/// the short-circuit selected.
pub fn select_reverse(lhs_when_truthy: bool) -> Rc<ReverseBinary> {
    Rc::new(move |target, lhs, rhs| {
        if lhs.truthy() == lhs_when_truthy {
            lhs.origin().force(target)
        } else {
            rhs.origin().force(target)
        }
    })
}

/// Reverse rule for `..`: match the desired string against the stringified
/// operands and let the other operand absorb the difference. When both
/// ends match, the branch preserving the longer operand comes first.
pub fn concat_reverse() -> Rc<ReverseBinary> {
    Rc::new(|target, lhs, rhs| {
        let desired = target.coerce_display()?;
        let lhs_text = lhs.coerce_display()?;
        let rhs_text = rhs.coerce_display()?;

        let mut branches: Vec<(usize, SourceChange)> = Vec::new();
        if let Some(prefix) = desired.strip_suffix(rhs_text.as_str()) {
            if let Some(change) = lhs.origin().force(&piece_value(lhs, prefix)) {
                branches.push((rhs_text.len(), change));
            }
        }
        if let Some(suffix) = desired.strip_prefix(lhs_text.as_str()) {
            if let Some(change) = rhs.origin().force(&piece_value(rhs, suffix)) {
                branches.push((lhs_text.len(), change));
            }
        }
        branches.sort_by(|a, b| b.0.cmp(&a.0));

        let mut branches = branches.into_iter().map(|(_, change)| change);
        let first = branches.next()?;
        match branches.next() {
            Some(second) => Some(first.or(second)),
            None => Some(first),
        }
    })
}

/// A concat operand keeps its type where possible: numeric operands stay
/// numbers when the absorbed piece still parses as one.
fn piece_value(old: &Value, piece: &str) -> Value {
    if matches!(old.data(), ValueData::Number(_)) {
        if let Ok(number) = piece.parse::<f64>() {
            return Value::number(number);
        }
    }
    Value::from(piece.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Location;
    use crate::runtime::source_change::SourceEdit;

    fn range(start: usize, end: usize) -> Range {
        Range::new(Location::new(0, start, start), Location::new(0, end, end))
    }

    fn literal_number(n: f64, start: usize, end: usize) -> Value {
        Value::number(n).with_origin(Origin::literal(range(start, end)))
    }

    #[test]
    fn literal_force_rewrites_the_range() {
        let value = literal_number(1.0, 4, 5);
        let change = value.origin().force(&Value::number(8.0)).unwrap();
        assert_eq!(change, SourceChange::edit(range(4, 5), "8"));
    }

    #[test]
    fn literal_force_accepts_representable_table_targets() {
        let value = literal_number(1.0, 0, 1);
        let target = Value::from(crate::runtime::value::Table::new());
        assert!(value.origin().force(&target).is_some());
    }

    #[test]
    fn none_and_external_are_not_forceable() {
        assert!(Origin::None.force(&Value::number(1.0)).is_none());
        assert!(Origin::External.force(&Value::number(1.0)).is_none());
    }

    #[test]
    fn add_reverse_offers_both_operands() {
        let lhs = literal_number(1.0, 4, 5);
        let rhs = literal_number(2.0, 8, 9);
        let result = lhs.add(&rhs, range(4, 9)).unwrap();
        let change = result.origin().force(&Value::number(10.0)).unwrap();
        assert_eq!(
            change,
            SourceChange::Or(vec![
                SourceChange::edit(range(4, 5), "8"),
                SourceChange::edit(range(8, 9), "9"),
            ])
        );
    }

    #[test]
    fn add_reverse_with_one_forceable_operand() {
        let lhs = Value::number(1.0);
        let rhs = literal_number(2.0, 8, 9);
        let result = lhs.add(&rhs, range(0, 9)).unwrap();
        let change = result.origin().force(&Value::number(10.0)).unwrap();
        assert_eq!(change, SourceChange::edit(range(8, 9), "9"));
    }

    #[test]
    fn add_reverse_with_shared_origin_emits_a_conjunction() {
        let shared = literal_number(3.0, 4, 5);
        let result = shared.add(&shared, range(4, 5)).unwrap();
        let change = result.origin().force(&Value::number(10.0)).unwrap();
        assert_eq!(
            change,
            SourceChange::And(vec![SourceChange::edit(range(4, 5), "5")])
        );
    }

    #[test]
    fn sub_and_div_reverse_use_algebraic_inverses() {
        let lhs = literal_number(10.0, 0, 2);
        let rhs = literal_number(4.0, 5, 6);
        let diff = lhs.sub(&rhs, range(0, 6)).unwrap();
        let change = diff.origin().force(&Value::number(2.0)).unwrap();
        // lhs' = 2 + 4 = 6, rhs' = 10 - 2 = 8
        assert_eq!(
            change,
            SourceChange::Or(vec![
                SourceChange::edit(range(0, 2), "6"),
                SourceChange::edit(range(5, 6), "8"),
            ])
        );

        let quot = lhs.div(&rhs, range(0, 6)).unwrap();
        let change = quot.origin().force(&Value::number(5.0)).unwrap();
        // lhs' = 5 * 4 = 20, rhs' = 10 / 5 = 2
        assert_eq!(
            change,
            SourceChange::Or(vec![
                SourceChange::edit(range(0, 2), "20"),
                SourceChange::edit(range(5, 6), "2"),
            ])
        );
    }

    #[test]
    fn mul_reverse_skips_division_by_zero() {
        let lhs = literal_number(0.0, 0, 1);
        let rhs = literal_number(3.0, 4, 5);
        let product = lhs.mul(&rhs, range(0, 5)).unwrap();
        // rhs' = 6 / 0 is not finite, so only the lhs branch survives
        let change = product.origin().force(&Value::number(6.0)).unwrap();
        assert_eq!(change, SourceChange::edit(range(0, 1), "2"));
    }

    #[test]
    fn neg_reverse_negates_the_target() {
        let value = literal_number(5.0, 1, 2);
        let negated = value.negate(range(0, 2)).unwrap();
        let change = negated.origin().force(&Value::number(-9.0)).unwrap();
        assert_eq!(change, SourceChange::edit(range(1, 2), "9"));
    }

    #[test]
    fn not_reverse_flips_boolean_literals() {
        let value = Value::from(true).with_origin(Origin::literal(range(0, 4)));
        let inverted = value.invert(range(0, 4));
        assert_eq!(inverted.data(), &ValueData::Bool(false));
        let change = inverted.origin().force(&Value::from(true)).unwrap();
        assert_eq!(change, SourceChange::edit(range(0, 4), "false"));
    }

    #[test]
    fn not_reverse_rewrites_number_literals_to_zero_or_one() {
        let value = literal_number(7.0, 0, 1);
        let inverted = value.invert(range(0, 1));
        let change = inverted.origin().force(&Value::from(true)).unwrap();
        assert_eq!(change, SourceChange::edit(range(0, 1), "0"));
    }

    #[test]
    fn and_reverse_routes_to_the_selected_operand() {
        let lhs = Value::from(false).with_origin(Origin::literal(range(0, 5)));
        let rhs = literal_number(2.0, 10, 11);
        let result = lhs.logic_and(&rhs, range(0, 11));
        assert!(!result.truthy());
        // lhs was falsy, so the change targets lhs
        let change = result.origin().force(&Value::from(true)).unwrap();
        assert_eq!(change, SourceChange::edit(range(0, 5), "true"));
    }

    #[test]
    fn or_reverse_routes_to_the_selected_operand() {
        let lhs = Value::from(true).with_origin(Origin::literal(range(0, 4)));
        let rhs = literal_number(2.0, 8, 9);
        let result = lhs.logic_or(&rhs, range(0, 9));
        assert!(result.truthy());
        let change = result.origin().force(&Value::from(false)).unwrap();
        assert_eq!(change, SourceChange::edit(range(0, 4), "false"));
    }

    #[test]
    fn concat_reverse_absorbs_into_the_matching_operand() {
        let lhs = Value::from("ab".to_string()).with_origin(Origin::literal(range(0, 4)));
        let rhs = Value::from("cd".to_string()).with_origin(Origin::literal(range(8, 12)));
        let result = lhs.concat(&rhs, range(0, 12)).unwrap();
        assert_eq!(result.coerce_display().unwrap(), "abcd");

        let change = result
            .origin()
            .force(&Value::from("abXY".to_string()))
            .unwrap();
        // prefix "ab" matches lhs, so rhs absorbs the change
        assert_eq!(
            change,
            SourceChange::Edit(SourceEdit::new(range(8, 12), "\"XY\""))
        );
    }

    #[test]
    fn concat_reverse_keeps_numeric_operands_numeric() {
        let lhs = Value::from("n = ".to_string()).with_origin(Origin::literal(range(0, 6)));
        let rhs = literal_number(1.0, 10, 11);
        let result = lhs.concat(&rhs, range(0, 11)).unwrap();
        let change = result
            .origin()
            .force(&Value::from("n = 23".to_string()))
            .unwrap();
        assert_eq!(change, SourceChange::edit(range(10, 11), "23"));
    }

    #[test]
    fn mod_and_bitwise_have_no_reverse() {
        let lhs = literal_number(7.0, 0, 1);
        let rhs = literal_number(3.0, 4, 5);
        let modulo = lhs.modulo(&rhs, range(0, 5)).unwrap();
        assert!(modulo.origin().force(&Value::number(1.0)).is_none());
        let band = lhs.bit_and(&rhs, range(0, 5)).unwrap();
        assert!(band.origin().force(&Value::number(1.0)).is_none());
    }
}
