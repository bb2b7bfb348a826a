//! Comparison and arithmetic builtins
//!
//! Comparisons need both arguments bound. Arithmetic takes two bound inputs
//! and either binds or checks the third argument. Integer inputs give
//! integer results unless the operation overflows.

use std::cmp::Ordering;

use super::helpers::{check, compare_terms, get_integer, get_number, match_or_bind, same_value};
use super::{BuiltinContext, BuiltinResult};
use crate::term::{Bindings, Term};

fn both_bound(args: &[Term]) -> Option<(&Term, &Term)> {
    match args {
        [a, b, ..] if a.is_ground() && b.is_ground() => Some((a, b)),
        _ => None,
    }
}

pub fn equal(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    match both_bound(args) {
        Some((a, b)) => check(same_value(a, b), bindings),
        None => BuiltinResult::NotReady,
    }
}

pub fn not_equal(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    match both_bound(args) {
        Some((a, b)) => check(!same_value(a, b), bindings),
        None => BuiltinResult::NotReady,
    }
}

fn compare_with(args: &[Term], bindings: &Bindings, accept: fn(Ordering) -> bool) -> BuiltinResult {
    match both_bound(args) {
        Some((a, b)) => check(compare_terms(a, b).is_some_and(accept), bindings),
        None => BuiltinResult::NotReady,
    }
}

pub fn less_than(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    compare_with(args, bindings, Ordering::is_lt)
}

pub fn greater_than(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    compare_with(args, bindings, Ordering::is_gt)
}

pub fn less_or_equal(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    compare_with(args, bindings, Ordering::is_le)
}

pub fn greater_or_equal(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    compare_with(args, bindings, Ordering::is_ge)
}

/// Shared shape of the binary arithmetic builtins
fn arithmetic(
    args: &[Term],
    bindings: &Bindings,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> Option<f64>,
) -> BuiltinResult {
    let [a, b, out] = args else {
        return BuiltinResult::Failure;
    };
    if !(a.is_ground() && b.is_ground()) {
        return BuiltinResult::NotReady;
    }
    if let (Some(x), Some(y)) = (get_integer(a), get_integer(b)) {
        if let Some(result) = int_op(x, y) {
            return match_or_bind(out, Term::integer(result), bindings);
        }
    }
    match (get_number(a), get_number(b)) {
        (Some(x), Some(y)) => match float_op(x, y) {
            Some(result) if result.is_finite() => match_or_bind(out, Term::number(result), bindings),
            _ => BuiltinResult::Failure,
        },
        _ => BuiltinResult::Failure,
    }
}

pub fn sum(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    arithmetic(args, bindings, i64::checked_add, |x, y| Some(x + y))
}

pub fn difference(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    arithmetic(args, bindings, i64::checked_sub, |x, y| Some(x - y))
}

pub fn product(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    arithmetic(args, bindings, i64::checked_mul, |x, y| Some(x * y))
}

/// Two integers divide with truncation toward zero (`7 / 2 = 3`). A
/// floating argument, or an integer division that overflows, divides as
/// doubles.
pub fn quotient(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    arithmetic(args, bindings, i64::checked_div, |x, y| if y == 0.0 { None } else { Some(x / y) })
}

pub fn min(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    arithmetic(args, bindings, |x, y| Some(x.min(y)), |x, y| Some(x.min(y)))
}

pub fn max(args: &[Term], bindings: &Bindings, _ctx: &BuiltinContext) -> BuiltinResult {
    arithmetic(args, bindings, |x, y| Some(x.max(y)), |x, y| Some(x.max(y)))
}
