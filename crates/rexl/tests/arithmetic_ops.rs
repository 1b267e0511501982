//! Operator semantics end-to-end: promotion, coercions, null policies,
//! bitwise, matching and ranges, driven through compiled programs.

mod common;

use common::eval;
use pretty_assertions::assert_eq;
use rexl::{Engine, ErrorKind, MapContext, Value};

// =============================================================================
// 1. numeric promotion and width preservation
// =============================================================================

#[test]
fn integers_stay_integral() {
    assert_eq!(eval("1 + 2"), Value::I32(3));
    assert_eq!(eval("6 * 7"), Value::I32(42));
}

#[test]
fn long_suffix_widens() {
    assert_eq!(eval("1l + 2"), Value::I64(3));
}

#[test]
fn float_wins_over_int() {
    assert_eq!(eval("1 + 0.5"), Value::F64(1.5));
}

#[test]
fn bigint_literals_compute_exactly() {
    let v = eval("9223372036854775807H + 1");
    assert_eq!(v.to_string(), "9223372036854775808");
}

#[test]
fn long_overflow_promotes_to_bigint() {
    let v = eval("9223372036854775807l + 1l");
    assert_eq!(v.to_string(), "9223372036854775808");
}

#[test]
fn decimal_arithmetic_is_exact() {
    assert_eq!(eval("1.1B + 2.2B"), eval("3.3B"));
    assert_eq!(eval("0.1B + 0.2B"), eval("0.3B"));
}

// =============================================================================
// 2. division
// =============================================================================

#[test]
fn exact_integer_division_stays_integer() {
    assert_eq!(eval("10 / 2"), Value::I32(5));
}

#[test]
fn inexact_integer_division_promotes_to_floating() {
    assert_eq!(eval("10 / 4"), Value::F64(2.5));
}

#[test]
fn division_by_zero_fails_under_strict_arithmetic() {
    let err = Engine::new()
        .compile("1 / 0")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Arithmetic);
}

#[test]
fn division_by_zero_yields_zero_under_lenient_arithmetic() {
    let engine = Engine::builder().strict_arithmetic(false).build();
    let v = engine
        .compile("1 / 0")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap();
    assert_eq!(v, Value::I32(0));
}

// =============================================================================
// 3. null policy
// =============================================================================

#[test]
fn null_operand_fails_under_strict_arithmetic() {
    let err = Engine::new()
        .compile("null + 1")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Arithmetic);
}

#[test]
fn null_operand_coerces_to_zero_under_lenient_arithmetic() {
    let engine = Engine::builder().strict_arithmetic(false).build();
    let v = engine
        .compile("null + 41")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap();
    assert_eq!(v, Value::I32(41));
}

#[test]
fn bitwise_null_is_zero_even_under_strict() {
    assert_eq!(eval("null | 6"), Value::I64(6));
    assert_eq!(eval("null & 6"), Value::I64(0));
}

// =============================================================================
// 4. strings, booleans, characters
// =============================================================================

#[test]
fn string_plus_anything_concatenates() {
    assert_eq!(eval("'a' + 1"), Value::str("a1"));
    assert_eq!(eval("1 + 'a'"), Value::str("1a"));
}

#[test]
fn numeric_strings_coerce_for_non_concat_operators() {
    assert_eq!(eval("'6' * '7'"), Value::I32(42));
    assert_eq!(eval("'1.5' - 0.5"), Value::F64(1.0));
}

#[test]
fn boolean_coerces_to_one_and_zero() {
    assert_eq!(eval("true + 1"), Value::I32(2));
    assert_eq!(eval("false + 1"), Value::I32(1));
}

#[test]
fn string_boolean_equality_via_string_form() {
    assert_eq!(eval("'true' == true"), Value::Bool(true));
    assert_eq!(eval("'false' == false"), Value::Bool(true));
    assert_eq!(eval("'42' == 42"), Value::Bool(true));
}

#[test]
fn eq_and_ne_are_word_synonyms() {
    assert_eq!(eval("1 eq 1"), Value::Bool(true));
    assert_eq!(eval("1 ne 2"), Value::Bool(true));
}

#[test]
fn cross_width_equality() {
    assert_eq!(eval("1 == 1l"), Value::Bool(true));
    assert_eq!(eval("1 == 1.0"), Value::Bool(true));
    assert_eq!(eval("1H == 1"), Value::Bool(true));
}

// =============================================================================
// 5. comparisons
// =============================================================================

#[test]
fn ordered_comparison_on_numbers_and_strings() {
    assert_eq!(eval("1 < 2"), Value::Bool(true));
    assert_eq!(eval("2.5 >= 2"), Value::Bool(true));
    assert_eq!(eval("'abc' < 'abd'"), Value::Bool(true));
}

#[test]
fn string_compares_numerically_against_numbers() {
    assert_eq!(eval("'10' > 9"), Value::Bool(true));
}

// =============================================================================
// 6. bitwise and shifts
// =============================================================================

#[test]
fn bitwise_works_on_64_bit() {
    assert_eq!(eval("6 & 3"), Value::I64(2));
    assert_eq!(eval("6 | 3"), Value::I64(7));
    assert_eq!(eval("6 ^ 3"), Value::I64(5));
    assert_eq!(eval("~0"), Value::I64(-1));
}

#[test]
fn shift_family() {
    assert_eq!(eval("1 << 4"), Value::I64(16));
    assert_eq!(eval("-16 >> 2"), Value::I64(-4));
    assert_eq!(eval("-1 >>> 60"), Value::I64(15));
}

// =============================================================================
// 7. matching, starts/ends, containment
// =============================================================================

#[test]
fn regex_match_is_a_full_match() {
    assert_eq!(eval("'abcdef' =~ 'abc.*'"), Value::Bool(true));
    assert_eq!(eval("'abcdef' =~ 'abc'"), Value::Bool(false));
    assert_eq!(eval("'abc' !~ 'xyz'"), Value::Bool(true));
}

#[test]
fn collection_membership_via_match() {
    assert_eq!(eval("2 =~ [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval("5 !~ [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval("2 =~ {1, 2}"), Value::Bool(true));
    // map membership applies to the key set
    assert_eq!(eval("'k' =~ {'k' : 1}"), Value::Bool(true));
    assert_eq!(eval("5 =~ (1..10)"), Value::Bool(true));
}

#[test]
fn starts_with_and_ends_with() {
    assert_eq!(eval("'abcd' =^ 'ab'"), Value::Bool(true));
    assert_eq!(eval("'abcd' !^ 'cd'"), Value::Bool(true));
    assert_eq!(eval("'abcd' =$ 'cd'"), Value::Bool(true));
    assert_eq!(eval("'abcd' !$ 'ab'"), Value::Bool(true));
}

// =============================================================================
// 8. empty / size
// =============================================================================

#[test]
fn empty_operator() {
    assert_eq!(eval("empty(null)"), Value::Bool(true));
    assert_eq!(eval("empty('')"), Value::Bool(true));
    assert_eq!(eval("empty('a')"), Value::Bool(false));
    assert_eq!(eval("empty([])"), Value::Bool(true));
    assert_eq!(eval("empty(0)"), Value::Bool(true));
    // an undefined variable is empty rather than an error
    assert_eq!(eval("empty(nosuchvariable)"), Value::Bool(true));
}

#[test]
fn size_operator() {
    assert_eq!(eval("size('abc')"), Value::I64(3));
    assert_eq!(eval("size([1, 2, 3])"), Value::I64(3));
    assert_eq!(eval("size({'a' : 1, 'b' : 2})"), Value::I64(2));
    assert_eq!(eval("size((1..10))"), Value::I64(10));
}

// =============================================================================
// 9. ranges
// =============================================================================

#[test]
fn singleton_range_has_size_one() {
    assert_eq!(eval("size((4..4))"), Value::I64(1));
}

#[test]
fn ranges_compare_by_bounds() {
    assert_eq!(eval("(1..3) == (1..3)"), Value::Bool(true));
    assert_eq!(eval("(1..3) == (1..4)"), Value::Bool(false));
}

#[test]
fn range_sum_via_loop() {
    assert_eq!(eval("var t = 0; for (var i : 1..10) { t = t + i }; t"), Value::I32(55));
}

#[test]
fn descending_range_iterates_downward() {
    assert_eq!(eval("var s = ''; for (var i : 3..1) { s = s + i }; s"), Value::str("321"));
}

// =============================================================================
// 10. short-circuit and coalescing forms
// =============================================================================

#[test]
fn and_or_short_circuit() {
    // the right side would fail if evaluated
    assert_eq!(eval("false && (1 / 0 == 0)"), Value::Bool(false));
    assert_eq!(eval("true || (1 / 0 == 0)"), Value::Bool(true));
    assert_eq!(eval("true and true"), Value::Bool(true));
    assert_eq!(eval("false or true"), Value::Bool(true));
}

#[test]
fn ternary_and_elvis() {
    assert_eq!(eval("1 < 2 ? 'y' : 'n'"), Value::str("y"));
    assert_eq!(eval("false ?: 42"), Value::I32(42));
    assert_eq!(eval("3 ?: 42"), Value::I32(3));
}

#[test]
fn null_coalescing() {
    assert_eq!(eval("null ?? 42"), Value::I32(42));
    assert_eq!(eval("7 ?? 42"), Value::I32(7));
    // an undefined variable coalesces instead of failing
    assert_eq!(eval("nosuch ?? 'fallback'"), Value::str("fallback"));
}

#[test]
fn unary_minus_preserves_width() {
    assert_eq!(eval("-(3)"), Value::I32(-3));
    assert_eq!(eval("-(2.5)"), Value::F64(-2.5));
}

#[test]
fn not_operator_forms() {
    assert_eq!(eval("!true"), Value::Bool(false));
    assert_eq!(eval("not false"), Value::Bool(true));
}
