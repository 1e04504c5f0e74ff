//! Unary `*` and `&`, and the binary operators that share their
//! tokens.

mod common;

use common::{assert_clean, descriptors, method, run_diagnostics, verify};
use pointer_spacing::Descriptor;

// -----------------------------------------------------------
// Dereference.
// -----------------------------------------------------------

#[test]
fn dereference_canonical() {
    assert_clean(&method("x = *p; y = (*p); z = a[*i]; *p = 1;"));
}

#[test]
fn dereference_followed_by_space() {
    verify(
        &method("x = * p;"),
        &[Descriptor::NotFollowed],
        &method("x = *p;"),
    );
}

#[test]
fn dereference_after_open_delimiter() {
    verify(
        &method("x = ( *p);"),
        &[Descriptor::NotPreceded],
        &method("x = (*p);"),
    );
    verify(
        &method("x = a[ *i];"),
        &[Descriptor::NotPreceded],
        &method("x = a[*i];"),
    );
    verify(
        &method("x = ( * p);"),
        &[Descriptor::NotPreceded, Descriptor::NotFollowed],
        &method("x = (*p);"),
    );
}

#[test]
fn dereference_as_right_operand() {
    assert_clean(&method("x = a * *p;"));
    verify(
        &method("x = a * * p;"),
        &[Descriptor::NotFollowed],
        &method("x = a * *p;"),
    );
}

#[test]
fn dereference_after_cast() {
    assert_clean(&method("x = (int)*p; y = (int) *p;"));
    verify(
        &method("x = (int) * p;"),
        &[Descriptor::NotFollowed],
        &method("x = (int) *p;"),
    );
}

#[test]
fn space_before_dereference_is_free_outside_delimiters() {
    // `=`, `return` and binary operators are followed by a space by
    // convention; only `(` and `[` bind the operator
    assert_clean(&method("x = *p;"));
    assert_clean(&method("x =*p;"));
    assert_clean(&method("return\n            *p;"));
    assert_eq!(
        descriptors(&method("x = ( *p);")),
        vec![Descriptor::NotPreceded]
    );
}

#[test]
fn space_after_dereference_is_reported() {
    // the operator binds to its operand
    assert_eq!(
        descriptors(&method("x = * p;")),
        vec![Descriptor::NotFollowed]
    );
    assert_eq!(
        descriptors(&method("x = *\n            p;")),
        vec![Descriptor::NotFollowed]
    );
}

// -----------------------------------------------------------
// Address-of.
// -----------------------------------------------------------

#[test]
fn space_before_address_of_is_free_outside_delimiters() {
    assert_clean(&method("q = &x;"));
    assert_clean(&method("F(a, &x);"));
    assert_eq!(descriptors(&method("F( &x);")), vec![Descriptor::NotPreceded]);
}

#[test]
fn space_after_address_of_is_reported() {
    assert_eq!(
        descriptors(&method("q = & x;")),
        vec![Descriptor::NotFollowed]
    );
}

#[test]
fn address_of_canonical() {
    assert_clean(&method("int* q = &x; F(&x); var b = (byte*)&x;"));
}

#[test]
fn address_of_followed_by_space() {
    let found = run_diagnostics(&method("int* q = & x;"));
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].message,
        "Access-of symbol '&' must not be followed by whitespace"
    );
    verify(
        &method("int* q = & x;"),
        &[Descriptor::NotFollowed],
        &method("int* q = &x;"),
    );
}

#[test]
fn address_of_after_open_paren() {
    let found = run_diagnostics(&method("F( &x);"));
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].message,
        "Access-of symbol '&' must not be preceded by whitespace"
    );
    verify(
        &method("F( &x);"),
        &[Descriptor::NotPreceded],
        &method("F(&x);"),
    );
}

// -----------------------------------------------------------
// Binary operators are never flagged.
// -----------------------------------------------------------

#[test]
fn multiplication_is_not_checked() {
    assert_clean(&method("x = a * b; y = a*b; z = a  *\n  b; w = (a) * b;"));
}

#[test]
fn bitwise_and_is_not_checked() {
    assert_clean(&method("x = a & b; y = a&b; z = (a)  &  b;"));
}

#[test]
fn other_tokens_are_not_checked() {
    assert_clean(&method("if (a && b) { } x *= 2; y &= 3; p->X = 1;"));
    assert_clean("struct V { public static V operator *(V a, V b) => a; public static V operator &(V a, V b) => a; }");
}

#[test]
fn lambda_bodies_are_checked() {
    assert_clean(&method("Func<int, int> f = v => v * 2;"));
    assert_eq!(
        descriptors(&method("Action f = () => F( *p);")),
        vec![Descriptor::NotPreceded]
    );
}

// -----------------------------------------------------------
// Interpolated strings.
// -----------------------------------------------------------

#[test]
fn interpolation_holes_are_checked() {
    verify(
        &method(r#"s = $"{* p}";"#),
        &[Descriptor::NotFollowed],
        &method(r#"s = $"{*p}";"#),
    );
    verify(
        &method(r#"s = $@"{& x}";"#),
        &[Descriptor::NotFollowed],
        &method(r#"s = $@"{&x}";"#),
    );
    verify(
        &method(r#"s = $"{sizeof(int *)}";"#),
        &[Descriptor::NotPreceded],
        &method(r#"s = $"{sizeof(int*)}";"#),
    );
}

#[test]
fn interpolation_text_is_not_checked() {
    assert_clean(&method(r#"s = $"a * b & c {x * y,5:N0} {{ * p }}";"#));
    assert_clean(&method(r#"s = $"{ *p } and { &x }";"#));
}

#[test]
fn nested_and_raw_interpolations() {
    verify(
        &method(r#"s = $"{F( *p, $"{& q}")}";"#),
        &[Descriptor::NotPreceded, Descriptor::NotFollowed],
        &method(r#"s = $"{F(*p, $"{&q}")}";"#),
    );
    verify(
        &method(r#"s = $$"""{{* p}} {""";"#),
        &[Descriptor::NotFollowed],
        &method(r#"s = $$"""{{*p}} {""";"#),
    );
}

// -----------------------------------------------------------
// Incomplete code.
// -----------------------------------------------------------

#[test]
fn missing_operand_is_skipped() {
    assert_clean(&method("x = *;"));
    assert_clean(&method("x = & ;"));
}

#[test]
fn unterminated_code_still_reports() {
    assert_eq!(
        descriptors("class C { void M() { x = ( *p"),
        vec![Descriptor::NotPreceded]
    );
}
