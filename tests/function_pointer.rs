//! Function pointer types: the marker after `delegate` and pointer
//! types in the parameter list.

mod common;

use common::{assert_clean, class, descriptors, method, run_diagnostics, verify};
use pointer_spacing::{Descriptor, Position, Severity, Side};

// -----------------------------------------------------------
// Top-level declarations.
// -----------------------------------------------------------

#[test]
fn valid_spacing() {
    assert_clean("unsafe delegate*<int*> FuncPtr;");
}

#[test]
fn parameter_preceded_by_space() {
    let found = run_diagnostics("unsafe delegate*<int *> FuncPtr;");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].descriptor, Descriptor::NotPreceded);
    assert_eq!(found[0].side, Side::Before);
    assert_eq!(found[0].position, Position { line: 1, column: 21 });
    assert_eq!(found[0].token_span.start, 21);
    assert_eq!(
        found[0].message,
        "Dereference symbol '*' must not be preceded by whitespace"
    );
    assert_eq!(found[0].severity, Severity::Warning);
    assert_eq!(found[0].rule_id, "SA1023");
    verify(
        "unsafe delegate*<int *> FuncPtr;",
        &[Descriptor::NotPreceded],
        "unsafe delegate*<int*> FuncPtr;",
    );
}

#[test]
fn parameter_followed_by_space() {
    let found = run_diagnostics("unsafe delegate*<int* > FuncPtr;");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].position, Position { line: 1, column: 22 });
    verify(
        "unsafe delegate*<int* > FuncPtr;",
        &[Descriptor::NotFollowed],
        "unsafe delegate*<int*> FuncPtr;",
    );
}

#[test]
fn marker_preceded_by_space() {
    let found = run_diagnostics("unsafe delegate *<int*> FuncPtr;");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].position, Position { line: 1, column: 16 });
    verify(
        "unsafe delegate *<int*> FuncPtr;",
        &[Descriptor::NotPreceded],
        "unsafe delegate*<int*> FuncPtr;",
    );
}

#[test]
fn calling_convention_valid_spacing() {
    assert_clean("unsafe delegate* managed<int*> FuncPtr;");
}

#[test]
fn calling_convention_missing_space() {
    let found = run_diagnostics("unsafe delegate*managed<int*> FuncPtr;");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].side, Side::After);
    assert!(found[0].location.is_empty());
    assert_eq!(found[0].position, Position { line: 1, column: 17 });
    assert_eq!(
        found[0].message,
        "Dereference symbol '*' must be followed by whitespace"
    );
    verify(
        "unsafe delegate*managed<int*> FuncPtr;",
        &[Descriptor::Followed],
        "unsafe delegate* managed<int*> FuncPtr;",
    );
}

// -----------------------------------------------------------
// Inside a class, as members.
// -----------------------------------------------------------

#[test]
fn member_valid_spacing() {
    assert_clean(&class("unsafe delegate*<int*> FuncPtr;"));
    assert_clean(&class("unsafe delegate* managed<int*> FuncPtr;"));
}

#[test]
fn member_parameter_spacing() {
    verify(
        &class("unsafe delegate*<int *> FuncPtr;"),
        &[Descriptor::NotPreceded],
        &class("unsafe delegate*<int*> FuncPtr;"),
    );
    verify(
        &class("unsafe delegate*<int* > FuncPtr;"),
        &[Descriptor::NotFollowed],
        &class("unsafe delegate*<int*> FuncPtr;"),
    );
}

#[test]
fn member_marker_spacing() {
    verify(
        &class("unsafe delegate *<int*> FuncPtr;"),
        &[Descriptor::NotPreceded],
        &class("unsafe delegate*<int*> FuncPtr;"),
    );
    verify(
        &class("unsafe delegate* <int*> FuncPtr;"),
        &[Descriptor::NotFollowed],
        &class("unsafe delegate*<int*> FuncPtr;"),
    );
}

#[test]
fn member_calling_convention_spacing() {
    verify(
        &class("unsafe delegate * managed<int*> FuncPtr;"),
        &[Descriptor::NotPreceded],
        &class("unsafe delegate* managed<int*> FuncPtr;"),
    );
    verify(
        &class("unsafe delegate*managed<int*> FuncPtr;"),
        &[Descriptor::Followed],
        &class("unsafe delegate* managed<int*> FuncPtr;"),
    );
}

// -----------------------------------------------------------
// Beyond the basic shapes.
// -----------------------------------------------------------

#[test]
fn required_space_is_exactly_one() {
    verify(
        "unsafe delegate*   unmanaged<void> F;",
        &[Descriptor::Followed],
        "unsafe delegate* unmanaged<void> F;",
    );
    verify(
        "unsafe delegate*\n    unmanaged<void> F;",
        &[Descriptor::Followed],
        "unsafe delegate* unmanaged<void> F;",
    );
}

#[test]
fn unmanaged_calling_convention_list() {
    assert_clean("unsafe delegate* unmanaged[Cdecl, SuppressGCTransition]<int*, void> F;");
    verify(
        "unsafe delegate*unmanaged[Stdcall]<int *, void> F;",
        &[Descriptor::Followed, Descriptor::NotPreceded],
        "unsafe delegate* unmanaged[Stdcall]<int*, void> F;",
    );
}

#[test]
fn nested_function_pointers() {
    assert_clean("unsafe delegate*<delegate*<int*, void>, void> F;");
    verify(
        "unsafe delegate*<delegate *<int, int* >, void> F;",
        &[Descriptor::NotPreceded, Descriptor::NotFollowed],
        "unsafe delegate*<delegate*<int, int*>, void> F;",
    );
}

#[test]
fn both_sides_of_one_marker() {
    verify(
        "unsafe delegate * <void> F;",
        &[Descriptor::NotPreceded, Descriptor::NotFollowed],
        "unsafe delegate*<void> F;",
    );
}

#[test]
fn parameter_modifiers() {
    assert_clean("unsafe delegate*<ref int, in int*, out byte*, void> F;");
    assert_eq!(
        descriptors("unsafe delegate*<ref int *, void> F;"),
        vec![Descriptor::NotPreceded]
    );
}

#[test]
fn function_pointer_in_method_body() {
    assert_clean(&method("delegate*<int, void> f = &Callback; f(42);"));
    assert_clean(&method("var g = (delegate* unmanaged<int, int>)p;"));
    verify(
        &method("var g = (delegate *unmanaged<int, int>)p;"),
        &[Descriptor::NotPreceded, Descriptor::Followed],
        &method("var g = (delegate* unmanaged<int, int>)p;"),
    );
}

#[test]
fn invalid_calling_convention_still_checked() {
    assert_eq!(
        descriptors("unsafe delegate*cdecl<void> F;"),
        vec![Descriptor::Followed]
    );
}
