//! Functional dependencies guard inserts:
//!
//! ```text
//! .decl f(k:number, v:number) choice-domain k
//! f(1, 2). f(1, 3).
//! ```
//!
//! Both facts compile; the guard suppresses the second at runtime.

use strudel_ast::{
    Argument, Atom, Attribute, Clause, FunctionalConstraint, Program, Relation,
};
use strudel_common::span::SrcLocation;
use strudel_driver::compile;

fn loc() -> SrcLocation {
    SrcLocation::unset()
}

#[test]
fn choice_domain_inserts_are_guarded() {
    let mut program = Program::new();
    let mut f = Relation::new(
        "f",
        vec![
            Attribute::new("k", "number", loc()),
            Attribute::new("v", "number", loc()),
        ],
        loc(),
    );
    f.functional_dependencies
        .push(FunctionalConstraint::new(vec!["k".into()], loc()));
    program.add_relation(f);

    program.add_clause(Clause::fact(
        Atom::new("f", vec![Argument::number("1"), Argument::number("2")], loc()),
        loc(),
    ));
    program.add_clause(Clause::fact(
        Atom::new("f", vec![Argument::number("1"), Argument::number("3")], loc()),
        loc(),
    ));

    let outcome = compile(program);
    assert!(outcome.succeeded(), "{}", outcome.report);
    let listing = outcome.ram.unwrap().to_string();

    // both facts are emitted, each guarded on the key column
    assert!(
        listing.contains("INSERT (1, 2) INTO f IF (NOT (1,⊥) ∈ f)"),
        "{listing}"
    );
    assert!(
        listing.contains("INSERT (1, 3) INTO f IF (NOT (1,⊥) ∈ f)"),
        "{listing}"
    );
}

#[test]
fn duplicate_key_sets_collapse_to_one_guard() {
    let mut program = Program::new();
    let mut f = Relation::new(
        "f",
        vec![
            Attribute::new("k", "number", loc()),
            Attribute::new("v", "number", loc()),
        ],
        loc(),
    );
    f.functional_dependencies
        .push(FunctionalConstraint::new(vec!["k".into()], loc()));
    f.functional_dependencies
        .push(FunctionalConstraint::new(vec!["k".into()], loc()));
    program.add_relation(f);
    program.add_clause(Clause::fact(
        Atom::new("f", vec![Argument::number("1"), Argument::number("2")], loc()),
        loc(),
    ));

    let outcome = compile(program);
    assert!(outcome.succeeded(), "{}", outcome.report);
    let listing = outcome.ram.unwrap().to_string();

    // the equivalent second dependency adds no second guard term
    let guards = listing.matches("(NOT (1,⊥) ∈ f)").count();
    assert_eq!(guards, 1, "{listing}");
}
