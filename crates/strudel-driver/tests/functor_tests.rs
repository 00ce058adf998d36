//! End-to-end lowering of intrinsic functors: `ord` over non-symbol
//! arguments, and the `range`/`urange`/`frange` generator family keeping
//! its surface keyword all the way into the RAM listing.

use strudel_ast::{
    Argument, Atom, Attribute, Clause, Directive, DirectiveKind, IntrinsicFunctor, IntrinsicOp,
    Literal, Program, Relation,
};
use strudel_common::span::SrcLocation;
use strudel_driver::compile;

fn loc() -> SrcLocation {
    SrcLocation::unset()
}

fn relation(name: &str, attrs: &[(&str, &str)]) -> Relation {
    Relation::new(
        name,
        attrs
            .iter()
            .map(|(attr, ty)| Attribute::new(*attr, *ty, loc()))
            .collect(),
        loc(),
    )
}

/// ```text
/// .decl n(x:number)  .input n
/// .decl out(y:number)  .output out
/// out(ord(x)) :- n(x).
/// ```
///
/// `ord` maps a value of any kind to its ordinal; a signed argument must
/// not be rejected as having no overload.
#[test]
fn ord_accepts_a_number_argument() {
    let mut program = Program::new();
    program.add_relation(relation("n", &[("x", "number")]));
    program.add_relation(relation("out", &[("y", "number")]));
    program
        .directives
        .push(Directive::new(DirectiveKind::Input, "n", loc()));
    program
        .directives
        .push(Directive::new(DirectiveKind::Output, "out", loc()));

    let ord = Argument::IntrinsicFunctor(IntrinsicFunctor::new(
        IntrinsicOp::Ord,
        vec![Argument::var("x")],
        loc(),
    ));
    program.add_clause(Clause::new(
        Atom::new("out", vec![ord], loc()),
        vec![Literal::Atom(Atom::new("n", vec![Argument::var("x")], loc()))],
        loc(),
    ));

    let outcome = compile(program);
    assert!(outcome.succeeded(), "{}", outcome.report);
    assert!(!outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.primary.message.contains("overload")));

    let listing = outcome.ram.unwrap().to_string();
    assert!(listing.contains("INSERT (ord(t0.0)) INTO out"), "{listing}");
}

/// ```text
/// .decl u(v:unsigned)  .output u
/// u(v) :- v = urange(1, 5).
/// ```
///
/// The constants `1` and `5` parse under every numeric kind; the surface
/// keyword must still lower to `URANGE`, never canonicalize to the plain
/// signed `RANGE`.
#[test]
fn urange_keeps_its_keyword_with_ambiguous_constants() {
    let mut program = Program::new();
    program.add_relation(relation("u", &[("v", "unsigned")]));
    program
        .directives
        .push(Directive::new(DirectiveKind::Output, "u", loc()));

    let generator = Argument::IntrinsicFunctor(IntrinsicFunctor::new(
        IntrinsicOp::URange,
        vec![Argument::number("1"), Argument::number("5")],
        loc(),
    ));
    program.add_clause(Clause::new(
        Atom::new("u", vec![Argument::var("v")], loc()),
        vec![Literal::eq(Argument::var("v"), generator)],
        loc(),
    ));

    let outcome = compile(program);
    assert!(outcome.succeeded(), "{}", outcome.report);

    let listing = outcome.ram.unwrap().to_string();
    assert!(listing.contains("URANGE(1, 5) INTO t0"), "{listing}");
    assert!(!listing.contains(" RANGE("), "{listing}");
    assert!(listing.contains("INSERT (t0.0) INTO u"), "{listing}");
}

/// ```text
/// .decl f(v:float)  .output f
/// f(v) :- v = frange(0.0, 1.0, 0.25).
/// ```
#[test]
fn frange_lowers_to_the_float_generator() {
    let mut program = Program::new();
    program.add_relation(relation("f", &[("v", "float")]));
    program
        .directives
        .push(Directive::new(DirectiveKind::Output, "f", loc()));

    let generator = Argument::IntrinsicFunctor(IntrinsicFunctor::new(
        IntrinsicOp::FRange,
        vec![
            Argument::number("0.0"),
            Argument::number("1.0"),
            Argument::number("0.25"),
        ],
        loc(),
    ));
    program.add_clause(Clause::new(
        Atom::new("f", vec![Argument::var("v")], loc()),
        vec![Literal::eq(Argument::var("v"), generator)],
        loc(),
    ));

    let outcome = compile(program);
    assert!(outcome.succeeded(), "{}", outcome.report);

    let listing = outcome.ram.unwrap().to_string();
    assert!(listing.contains("FRANGE(0, 1, 0.25) INTO t0"), "{listing}");
    assert!(listing.contains("INSERT (t0.0) INTO f"), "{listing}");
}
