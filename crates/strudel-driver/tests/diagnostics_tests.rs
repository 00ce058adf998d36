//! Diagnostic scenarios: unstratifiable programs, invalid type
//! declarations, and the error/warning exit policy.

use strudel_ast::{
    Argument, Atom, Attribute, Clause, Directive, DirectiveKind, Literal, Negation, Program,
    Relation, TypeDeclaration,
};
use strudel_common::diagnostics::Severity;
use strudel_common::span::{Position, SrcLocation};
use strudel_driver::compile;

fn loc() -> SrcLocation {
    SrcLocation::unset()
}

fn unary_relation(name: &str) -> Relation {
    Relation::new(name, vec![Attribute::new("x", "number", loc())], loc())
}

/// ```text
/// .decl a(x:number)  .decl b(x:number)
/// a(x) :- b(x).
/// b(x) :- !a(x), dom(x).
/// .decl dom(x:number)  .input dom
/// ```
#[test]
fn negation_cycle_cannot_be_stratified() {
    let mut program = Program::new();
    program.add_relation(unary_relation("a"));
    program.add_relation(unary_relation("b"));
    program.add_relation(unary_relation("dom"));
    program
        .directives
        .push(Directive::new(DirectiveKind::Input, "dom", loc()));

    program.add_clause(Clause::new(
        Atom::new("a", vec![Argument::var("x")], loc()),
        vec![Literal::Atom(Atom::new("b", vec![Argument::var("x")], loc()))],
        loc(),
    ));
    let negation_loc = SrcLocation::new("s4.dl", Position::new(3, 9), Position::new(3, 14));
    program.add_clause(Clause::new(
        Atom::new("b", vec![Argument::var("x")], loc()),
        vec![
            Literal::Negation(Negation::new(
                Atom::new("a", vec![Argument::var("x")], loc()),
                negation_loc.clone(),
            )),
            Literal::Atom(Atom::new("dom", vec![Argument::var("x")], loc())),
        ],
        loc(),
    ));

    let outcome = compile(program);
    assert!(!outcome.succeeded());

    let diagnostic = outcome
        .report
        .diagnostics()
        .iter()
        .find(|d| d.primary.message.contains("Unable to stratify relation(s)"))
        .expect("stratification error");
    assert!(diagnostic.primary.message.contains("a"));
    assert!(diagnostic.primary.message.contains("b"));
    // the related note points at the offending negation
    assert_eq!(diagnostic.related.len(), 1);
    assert_eq!(diagnostic.related[0].location, negation_loc);
}

/// `.type U = number | symbol`
#[test]
fn mixed_primitive_union_is_reported() {
    let mut program = Program::new();
    program.types.push(TypeDeclaration::Union {
        name: "U".into(),
        elements: vec!["number".into(), "symbol".into()],
        loc: loc(),
    });

    let outcome = compile(program);
    assert!(!outcome.succeeded());
    assert!(outcome.report.diagnostics().iter().any(|d| d.primary.message
        == "Union type U is defined over {number, symbol} (multiple primitive types in union)"));
}

#[test]
fn warnings_alone_do_not_block_translation() {
    let mut program = Program::new();
    program.add_relation(unary_relation("p"));
    program.add_relation(unary_relation("q"));
    program
        .directives
        .push(Directive::new(DirectiveKind::Input, "q", loc()));
    program
        .directives
        .push(Directive::new(DirectiveKind::Output, "p", loc()));
    // p(x) :- q(x), q(lonely).   ("lonely" occurs once -> warning)
    program.add_clause(Clause::new(
        Atom::new("p", vec![Argument::var("x")], loc()),
        vec![
            Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc())),
            Literal::Atom(Atom::new("q", vec![Argument::var("lonely")], loc())),
        ],
        loc(),
    ));

    let outcome = compile(program);
    assert!(outcome.succeeded(), "{}", outcome.report);
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.severity == Severity::Warning
            && d.primary.message.contains("Variable lonely only occurs once")));
}

#[test]
fn ungrounded_variables_block_translation() {
    let mut program = Program::new();
    program.add_relation(unary_relation("p"));
    program.add_relation(unary_relation("q"));
    // p(x) :- !q(x).
    program.add_clause(Clause::new(
        Atom::new("p", vec![Argument::var("x")], loc()),
        vec![Literal::Negation(Negation::new(
            Atom::new("q", vec![Argument::var("x")], loc()),
            loc(),
        ))],
        loc(),
    ));

    let outcome = compile(program);
    assert!(!outcome.succeeded());
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.primary.message.contains("Ungrounded variable x")));
}

#[test]
fn type_errors_skip_argument_checking_but_still_report() {
    // .type A <: B  with B undefined: declaration checks fail, and the
    // clause-level type checks are skipped without a crash
    let mut program = Program::new();
    program.types.push(TypeDeclaration::Subset {
        name: "A".into(),
        base: "NoSuchType".into(),
        loc: loc(),
    });
    program.add_relation(unary_relation("p"));
    program.add_clause(Clause::fact(
        Atom::new("p", vec![Argument::number("1")], loc()),
        loc(),
    ));

    let outcome = compile(program);
    assert!(!outcome.succeeded());
    assert!(outcome
        .report
        .diagnostics()
        .iter()
        .any(|d| d.primary.message.contains("Undefined base type NoSuchType")));
}
