//! Generator naming.
//!
//! A *generator* (an aggregate expression or a multi-result functor such
//! as `range`) produces values rather than matching them. Later passes
//! assume every generator occurrence has the shape `v = <generator>` in
//! a clause body; this pass extracts any other occurrence into a fresh
//! `@generator_N` variable bound by an equality constraint.
//!
//! Generators nested inside aggregate bodies stay where they are: their
//! scope is the aggregate body, not the clause.

use strudel_ast::visit::{apply_to_literal, map_children, ArgumentMapper};
use strudel_ast::{Argument, Clause, Literal, TranslationUnit};
use strudel_solver::functor::is_multi_result;

use crate::Transform;

pub struct NormalizeGenerators;

struct ExtractGenerators {
    count: usize,
    used: rustc_hash::FxHashSet<String>,
    extracted: Vec<(String, Argument)>,
}

impl ExtractGenerators {
    fn is_generator(arg: &Argument) -> bool {
        match arg {
            Argument::Aggregator(_) => true,
            Argument::IntrinsicFunctor(functor) => is_multi_result(functor.op),
            _ => false,
        }
    }

    /// A name no earlier extraction (including one from a previous
    /// application of this pass) has claimed.
    fn fresh_name(&mut self) -> String {
        loop {
            let name = format!("@generator_{}", self.count);
            self.count += 1;
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }
}

impl ArgumentMapper for ExtractGenerators {
    fn map_argument(&mut self, arg: Argument) -> Argument {
        if Self::is_generator(&arg) {
            let name = self.fresh_name();
            self.extracted.push((name.clone(), arg));
            return Argument::var(name);
        }
        // do not descend into aggregate bodies; their generators are
        // scoped to the aggregate
        match arg {
            Argument::Aggregator(_) => arg,
            other => map_children(other, self),
        }
    }
}

/// Whether the literal is already of the normalized `v = <generator>`
/// shape.
fn is_normalized_binding(lit: &Literal) -> bool {
    let Literal::BinaryConstraint(bc) = lit else {
        return false;
    };
    if bc.op != strudel_ast::ConstraintOp::Eq {
        return false;
    }
    match (&*bc.lhs, &*bc.rhs) {
        (Argument::Variable(_), rhs) if ExtractGenerators::is_generator(rhs) => true,
        (lhs, Argument::Variable(_)) if ExtractGenerators::is_generator(lhs) => true,
        _ => false,
    }
}

fn normalize_clause(clause: &mut Clause, counter: &mut usize) -> bool {
    let mut used = rustc_hash::FxHashSet::default();
    strudel_ast::visit::visit_variables_in_clause(clause, &mut |var| {
        used.insert(var.name.clone());
    });
    let mut extractor = ExtractGenerators {
        count: *counter,
        used,
        extracted: Vec::new(),
    };

    // head arguments never host generators
    let head_args = std::mem::take(&mut clause.head.args);
    clause.head.args = head_args
        .into_iter()
        .map(|arg| extractor.map_argument(arg))
        .collect();

    for lit in &mut clause.body {
        if is_normalized_binding(lit) {
            continue;
        }
        apply_to_literal(lit, &mut extractor);
    }

    *counter = extractor.count;
    let changed = !extractor.extracted.is_empty();
    for (name, generator) in extractor.extracted {
        clause
            .body
            .push(Literal::eq(Argument::var(name), generator));
    }
    changed
}

impl Transform for NormalizeGenerators {
    fn name(&self) -> &'static str {
        "normalize-generators"
    }

    fn apply(&mut self, tu: &mut TranslationUnit) -> bool {
        let mut changed = false;
        let mut counter = 0usize;
        for clause in &mut tu.program.clauses {
            changed |= normalize_clause(clause, &mut counter);
        }
        changed
    }
}
