//! Traversal helpers and the argument mapper.
//!
//! Traversals are pre-order and descend through every owned child,
//! including negated atoms, cast values, functor arguments, record and
//! branch elements, and the literals of aggregate bodies. Analyses walk
//! the tree with these helpers instead of hand-rolling recursion.
//!
//! `ArgumentMapper` substitutes owned subtrees: a mapper receives each
//! owned argument and returns either the same node or a replacement. A
//! mapper controls its own recursion by calling [`map_children`] on nodes
//! it keeps.

use crate::argument::{Aggregator, Argument, Variable};
use crate::clause::Clause;
use crate::literal::{Atom, Literal};

// ---------------------------------------------------------------------------
// Read-only visitation
// ---------------------------------------------------------------------------

/// Visit every argument node in the clause (head and body), pre-order.
pub fn visit_arguments_in_clause(clause: &Clause, f: &mut impl FnMut(&Argument)) {
    for arg in &clause.head.args {
        visit_arguments(arg, f);
    }
    for lit in &clause.body {
        visit_arguments_in_literal(lit, f);
    }
}

/// Visit every argument node in the literal, pre-order.
pub fn visit_arguments_in_literal(lit: &Literal, f: &mut impl FnMut(&Argument)) {
    match lit {
        Literal::Atom(atom) => {
            for arg in &atom.args {
                visit_arguments(arg, f);
            }
        }
        Literal::Negation(neg) => {
            for arg in &neg.atom.args {
                visit_arguments(arg, f);
            }
        }
        Literal::BinaryConstraint(bc) => {
            visit_arguments(&bc.lhs, f);
            visit_arguments(&bc.rhs, f);
        }
        Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
    }
}

/// Visit the argument and all nested argument nodes, pre-order.
pub fn visit_arguments(arg: &Argument, f: &mut impl FnMut(&Argument)) {
    f(arg);
    match arg {
        Argument::IntrinsicFunctor(functor) => {
            for child in &functor.args {
                visit_arguments(child, f);
            }
        }
        Argument::UserDefinedFunctor(functor) => {
            for child in &functor.args {
                visit_arguments(child, f);
            }
        }
        Argument::TypeCast(cast) => visit_arguments(&cast.value, f),
        Argument::RecordInit(rec) => {
            for child in &rec.args {
                visit_arguments(child, f);
            }
        }
        Argument::BranchInit(branch) => {
            for child in &branch.args {
                visit_arguments(child, f);
            }
        }
        Argument::Aggregator(agg) => {
            if let Some(target) = agg.target() {
                visit_arguments(target, f);
            }
            for lit in &agg.body {
                visit_arguments_in_literal(lit, f);
            }
        }
        Argument::Variable(_)
        | Argument::UnnamedVariable(_)
        | Argument::NumericConstant(_)
        | Argument::StringConstant(_)
        | Argument::NilConstant(_)
        | Argument::Counter(_) => {}
    }
}

/// Visit every atom in the clause: the head, positive and negated body
/// atoms, and atoms nested in aggregate bodies.
pub fn visit_atoms_in_clause(clause: &Clause, f: &mut impl FnMut(&Atom)) {
    f(&clause.head);
    for arg in &clause.head.args {
        visit_atoms_in_argument(arg, f);
    }
    for lit in &clause.body {
        visit_atoms_in_literal(lit, f);
    }
}

pub fn visit_atoms_in_literal(lit: &Literal, f: &mut impl FnMut(&Atom)) {
    match lit {
        Literal::Atom(atom) => {
            f(atom);
            for arg in &atom.args {
                visit_atoms_in_argument(arg, f);
            }
        }
        Literal::Negation(neg) => {
            f(&neg.atom);
            for arg in &neg.atom.args {
                visit_atoms_in_argument(arg, f);
            }
        }
        Literal::BinaryConstraint(bc) => {
            visit_atoms_in_argument(&bc.lhs, f);
            visit_atoms_in_argument(&bc.rhs, f);
        }
        Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
    }
}

fn visit_atoms_in_argument(arg: &Argument, f: &mut impl FnMut(&Atom)) {
    visit_arguments(arg, &mut |nested| {
        if let Argument::Aggregator(agg) = nested {
            // Aggregate bodies are walked by visit_arguments; the atoms
            // themselves are collected here.
            for lit in &agg.body {
                if let Literal::Atom(atom) = lit {
                    f(atom);
                } else if let Literal::Negation(neg) = lit {
                    f(&neg.atom);
                }
            }
        }
    });
}

/// Visit every aggregator in the clause, outermost first.
pub fn visit_aggregators_in_clause(clause: &Clause, f: &mut impl FnMut(&Aggregator)) {
    visit_arguments_in_clause(clause, &mut |arg| {
        if let Argument::Aggregator(agg) = arg {
            f(agg);
        }
    });
}

/// Visit every aggregator nested in the given aggregator, itself included,
/// outermost first.
pub fn visit_aggregators_in_aggregator(agg: &Aggregator, f: &mut impl FnMut(&Aggregator)) {
    f(agg);
    if let Some(target) = agg.target() {
        visit_arguments(target, &mut |arg| {
            if let Argument::Aggregator(inner) = arg {
                f(inner);
            }
        });
    }
    for lit in &agg.body {
        visit_arguments_in_literal(lit, &mut |arg| {
            if let Argument::Aggregator(inner) = arg {
                f(inner);
            }
        });
    }
}

/// Visit every named variable in the clause.
pub fn visit_variables_in_clause(clause: &Clause, f: &mut impl FnMut(&Variable)) {
    visit_arguments_in_clause(clause, &mut |arg| {
        if let Argument::Variable(var) = arg {
            f(var);
        }
    });
}

/// Visit every named variable in the argument subtree.
pub fn visit_variables_in_argument(arg: &Argument, f: &mut impl FnMut(&Variable)) {
    visit_arguments(arg, &mut |nested| {
        if let Argument::Variable(var) = nested {
            f(var);
        }
    });
}

// ---------------------------------------------------------------------------
// Mutable visitation
// ---------------------------------------------------------------------------

/// Visit every named variable in the clause mutably (for renames).
pub fn visit_variables_mut_in_clause(clause: &mut Clause, f: &mut impl FnMut(&mut Variable)) {
    for arg in &mut clause.head.args {
        visit_variables_mut_in_argument(arg, f);
    }
    for lit in &mut clause.body {
        visit_variables_mut_in_literal(lit, f);
    }
}

pub fn visit_variables_mut_in_literal(lit: &mut Literal, f: &mut impl FnMut(&mut Variable)) {
    match lit {
        Literal::Atom(atom) => {
            for arg in &mut atom.args {
                visit_variables_mut_in_argument(arg, f);
            }
        }
        Literal::Negation(neg) => {
            for arg in &mut neg.atom.args {
                visit_variables_mut_in_argument(arg, f);
            }
        }
        Literal::BinaryConstraint(bc) => {
            visit_variables_mut_in_argument(&mut bc.lhs, f);
            visit_variables_mut_in_argument(&mut bc.rhs, f);
        }
        Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
    }
}

pub fn visit_variables_mut_in_argument(arg: &mut Argument, f: &mut impl FnMut(&mut Variable)) {
    match arg {
        Argument::Variable(var) => f(var),
        Argument::IntrinsicFunctor(functor) => {
            for child in &mut functor.args {
                visit_variables_mut_in_argument(child, f);
            }
        }
        Argument::UserDefinedFunctor(functor) => {
            for child in &mut functor.args {
                visit_variables_mut_in_argument(child, f);
            }
        }
        Argument::TypeCast(cast) => visit_variables_mut_in_argument(&mut cast.value, f),
        Argument::RecordInit(rec) => {
            for child in &mut rec.args {
                visit_variables_mut_in_argument(child, f);
            }
        }
        Argument::BranchInit(branch) => {
            for child in &mut branch.args {
                visit_variables_mut_in_argument(child, f);
            }
        }
        Argument::Aggregator(agg) => {
            if let Some(target) = agg.target.as_deref_mut() {
                visit_variables_mut_in_argument(target, f);
            }
            for lit in &mut agg.body {
                visit_variables_mut_in_literal(lit, f);
            }
        }
        Argument::UnnamedVariable(_)
        | Argument::NumericConstant(_)
        | Argument::StringConstant(_)
        | Argument::NilConstant(_)
        | Argument::Counter(_) => {}
    }
}

/// Visit every aggregator in the clause mutably, outermost first.
pub fn visit_aggregators_mut_in_clause(clause: &mut Clause, f: &mut impl FnMut(&mut Aggregator)) {
    for arg in &mut clause.head.args {
        visit_aggregators_mut_in_argument(arg, f);
    }
    for lit in &mut clause.body {
        match lit {
            Literal::Atom(atom) => {
                for arg in &mut atom.args {
                    visit_aggregators_mut_in_argument(arg, f);
                }
            }
            Literal::Negation(neg) => {
                for arg in &mut neg.atom.args {
                    visit_aggregators_mut_in_argument(arg, f);
                }
            }
            Literal::BinaryConstraint(bc) => {
                visit_aggregators_mut_in_argument(&mut bc.lhs, f);
                visit_aggregators_mut_in_argument(&mut bc.rhs, f);
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }
}

pub fn visit_aggregators_mut_in_argument(arg: &mut Argument, f: &mut impl FnMut(&mut Aggregator)) {
    match arg {
        Argument::Aggregator(agg) => {
            f(agg);
            if let Some(target) = agg.target.as_deref_mut() {
                visit_aggregators_mut_in_argument(target, f);
            }
            for lit in &mut agg.body {
                match lit {
                    Literal::Atom(atom) => {
                        for child in &mut atom.args {
                            visit_aggregators_mut_in_argument(child, f);
                        }
                    }
                    Literal::Negation(neg) => {
                        for child in &mut neg.atom.args {
                            visit_aggregators_mut_in_argument(child, f);
                        }
                    }
                    Literal::BinaryConstraint(bc) => {
                        visit_aggregators_mut_in_argument(&mut bc.lhs, f);
                        visit_aggregators_mut_in_argument(&mut bc.rhs, f);
                    }
                    Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
                }
            }
        }
        Argument::IntrinsicFunctor(functor) => {
            for child in &mut functor.args {
                visit_aggregators_mut_in_argument(child, f);
            }
        }
        Argument::UserDefinedFunctor(functor) => {
            for child in &mut functor.args {
                visit_aggregators_mut_in_argument(child, f);
            }
        }
        Argument::TypeCast(cast) => visit_aggregators_mut_in_argument(&mut cast.value, f),
        Argument::RecordInit(rec) => {
            for child in &mut rec.args {
                visit_aggregators_mut_in_argument(child, f);
            }
        }
        Argument::BranchInit(branch) => {
            for child in &mut branch.args {
                visit_aggregators_mut_in_argument(child, f);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Argument mapping
// ---------------------------------------------------------------------------

/// Substitutes owned argument subtrees.
pub trait ArgumentMapper {
    /// Map one owned argument; return the same node or a replacement.
    fn map_argument(&mut self, arg: Argument) -> Argument;
}

/// Apply the mapper to each direct and (through the mapper's recursion)
/// indirect child of the argument, leaving the node itself in place.
pub fn map_children(arg: Argument, mapper: &mut dyn ArgumentMapper) -> Argument {
    match arg {
        Argument::IntrinsicFunctor(mut functor) => {
            functor.args = map_vec(functor.args, mapper);
            Argument::IntrinsicFunctor(functor)
        }
        Argument::UserDefinedFunctor(mut functor) => {
            functor.args = map_vec(functor.args, mapper);
            Argument::UserDefinedFunctor(functor)
        }
        Argument::TypeCast(mut cast) => {
            cast.value = Box::new(mapper.map_argument(*cast.value));
            Argument::TypeCast(cast)
        }
        Argument::RecordInit(mut rec) => {
            rec.args = map_vec(rec.args, mapper);
            Argument::RecordInit(rec)
        }
        Argument::BranchInit(mut branch) => {
            branch.args = map_vec(branch.args, mapper);
            Argument::BranchInit(branch)
        }
        Argument::Aggregator(mut agg) => {
            agg.target = agg.target.map(|t| Box::new(mapper.map_argument(*t)));
            for lit in &mut agg.body {
                apply_to_literal(lit, mapper);
            }
            Argument::Aggregator(agg)
        }
        leaf => leaf,
    }
}

fn map_vec(args: Vec<Argument>, mapper: &mut dyn ArgumentMapper) -> Vec<Argument> {
    args.into_iter()
        .map(|arg| mapper.map_argument(arg))
        .collect()
}

/// Apply the mapper to every argument owned by the literal.
pub fn apply_to_literal(lit: &mut Literal, mapper: &mut dyn ArgumentMapper) {
    match lit {
        Literal::Atom(atom) => {
            let args = std::mem::take(&mut atom.args);
            atom.args = map_vec(args, mapper);
        }
        Literal::Negation(neg) => {
            let args = std::mem::take(&mut neg.atom.args);
            neg.atom.args = map_vec(args, mapper);
        }
        Literal::BinaryConstraint(bc) => {
            let lhs = std::mem::replace(&mut *bc.lhs, Argument::unnamed());
            let rhs = std::mem::replace(&mut *bc.rhs, Argument::unnamed());
            *bc.lhs = mapper.map_argument(lhs);
            *bc.rhs = mapper.map_argument(rhs);
        }
        Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
    }
}

/// Apply the mapper to every argument owned by the clause.
pub fn apply_to_clause(clause: &mut Clause, mapper: &mut dyn ArgumentMapper) {
    let args = std::mem::take(&mut clause.head.args);
    clause.head.args = map_vec(args, mapper);
    for lit in &mut clause.body {
        apply_to_literal(lit, mapper);
    }
}
