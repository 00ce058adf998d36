//! The type checker.
//!
//! Two halves with a checkpoint between them: declaration checks always
//! run; argument typing runs only when every type declaration was valid
//! (the driver enforces this), since the inferred sets are meaningless
//! otherwise.

use rustc_hash::FxHashSet;

use strudel_ast::visit::visit_variables_in_clause;
use strudel_ast::{
    Argument, Atom, Clause, Literal, NumericKind, Program, QualifiedName, TypeDeclaration,
};
use strudel_common::diagnostics::ErrorReport;
use strudel_common::numeric;
use strudel_common::options::Options;
use strudel_solver::functor::builtin_overloads;
use strudel_solver::TypeAnalysis;
use strudel_types::{Kind, TypeEnvironmentAnalysis, TypeId, TypeNode, TypeSet};

pub struct TypeChecker<'a> {
    pub program: &'a Program,
    pub env_analysis: &'a TypeEnvironmentAnalysis,
    pub types: &'a TypeAnalysis,
    pub options: &'a Options,
}

impl TypeChecker<'_> {
    /// Validate the type declarations. Returns whether all were valid;
    /// argument checking is meaningless otherwise.
    pub fn check_declarations(
        program: &Program,
        env_analysis: &TypeEnvironmentAnalysis,
        report: &mut ErrorReport,
    ) -> bool {
        let before = report.error_count();
        let env = env_analysis.env();

        let declared = |name: &QualifiedName| {
            env.is_type(name) || program.types.iter().any(|decl| decl.name() == name)
        };

        let mut branch_owners: std::collections::BTreeMap<&str, &QualifiedName> =
            std::collections::BTreeMap::new();

        for decl in &program.types {
            // the four primitives and their constant roots are reserved
            if env
                .primitive_types()
                .clone()
                .iter()
                .any(|ty| env.name(ty) == decl.name())
            {
                report.add_error("Redefinition of the predefined type", decl.loc().clone());
                continue;
            }

            if env_analysis.is_cyclic(decl.name()) {
                report.add_error(
                    format!("Infinite descent in the definition of type {}", decl.name()),
                    decl.loc().clone(),
                );
                continue;
            }

            match decl {
                TypeDeclaration::Subset { name, base, loc } => {
                    if !declared(base) {
                        report.add_error(
                            format!("Undefined base type {base} in definition of type {name}"),
                            loc.clone(),
                        );
                        continue;
                    }
                    match env.get_type(base).map(|id| env.node(id)) {
                        Some(TypeNode::Union { .. }) => {
                            report.add_error(
                                format!("Subset type {name} can't be derived from union {base}"),
                                loc.clone(),
                            );
                        }
                        Some(TypeNode::Record { .. }) => {
                            report.add_error(
                                format!(
                                    "Subset type {name} can't be derived from record type {base}"
                                ),
                                loc.clone(),
                            );
                        }
                        Some(TypeNode::Adt { .. }) => {
                            report.add_error(
                                format!("Subset type {name} can't be derived from ADT {base}"),
                                loc.clone(),
                            );
                        }
                        _ => {}
                    }
                }
                TypeDeclaration::Union {
                    name,
                    elements,
                    loc,
                } => {
                    for element in elements {
                        if !declared(element) {
                            report.add_error(
                                format!(
                                    "Undefined type {element} in definition of union type {name}"
                                ),
                                loc.clone(),
                            );
                        } else if let Some(id) = env.get_type(element) {
                            if matches!(
                                env.node(id),
                                TypeNode::Record { .. } | TypeNode::Adt { .. }
                            ) {
                                report.add_error(
                                    format!(
                                        "Union type {name} contains the non-primitive type \
                                         {element}"
                                    ),
                                    loc.clone(),
                                );
                            }
                        }
                    }
                    // all elements must root in one primitive kind
                    if let Some(primitives) = env_analysis.primitive_types_in_union(name) {
                        if primitives.len() > 1 {
                            let listed: Vec<String> =
                                primitives.iter().map(|p| p.to_string()).collect();
                            report.add_error(
                                format!(
                                    "Union type {name} is defined over {{{}}} (multiple primitive \
                                     types in union)",
                                    listed.join(", ")
                                ),
                                loc.clone(),
                            );
                        }
                    }
                }
                TypeDeclaration::Record { name, fields, loc } => {
                    let mut seen: FxHashSet<&str> = FxHashSet::default();
                    for field in fields {
                        if !declared(&field.type_name) {
                            report.add_error(
                                format!(
                                    "Undefined type {} in definition of field {}",
                                    field.type_name, field.name
                                ),
                                field.loc.clone(),
                            );
                        }
                        if !seen.insert(&field.name) {
                            report.add_error(
                                format!(
                                    "Doubly defined field name {} in definition of type {name}",
                                    field.name
                                ),
                                field.loc.clone(),
                            );
                        }
                    }
                    let _ = loc;
                }
                TypeDeclaration::Adt { name, branches, loc } => {
                    for branch in branches {
                        match branch_owners.get(branch.constructor.as_str()) {
                            Some(_) => {
                                report.add_error(
                                    format!(
                                        "Doubly defined branch {} in definition of type {name}",
                                        branch.constructor
                                    ),
                                    branch.loc.clone(),
                                );
                            }
                            None => {
                                branch_owners.insert(&branch.constructor, name);
                            }
                        }
                        for field in &branch.fields {
                            if !declared(&field.type_name) {
                                report.add_error(
                                    format!(
                                        "Undefined type {} in definition of branch {}",
                                        field.type_name, branch.constructor
                                    ),
                                    field.loc.clone(),
                                );
                            }
                        }
                    }
                    let _ = loc;
                }
            }
        }

        report.error_count() == before
    }

    /// Check the typing of every clause argument against the inference
    /// results.
    pub fn check_arguments(&self, report: &mut ErrorReport) {
        // a functor declaration reaching into user-defined types needs
        // evaluation state on the implementation side
        for decl in &self.program.functors {
            if decl.stateful {
                continue;
            }
            let env = self.env_analysis.env();
            let mut attrs: Vec<&strudel_ast::Attribute> = decl.params.iter().collect();
            attrs.push(&decl.return_type);
            for attr in attrs {
                let Some(ty) = env.get_type(&attr.type_name) else {
                    continue;
                };
                if matches!(env.node(ty), TypeNode::Record { .. } | TypeNode::Adt { .. }) {
                    report.add_error(
                        "Functors which are not stateful cannot use UDTs",
                        attr.loc.clone(),
                    );
                }
            }
        }

        for clause in &self.program.clauses {
            self.check_clause(clause, report);
        }
    }

    fn check_clause(&self, clause: &Clause, report: &mut ErrorReport) {
        self.check_atom_typing(&clause.head, true, report);
        for lit in &clause.body {
            self.check_literal(lit, report);
        }

        // every variable must have a deducible type
        let mut reported: FxHashSet<String> = FxHashSet::default();
        visit_variables_in_clause(clause, &mut |var| {
            if self.types.types(var.id).is_empty() && reported.insert(var.name.clone()) {
                report.add_error(
                    format!("Unable to deduce type for variable {}", var.name),
                    var.loc.clone(),
                );
            }
        });

        // per-argument checks over the whole clause
        for arg in &clause.head.args {
            self.check_argument(arg, report);
        }
        for lit in &clause.body {
            self.check_literal_arguments(lit, report);
        }
    }

    fn check_literal(&self, lit: &Literal, report: &mut ErrorReport) {
        match lit {
            Literal::Atom(atom) => self.check_atom_typing(atom, false, report),
            Literal::Negation(neg) => self.check_atom_typing(&neg.atom, true, report),
            Literal::BinaryConstraint(bc) => {
                if bc.op.is_ordered() {
                    let env = self.env_analysis.env();
                    let lhs = self.types.types(bc.lhs.id());
                    let rhs = self.types.types(bc.rhs.id());
                    if lhs.is_empty() || rhs.is_empty() {
                        report.add_error("Cannot compare different types", bc.loc.clone());
                    } else {
                        // an ordered comparison needs one orderable
                        // primitive kind on both sides
                        for side in [&lhs, &rhs] {
                            if !side.is_all() && !env.set_is_orderable(side) {
                                report.add_error(
                                    "Cannot compare values of unorderable types",
                                    bc.loc.clone(),
                                );
                            }
                        }
                    }
                }
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }

    fn check_literal_arguments(&self, lit: &Literal, report: &mut ErrorReport) {
        match lit {
            Literal::Atom(atom) => {
                for arg in &atom.args {
                    self.check_argument(arg, report);
                }
            }
            Literal::Negation(neg) => {
                for arg in &neg.atom.args {
                    self.check_argument(arg, report);
                }
            }
            Literal::BinaryConstraint(bc) => {
                self.check_argument(&bc.lhs, report);
                self.check_argument(&bc.rhs, report);
            }
            Literal::BooleanConstraint(_) | Literal::FunctionalConstraint(_) => {}
        }
    }

    /// Check an atom's argument types against its declared attribute
    /// types. Sinks (the head and negated atoms) only require the
    /// constant-kind root to agree; the `legacy` option drops even that.
    fn check_atom_typing(&self, atom: &Atom, sink: bool, report: &mut ErrorReport) {
        let env = self.env_analysis.env();
        let Some(relation) = self.program.relation(&atom.name) else {
            return; // reported by the semantic checker
        };
        if relation.arity() != atom.arity() {
            return;
        }
        for (arg, attribute) in atom.args.iter().zip(&relation.attributes) {
            let Some(declared) = env.get_type(&attribute.type_name) else {
                continue;
            };
            let inferred = self.types.types(arg.id());
            if inferred.is_all() || inferred.is_empty() {
                continue; // reported elsewhere
            }
            if sink {
                if self.options.legacy {
                    continue;
                }
                let declared_kind = env.kind_of(declared);
                let agrees = inferred.iter().all(|t| env.kind_of(t) == declared_kind);
                if !agrees {
                    report.add_error(
                        format!(
                            "Argument of atom {} does not match the kind of attribute {} \
                             (declared {})",
                            atom.name, attribute.name, attribute.type_name
                        ),
                        arg.loc().clone(),
                    );
                }
            } else {
                let subtype = inferred.iter().all(|t| env.is_subtype(t, declared));
                if !subtype {
                    report.add_error(
                        format!(
                            "Argument is not a subtype of attribute {} (declared {})",
                            attribute.name, attribute.type_name
                        ),
                        arg.loc().clone(),
                    );
                }
            }
        }
    }

    fn check_argument(&self, arg: &Argument, report: &mut ErrorReport) {
        let env = self.env_analysis.env();
        match arg {
            Argument::NumericConstant(constant) => {
                let Some(kind) = self.types.numeric_kind(constant.id) else {
                    report.add_error(
                        "Ambiguous constant (unable to deduce type)",
                        constant.loc.clone(),
                    );
                    return;
                };
                let parses = match kind {
                    NumericKind::Signed => numeric::parse_ram_signed(&constant.lexeme).is_some(),
                    NumericKind::Unsigned => {
                        numeric::parse_ram_unsigned(&constant.lexeme).is_some()
                    }
                    NumericKind::Float => numeric::parse_ram_float(&constant.lexeme).is_some(),
                };
                if !parses {
                    let label = match kind {
                        NumericKind::Signed => "Number",
                        NumericKind::Unsigned => "Unsigned",
                        NumericKind::Float => "Float",
                    };
                    report.add_error(
                        format!("{label} constant (type mismatch)"),
                        constant.loc.clone(),
                    );
                }
            }
            Argument::StringConstant(constant) => {
                let types = self.types.types(constant.id);
                if !env.set_is_of_kind(&types, Kind::Symbol) {
                    report.add_error("Symbol constant (type mismatch)", constant.loc.clone());
                }
            }
            Argument::NilConstant(constant) => {
                let types = self.types.types(constant.id);
                if !types.is_all() && !env.set_is_of_kind(&types, Kind::Record) {
                    report.add_error("Nil constant used as a non-record", constant.loc.clone());
                }
            }
            Argument::RecordInit(rec) => {
                for child in &rec.args {
                    self.check_argument(child, report);
                }
                let types = self.types.types(rec.id);
                let record_type = self.unique_record_type(&types);
                match record_type {
                    None => report.add_error("Ambiguous record", rec.loc.clone()),
                    Some(ty) => {
                        let TypeNode::Record { fields } = env.node(ty) else {
                            return;
                        };
                        if fields.len() != rec.args.len() {
                            report.add_error(
                                "Wrong number of arguments given to record",
                                rec.loc.clone(),
                            );
                        }
                    }
                }
            }
            Argument::BranchInit(branch) => {
                for child in &branch.args {
                    self.check_argument(child, report);
                }
                let Some(adt) = self.types.branch_type(&branch.constructor) else {
                    report.add_error("Undeclared branch", branch.loc.clone());
                    return;
                };
                let Some(field_types) = env.branch_field_types(adt, &branch.constructor) else {
                    report.add_error("Undeclared branch", branch.loc.clone());
                    return;
                };
                if field_types.len() != branch.args.len() {
                    report.add_error(
                        format!(
                            "Invalid arity, the declared arity of {} is {}",
                            branch.constructor,
                            field_types.len()
                        ),
                        branch.loc.clone(),
                    );
                    return;
                }
                let field_types: Vec<TypeId> = field_types.to_vec();
                for (child, &declared) in branch.args.iter().zip(&field_types) {
                    let inferred = self.types.types(child.id());
                    if inferred.is_all() || inferred.is_empty() {
                        continue;
                    }
                    if !inferred.iter().all(|t| env.is_subtype(t, declared)) {
                        report.add_error(
                            "Branch argument's type doesn't match its declared type",
                            child.loc().clone(),
                        );
                    }
                }
            }
            Argument::TypeCast(cast) => {
                self.check_argument(&cast.value, report);
                if self.types.types(cast.value.id()).is_empty() {
                    report.add_error(
                        "Unable to deduce type of the argument (cast)",
                        cast.loc.clone(),
                    );
                }
            }
            Argument::IntrinsicFunctor(functor) => {
                for child in &functor.args {
                    self.check_argument(child, report);
                }
                if !self.types.has_valid_intrinsic(functor.id) {
                    let arity_matches = builtin_overloads(functor.op)
                        .iter()
                        .any(|info| info.variadic || info.params.len() == functor.args.len());
                    if arity_matches {
                        report.add_error("no valid overloads", functor.loc.clone());
                    } else {
                        report.add_error("invalid overload (arity mismatch)", functor.loc.clone());
                    }
                }
            }
            Argument::UserDefinedFunctor(functor) => {
                for child in &functor.args {
                    self.check_argument(child, report);
                }
                if let Some(decl) = self.program.functor(&functor.name) {
                    if decl.arity() != functor.args.len() {
                        report.add_error(
                            format!(
                                "Mismatching arity of functor {} (expected {}, got {})",
                                functor.name,
                                decl.arity(),
                                functor.args.len()
                            ),
                            functor.loc.clone(),
                        );
                    }
                }
            }
            Argument::Aggregator(agg) => {
                if let Some(target) = agg.target() {
                    self.check_argument(target, report);
                }
                for lit in &agg.body {
                    self.check_literal_arguments(lit, report);
                }
                if self.types.types(agg.id).is_empty() {
                    report.add_error(
                        "Couldn't assign types to the aggregator",
                        agg.loc.clone(),
                    );
                }
            }
            Argument::Variable(_) | Argument::UnnamedVariable(_) | Argument::Counter(_) => {}
        }
    }

    /// The single record type in the set, if exactly one.
    fn unique_record_type(&self, types: &TypeSet) -> Option<TypeId> {
        if types.is_all() {
            return None;
        }
        let env = self.env_analysis.env();
        let mut records = types
            .iter()
            .filter(|&t| matches!(env.node(t), TypeNode::Record { .. }));
        let first = records.next()?;
        if records.next().is_some() {
            return None;
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{Attribute, Clause, Relation, TypeDeclaration};
    use strudel_common::span::SrcLocation;

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn check_declarations(program: &Program) -> (bool, ErrorReport) {
        let env_analysis = TypeEnvironmentAnalysis::run(program);
        let mut report = ErrorReport::new();
        let ok = TypeChecker::check_declarations(program, &env_analysis, &mut report);
        (ok, report)
    }

    fn check_program(program: &Program) -> ErrorReport {
        let env_analysis = TypeEnvironmentAnalysis::run(program);
        let types = TypeAnalysis::run(program, env_analysis.env());
        let options = Options::default();
        let checker = TypeChecker {
            program,
            env_analysis: &env_analysis,
            types: &types,
            options: &options,
        };
        let mut report = ErrorReport::new();
        checker.check_arguments(&mut report);
        report
    }

    fn messages(report: &ErrorReport) -> Vec<String> {
        report
            .diagnostics()
            .iter()
            .map(|d| d.primary.message.clone())
            .collect()
    }

    #[test]
    fn mixed_primitive_union_is_rejected() {
        // .type U = number | symbol
        let mut program = Program::new();
        program.types.push(TypeDeclaration::Union {
            name: "U".into(),
            elements: vec!["number".into(), "symbol".into()],
            loc: loc(),
        });

        let (ok, report) = check_declarations(&program);
        assert!(!ok);
        assert!(messages(&report).iter().any(|m| m
            == "Union type U is defined over {number, symbol} (multiple primitive types in union)"));
    }

    #[test]
    fn cyclic_type_is_an_infinite_descent() {
        let mut program = Program::new();
        program.types.push(TypeDeclaration::Subset {
            name: "A".into(),
            base: "B".into(),
            loc: loc(),
        });
        program.types.push(TypeDeclaration::Subset {
            name: "B".into(),
            base: "A".into(),
            loc: loc(),
        });

        let (ok, report) = check_declarations(&program);
        assert!(!ok);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Infinite descent in the definition of type A")));
    }

    #[test]
    fn subset_of_union_is_rejected() {
        let mut program = Program::new();
        program.types.push(TypeDeclaration::Union {
            name: "U".into(),
            elements: vec!["number".into()],
            loc: loc(),
        });
        program.types.push(TypeDeclaration::Subset {
            name: "S".into(),
            base: "U".into(),
            loc: loc(),
        });

        let (ok, report) = check_declarations(&program);
        assert!(!ok);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Subset type S can't be derived from union U")));
    }

    #[test]
    fn duplicate_record_fields_are_rejected() {
        let mut program = Program::new();
        program.types.push(TypeDeclaration::Record {
            name: "R".into(),
            fields: vec![
                Attribute::new("a", "number", loc()),
                Attribute::new("a", "number", loc()),
            ],
            loc: loc(),
        });

        let (ok, report) = check_declarations(&program);
        assert!(!ok);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Doubly defined field name a in definition of type R")));
    }

    #[test]
    fn primitive_redefinition_is_rejected() {
        let mut program = Program::new();
        program.types.push(TypeDeclaration::Subset {
            name: "number".into(),
            base: "symbol".into(),
            loc: loc(),
        });

        let (ok, report) = check_declarations(&program);
        assert!(!ok);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Redefinition of the predefined type")));
    }

    #[test]
    fn kind_mismatch_in_source_atom_is_reported() {
        let mut program = Program::new();
        program.add_relation(Relation::new(
            "p",
            vec![Attribute::new("x", "symbol", loc())],
            loc(),
        ));
        // p("a" is fine); p(1) breaks the symbol attribute
        program.add_clause(Clause::fact(
            Atom::new("p", vec![Argument::number("1")], loc()),
            loc(),
        ));

        let report = check_program(&program);
        // the constant cannot satisfy the symbol attribute: its type set
        // becomes empty and the constant is ambiguous
        assert!(report.error_count() > 0);
    }

    #[test]
    fn functor_arity_mismatch_message() {
        let mut program = Program::new();
        program.add_relation(Relation::new(
            "p",
            vec![Attribute::new("x", "number", loc())],
            loc(),
        ));
        program.add_relation(Relation::new(
            "q",
            vec![Attribute::new("x", "number", loc())],
            loc(),
        ));
        // p(y) :- q(x), y = strlen(x, x).
        let functor = Argument::IntrinsicFunctor(strudel_ast::IntrinsicFunctor::new(
            strudel_ast::IntrinsicOp::StrLen,
            vec![Argument::var("x"), Argument::var("x")],
            loc(),
        ));
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("y")], loc()),
            vec![
                Literal::Atom(Atom::new("q", vec![Argument::var("x")], loc())),
                Literal::eq(Argument::var("y"), functor),
            ],
            loc(),
        ));

        let report = check_program(&program);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("invalid overload (arity mismatch)")));
    }

    #[test]
    fn no_valid_overloads_message() {
        let mut program = Program::new();
        program.add_relation(Relation::new(
            "p",
            vec![Attribute::new("x", "number", loc())],
            loc(),
        ));
        program.add_relation(Relation::new(
            "s",
            vec![Attribute::new("x", "symbol", loc())],
            loc(),
        ));
        // p(y) :- s(x), y = x + x.
        let functor = Argument::IntrinsicFunctor(strudel_ast::IntrinsicFunctor::new(
            strudel_ast::IntrinsicOp::Add,
            vec![Argument::var("x"), Argument::var("x")],
            loc(),
        ));
        program.add_clause(Clause::new(
            Atom::new("p", vec![Argument::var("y")], loc()),
            vec![
                Literal::Atom(Atom::new("s", vec![Argument::var("x")], loc())),
                Literal::eq(Argument::var("y"), functor),
            ],
            loc(),
        ));

        let report = check_program(&program);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("no valid overloads")));
    }

    #[test]
    fn non_stateful_functor_with_udt_is_rejected() {
        let mut program = Program::new();
        program.types.push(TypeDeclaration::Record {
            name: "R".into(),
            fields: vec![Attribute::new("a", "number", loc())],
            loc: loc(),
        });
        program.functors.push(strudel_ast::FunctorDeclaration::new(
            "f",
            vec![Attribute::new("x", "R", loc())],
            Attribute::new("out", "number", loc()),
            loc(),
        ));

        let report = check_program(&program);
        assert!(messages(&report)
            .iter()
            .any(|m| m.contains("Functors which are not stateful cannot use UDTs")));
    }
}
