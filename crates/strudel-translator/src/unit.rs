//! Program-level translation: strata in topological order with
//! semi-naive fixpoint scaffolding.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::json;
use tracing::debug;

use strudel_ast::{
    Clause, DirectiveKind, QualifiedName, Relation as AstRelation, RelationQualifiers,
    RelationRepresentation,
};
use strudel_ram::{Condition, Expression, Operation, Program, Relation, Statement};
use strudel_solver::ResolvedConstraintOp;
use strudel_types::{Kind, TypeId, TypeNode};

use crate::clause::ClauseTranslator;
use crate::context::TranslatorContext;
use crate::names::{concrete_name, delta_name, new_name};

pub struct UnitTranslator<'a> {
    context: &'a TranslatorContext<'a>,
    subroutines: IndexMap<String, Statement>,
}

impl<'a> UnitTranslator<'a> {
    #[must_use]
    pub fn new(context: &'a TranslatorContext<'a>) -> Self {
        UnitTranslator {
            context,
            subroutines: IndexMap::new(),
        }
    }

    /// Translate the whole program into RAM.
    #[must_use]
    pub fn translate(mut self) -> Program {
        let main = self.generate_program();
        let relations = self.create_ram_relations();
        Program::new(relations, main, self.subroutines)
    }

    fn generate_program(&mut self) -> Statement {
        let sccs = self.context.sccs;
        if sccs.is_empty() {
            return Statement::Sequence(Vec::new());
        }

        for step in 0..sccs.len() {
            let mut stratum = self.generate_stratum(step);

            // drop relations whose last reader has completed
            let mut clears: Vec<Statement> = self
                .context
                .schedule
                .expired_at(step)
                .iter()
                .map(|name| Statement::Clear(concrete_name(name)))
                .collect();
            if !clears.is_empty() {
                let mut parts = vec![stratum];
                parts.append(&mut clears);
                stratum = Statement::sequence(parts);
            }

            let id = format!("stratum_{step}");
            debug!(stratum = %id, "stratum generated");
            self.subroutines.insert(id, stratum);
        }

        let calls: Vec<Statement> = (0..sccs.len())
            .map(|step| Statement::Call(format!("stratum_{step}")))
            .collect();
        let mut main = Statement::sequence(calls);
        if self.context.options.profiling() {
            main = Statement::LogTimer {
                message: "@runtime".to_owned(),
                inner: Box::new(main),
            };
        }
        main
    }

    fn generate_stratum(&self, step: usize) -> Statement {
        let relations = self.context.sccs.relations_in(step);
        let mut parts: Vec<Statement> = Vec::new();

        // load input relations of this stratum
        for name in relations {
            if self.is_input(name) {
                parts.push(self.generate_load(name));
            }
        }

        if self.context.sccs.is_recursive(step) {
            parts.push(self.generate_recursive_stratum(relations));
        } else {
            debug_assert_eq!(relations.len(), 1, "non-recursive stratum holds one relation");
            parts.push(self.generate_non_recursive_relation(&relations[0]));
        }

        // store output relations of this stratum
        for name in relations {
            if self.is_output(name) {
                parts.push(self.generate_store(name));
            }
        }

        Statement::sequence(parts)
    }

    // -- non-recursive relations --------------------------------------------

    fn generate_non_recursive_relation(&self, name: &QualifiedName) -> Statement {
        let mut rules: Vec<Statement> = Vec::new();
        for clause in self.context.program.clauses_for(name) {
            if self.context.is_recursive_clause(clause) {
                continue;
            }
            rules.push(self.translate_non_recursive_clause(clause, name));
        }

        if self.context.options.profiling() {
            let relation = concrete_name(name);
            if rules.is_empty() {
                return Statement::LogSize {
                    relation: relation.clone(),
                    message: format!("@n-nonrecursive-relation;{name}"),
                };
            }
            return Statement::LogRelationTimer {
                message: format!("@t-nonrecursive-relation;{name}"),
                relation,
                inner: Box::new(Statement::sequence(rules)),
            };
        }
        Statement::sequence(rules)
    }

    fn translate_non_recursive_clause(&self, clause: &Clause, name: &QualifiedName) -> Statement {
        let mut rule = ClauseTranslator::new(self.context).translate_clause(clause);
        if self.context.options.profiling() {
            rule = Statement::LogRelationTimer {
                message: format!("@t-nonrecursive-rule;{name};{};{clause}", clause.loc),
                relation: concrete_name(name),
                inner: Box::new(rule),
            };
        }
        Statement::DebugInfo {
            message: format!("{clause}\nin file {}", clause.loc),
            inner: Box::new(rule),
        }
    }

    // -- recursive strata ---------------------------------------------------

    fn generate_recursive_stratum(&self, relations: &[QualifiedName]) -> Statement {
        let mut parts = vec![self.generate_stratum_preamble(relations)];

        let loop_body = Statement::Parallel(
            relations
                .iter()
                .map(|name| self.generate_relation_loop_body(relations, name))
                .collect(),
        );
        let exits = self.generate_stratum_exit_sequence(relations);
        let updates = self.generate_stratum_table_updates(relations);
        parts.push(Statement::Loop(Box::new(Statement::sequence(vec![
            loop_body, exits, updates,
        ]))));

        parts.push(self.generate_stratum_postamble(relations));
        Statement::sequence(parts)
    }

    /// Evaluate the non-recursive parts and seed the delta relations.
    fn generate_stratum_preamble(&self, relations: &[QualifiedName]) -> Statement {
        let mut parts = Vec::new();
        for name in relations {
            parts.push(self.generate_non_recursive_relation(name));
            parts.push(self.generate_merge(name, &delta_name(name), &concrete_name(name)));
        }
        Statement::sequence(parts)
    }

    fn generate_relation_loop_body(
        &self,
        relations: &[QualifiedName],
        name: &QualifiedName,
    ) -> Statement {
        let scc: FxHashSet<QualifiedName> = relations.iter().cloned().collect();
        let mut rules: Vec<Statement> = Vec::new();
        for clause in self.context.program.clauses_for(name) {
            if !self.context.is_recursive_clause(clause) {
                continue;
            }
            // one version per body atom within the stratum
            let version_count = clause
                .body_atoms()
                .iter()
                .filter(|atom| scc.contains(&atom.name))
                .count();
            debug_assert!(
                clause
                    .plan
                    .as_ref()
                    .and_then(strudel_ast::ExecutionPlan::max_version)
                    .map_or(true, |max| max < version_count),
                "execution plan has more versions than stratum atoms"
            );
            for version in 0..version_count {
                rules.push(ClauseTranslator::translate_recursive_clause(
                    self.context,
                    clause,
                    &scc,
                    version,
                ));
            }
        }

        let mut body = Statement::sequence(rules);
        if self.context.options.profiling() {
            body = Statement::LogRelationTimer {
                message: format!("@t-recursive-relation;{name}"),
                relation: new_name(name),
                inner: Box::new(body),
            };
        }
        body
    }

    /// The loop ends when no relation derived new facts, or a size limit
    /// was reached.
    fn generate_stratum_exit_sequence(&self, relations: &[QualifiedName]) -> Statement {
        let emptiness = Condition::conjunction(
            relations
                .iter()
                .map(|name| Condition::EmptinessCheck(new_name(name)))
                .collect(),
        );
        let mut exits = vec![Statement::Exit(emptiness)];

        for name in relations {
            if let Some(limit) = self.context.size_limit(name) {
                exits.push(Statement::Exit(Condition::Constraint {
                    op: ResolvedConstraintOp::new(strudel_ast::ConstraintOp::Ge, Kind::Signed),
                    lhs: Expression::RelationSize(concrete_name(name)),
                    rhs: Expression::SignedConstant(limit),
                }));
            }
        }
        Statement::sequence(exits)
    }

    /// Merge the accumulators into the concrete relations and rotate the
    /// frontier.
    fn generate_stratum_table_updates(&self, relations: &[QualifiedName]) -> Statement {
        let mut updates = Vec::new();
        for name in relations {
            let mut update = Statement::sequence(vec![
                self.generate_merge(name, &concrete_name(name), &new_name(name)),
                Statement::Swap(delta_name(name), new_name(name)),
                Statement::Clear(new_name(name)),
            ]);
            if self.context.options.profiling() {
                update = Statement::LogRelationTimer {
                    message: format!("@c-recursive-relation;{name}"),
                    relation: new_name(name),
                    inner: Box::new(update),
                };
            }
            updates.push(update);
        }
        Statement::sequence(updates)
    }

    fn generate_stratum_postamble(&self, relations: &[QualifiedName]) -> Statement {
        let mut parts = Vec::new();
        for name in relations {
            parts.push(Statement::Clear(delta_name(name)));
            parts.push(Statement::Clear(new_name(name)));
        }
        Statement::sequence(parts)
    }

    /// Insert all tuples of `source` into `destination`. Equivalence
    /// relations additionally extend the destination so transitivity is
    /// maintained by the runtime.
    fn generate_merge(
        &self,
        name: &QualifiedName,
        destination: &str,
        source: &str,
    ) -> Statement {
        let Some(relation) = self.context.relation(name) else {
            return Statement::Sequence(Vec::new());
        };

        // propositions: insert the empty tuple if the source fired
        if relation.arity() == 0 {
            return Statement::Query(Operation::Filter {
                condition: Condition::EmptinessCheck(source.to_owned()).negate(),
                inner: Box::new(Operation::Insert {
                    relation: destination.to_owned(),
                    values: Vec::new(),
                }),
            });
        }

        let values: Vec<Expression> = (0..relation.arity())
            .map(|column| Expression::tuple(0, column))
            .collect();
        let merge = Statement::Query(Operation::Scan {
            relation: source.to_owned(),
            level: 0,
            inner: Box::new(Operation::Insert {
                relation: destination.to_owned(),
                values,
            }),
        });

        if relation.representation == RelationRepresentation::Eqrel {
            return Statement::sequence(vec![
                Statement::Extend {
                    target: destination.to_owned(),
                    source: source.to_owned(),
                },
                merge,
            ]);
        }
        merge
    }

    // -- IO -----------------------------------------------------------------

    fn is_input(&self, name: &QualifiedName) -> bool {
        self.context
            .relation(name)
            .is_some_and(|rel| rel.has_qualifier(RelationQualifiers::INPUT))
            || !self
                .context
                .program
                .directives_of(name, DirectiveKind::Input)
                .is_empty()
    }

    fn is_output(&self, name: &QualifiedName) -> bool {
        let rel = self.context.relation(name);
        rel.is_some_and(|rel| {
            rel.has_qualifier(RelationQualifiers::OUTPUT)
                || rel.has_qualifier(RelationQualifiers::PRINT_SIZE)
        }) || !self
            .context
            .program
            .directives_of(name, DirectiveKind::Output)
            .is_empty()
            || !self
                .context
                .program
                .directives_of(name, DirectiveKind::PrintSize)
                .is_empty()
    }

    fn generate_load(&self, name: &QualifiedName) -> Statement {
        self.generate_io(name, DirectiveKind::Input)
    }

    fn generate_store(&self, name: &QualifiedName) -> Statement {
        let mut parts = vec![self.generate_io(name, DirectiveKind::Output)];
        let printsize = self.generate_io(name, DirectiveKind::PrintSize);
        parts.push(printsize);
        Statement::sequence(parts)
    }

    fn generate_io(&self, name: &QualifiedName, kind: DirectiveKind) -> Statement {
        let explicit = self.context.program.directives_of(name, kind);
        let qualifier_implied = match kind {
            DirectiveKind::Input => {
                explicit.is_empty()
                    && self
                        .context
                        .relation(name)
                        .is_some_and(|rel| rel.has_qualifier(RelationQualifiers::INPUT))
            }
            DirectiveKind::Output => {
                explicit.is_empty()
                    && self
                        .context
                        .relation(name)
                        .is_some_and(|rel| rel.has_qualifier(RelationQualifiers::OUTPUT))
            }
            DirectiveKind::PrintSize => {
                explicit.is_empty()
                    && self
                        .context
                        .relation(name)
                        .is_some_and(|rel| rel.has_qualifier(RelationQualifiers::PRINT_SIZE))
            }
            DirectiveKind::LimitSize => false,
        };

        let mut statements: Vec<Statement> = Vec::new();
        let relation_name = concrete_name(name);

        let mut emit = |params: IndexMap<String, String>| {
            let mut directives = IndexMap::new();
            directives.insert("operation".to_owned(), kind.keyword().to_owned());
            for (key, value) in params {
                directives.insert(key, value);
            }
            directives
                .entry("IO".to_owned())
                .or_insert_with(|| "file".to_owned());
            directives.insert("auxArity".to_owned(), "0".to_owned());
            if self.context.options.no_warn {
                directives.insert("no-warn".to_owned(), "true".to_owned());
            }
            directives.insert("types".to_owned(), self.io_types_json(name));
            let mut stmt = Statement::Io {
                relation: relation_name.clone(),
                directives,
            };
            if self.context.options.profiling() {
                let message = match kind {
                    DirectiveKind::Input => format!("@t-relation-load;{name}"),
                    _ => format!("@t-relation-save;{name}"),
                };
                stmt = Statement::LogRelationTimer {
                    message,
                    relation: relation_name.clone(),
                    inner: Box::new(stmt),
                };
            }
            statements.push(stmt);
        };

        for directive in explicit {
            emit(directive.params.clone());
        }
        if qualifier_implied {
            emit(IndexMap::new());
        }
        Statement::sequence(statements)
    }

    /// The JSON-encoded `types` parameter describing attribute kinds,
    /// records and ADTs for the IO layer.
    fn io_types_json(&self, name: &QualifiedName) -> String {
        let Some(relation) = self.context.relation(name) else {
            return "{}".to_owned();
        };
        let env = self.context.env;

        let attribute_types: Vec<String> = relation
            .attributes
            .iter()
            .map(|attr| {
                env.get_type(&attr.type_name)
                    .map_or_else(|| "i:number".to_owned(), |ty| env.type_qualifier(ty))
            })
            .collect();

        // collect records and ADTs reachable from the attribute types
        let mut seen: FxHashSet<TypeId> = FxHashSet::default();
        let mut records = serde_json::Map::new();
        let mut adts = serde_json::Map::new();
        let mut stack: Vec<TypeId> = relation
            .attributes
            .iter()
            .filter_map(|attr| env.get_type(&attr.type_name))
            .collect();
        while let Some(ty) = stack.pop() {
            if !seen.insert(ty) {
                continue;
            }
            match env.node(ty) {
                TypeNode::Record { fields } => {
                    let field_types: Vec<String> =
                        fields.iter().map(|&f| env.type_qualifier(f)).collect();
                    records.insert(
                        env.type_qualifier(ty),
                        json!({ "arity": fields.len(), "types": field_types }),
                    );
                    stack.extend(fields.iter().copied());
                }
                TypeNode::Adt { branches } => {
                    let rendered: Vec<serde_json::Value> = branches
                        .iter()
                        .map(|branch| {
                            let field_types: Vec<String> = branch
                                .field_types
                                .iter()
                                .map(|&f| env.type_qualifier(f))
                                .collect();
                            json!({ "name": branch.name, "types": field_types })
                        })
                        .collect();
                    adts.insert(
                        env.type_qualifier(ty),
                        json!({ "arity": branches.len(), "branches": rendered }),
                    );
                    for branch in branches {
                        stack.extend(branch.field_types.iter().copied());
                    }
                }
                TypeNode::Subset { base } | TypeNode::Primitive { base } => stack.push(*base),
                TypeNode::Union { elements } => stack.extend(elements.iter().copied()),
                TypeNode::Constant { .. } => {}
            }
        }

        json!({
            "relation": {
                "arity": relation.arity(),
                "auxArity": 0,
                "types": attribute_types,
            },
            "records": serde_json::Value::Object(records),
            "ADTs": serde_json::Value::Object(adts),
        })
        .to_string()
    }

    // -- relation declarations ----------------------------------------------

    fn create_ram_relation(&self, relation: &AstRelation, ram_name: String) -> Relation {
        let env = self.context.env;
        let attribute_names: Vec<String> = relation
            .attributes
            .iter()
            .map(|attr| attr.name.clone())
            .collect();
        let attribute_types: Vec<String> = relation
            .attributes
            .iter()
            .map(|attr| {
                env.get_type(&attr.type_name)
                    .map_or_else(|| "i:number".to_owned(), |ty| env.type_qualifier(ty))
            })
            .collect();
        Relation::new(
            ram_name,
            attribute_names,
            attribute_types,
            relation.representation,
        )
    }

    /// Relations in stratum order; recursive ones get `@delta_` and
    /// `@new_` variants with identical signatures.
    fn create_ram_relations(&self) -> Vec<Relation> {
        let mut relations = Vec::new();
        for step in 0..self.context.sccs.len() {
            let recursive = self.context.sccs.is_recursive(step);
            for name in self.context.sccs.relations_in(step) {
                let Some(relation) = self.context.relation(name) else {
                    continue;
                };
                relations.push(self.create_ram_relation(relation, concrete_name(name)));
                if recursive {
                    relations.push(self.create_ram_relation(relation, delta_name(name)));
                    relations.push(self.create_ram_relation(relation, new_name(name)));
                }
            }
        }
        relations
    }
}
