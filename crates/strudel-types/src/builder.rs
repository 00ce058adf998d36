//! Materializes the type environment from the program's type
//! declarations.
//!
//! The builder first computes a dependency graph over declared names
//! (subset -> base, union -> elements; record and ADT fields are resolved
//! lazily and contribute no edges), marks every name that reaches itself
//! as cyclic, filters declarations that collide with the reserved
//! primitive names or are cyclic, and then constructs the remaining types
//! depth-first. Records and ADTs are forward-allocated before their
//! fields are resolved so they may refer to themselves.

use std::collections::BTreeSet;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use strudel_ast::{Program, QualifiedName, TypeDeclaration};

use crate::env::{AdtBranch, TypeEnvironment, TypeId};

/// Dependency graph over declared type names.
struct TypeDependencyGraph {
    graph: DiGraph<(), ()>,
    nodes: FxHashMap<QualifiedName, NodeIndex>,
}

impl TypeDependencyGraph {
    fn new(declarations: &[TypeDeclaration]) -> Self {
        let mut this = TypeDependencyGraph {
            graph: DiGraph::new(),
            nodes: FxHashMap::default(),
        };
        for decl in declarations {
            match decl {
                TypeDeclaration::Subset { name, base, .. } => {
                    this.insert_edge(name.clone(), base.clone());
                }
                TypeDeclaration::Union { name, elements, .. } => {
                    for element in elements {
                        this.insert_edge(name.clone(), element.clone());
                    }
                }
                TypeDeclaration::Record { .. } | TypeDeclaration::Adt { .. } => {}
            }
        }
        this
    }

    fn node(&mut self, name: QualifiedName) -> NodeIndex {
        let graph = &mut self.graph;
        *self
            .nodes
            .entry(name)
            .or_insert_with(|| graph.add_node(()))
    }

    fn insert_edge(&mut self, from: QualifiedName, to: QualifiedName) {
        let from = self.node(from);
        let to = self.node(to);
        self.graph.add_edge(from, to, ());
    }

    /// Whether `from` reaches `to` through at least one edge.
    fn reaches(&self, from: &QualifiedName, to: &QualifiedName) -> bool {
        let (Some(&from), Some(&to)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return false;
        };
        self.graph
            .neighbors(from)
            .any(|next| next == to || has_path_connecting(&self.graph, next, to, None))
    }
}

/// The populated type environment plus the two side maps downstream
/// checks consume.
pub struct TypeEnvironmentAnalysis {
    env: TypeEnvironment,
    cyclic_types: FxHashSet<QualifiedName>,
    primitive_types_in_unions: FxHashMap<QualifiedName, BTreeSet<QualifiedName>>,
}

impl TypeEnvironmentAnalysis {
    /// Build the environment from the program's declarations.
    #[must_use]
    pub fn run(program: &Program) -> Self {
        let mut env = TypeEnvironment::new();
        let graph = TypeDependencyGraph::new(&program.types);

        let cyclic_types: FxHashSet<QualifiedName> = program
            .types
            .iter()
            .map(TypeDeclaration::name)
            .filter(|name| graph.reaches(name, name))
            .cloned()
            .collect();

        let mut primitive_types_in_unions: FxHashMap<QualifiedName, BTreeSet<QualifiedName>> =
            FxHashMap::default();
        for decl in &program.types {
            if let TypeDeclaration::Union { name, .. } = decl {
                let reachable = primitive_types_in_unions.entry(name.clone()).or_default();
                for primitive in env.primitive_types().clone().iter() {
                    let primitive_name = env.name(primitive).clone();
                    if graph.reaches(name, &primitive_name) {
                        reachable.insert(primitive_name);
                    }
                }
            }
        }

        // Filter redefined primitive types and cyclic types.
        let mut name_to_decl: FxHashMap<QualifiedName, &TypeDeclaration> = FxHashMap::default();
        for decl in &program.types {
            let name = decl.name();
            if env.is_type(name) || cyclic_types.contains(name) {
                debug!(%name, "skipping reserved or cyclic type declaration");
                continue;
            }
            name_to_decl.entry(name.clone()).or_insert(decl);
        }

        for name in name_to_decl.keys().cloned().collect::<Vec<_>>() {
            create_type(&mut env, &name, &name_to_decl);
        }

        TypeEnvironmentAnalysis {
            env,
            cyclic_types,
            primitive_types_in_unions,
        }
    }

    #[must_use]
    pub fn env(&self) -> &TypeEnvironment {
        &self.env
    }

    #[must_use]
    pub fn is_cyclic(&self, name: &QualifiedName) -> bool {
        self.cyclic_types.contains(name)
    }

    /// The primitive types reachable from the given union declaration.
    #[must_use]
    pub fn primitive_types_in_union(&self, union: &QualifiedName) -> Option<&BTreeSet<QualifiedName>> {
        self.primitive_types_in_unions.get(union)
    }
}

/// Depth-first construction of one declared type. Returns `None` when the
/// type (or one of its constituents) cannot be resolved; forward-allocated
/// records and ADTs stay registered with no fields in that case, which the
/// type checker reports at the use site.
fn create_type(
    env: &mut TypeEnvironment,
    name: &QualifiedName,
    name_to_decl: &FxHashMap<QualifiedName, &TypeDeclaration>,
) -> Option<TypeId> {
    if let Some(existing) = env.get_type(name) {
        return Some(existing);
    }

    let decl = *name_to_decl.get(name)?;
    match decl {
        TypeDeclaration::Subset { base, .. } => {
            let base = create_type(env, base, name_to_decl)?;
            Some(env.create_subset(name.clone(), base))
        }
        TypeDeclaration::Union { elements, .. } => {
            let mut element_ids = Vec::with_capacity(elements.len());
            for element in elements {
                element_ids.push(create_type(env, element, name_to_decl)?);
            }
            Some(env.create_union(name.clone(), element_ids))
        }
        TypeDeclaration::Record { fields, .. } => {
            // Forward-allocate first: the record may refer to itself.
            let record = env.create_record(name.clone());
            let mut field_ids = Vec::with_capacity(fields.len());
            for field in fields {
                if &field.type_name == name {
                    field_ids.push(record);
                    continue;
                }
                field_ids.push(create_type(env, &field.type_name, name_to_decl)?);
            }
            env.set_record_fields(record, field_ids);
            Some(record)
        }
        TypeDeclaration::Adt { branches, .. } => {
            let adt = env.create_adt(name.clone());
            let mut branch_nodes = Vec::with_capacity(branches.len());
            for branch in branches {
                let mut field_ids = Vec::with_capacity(branch.fields.len());
                for field in &branch.fields {
                    if &field.type_name == name {
                        field_ids.push(adt);
                        continue;
                    }
                    field_ids.push(create_type(env, &field.type_name, name_to_decl)?);
                }
                branch_nodes.push(AdtBranch {
                    name: branch.constructor.clone(),
                    field_types: field_ids,
                });
            }
            env.set_adt_branches(adt, branch_nodes);
            Some(adt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strudel_ast::{Attribute, BranchDeclaration};
    use strudel_common::span::SrcLocation;

    fn loc() -> SrcLocation {
        SrcLocation::unset()
    }

    fn subset(name: &str, base: &str) -> TypeDeclaration {
        TypeDeclaration::Subset {
            name: name.into(),
            base: base.into(),
            loc: loc(),
        }
    }

    fn union(name: &str, elements: &[&str]) -> TypeDeclaration {
        TypeDeclaration::Union {
            name: name.into(),
            elements: elements.iter().map(|&e| e.into()).collect(),
            loc: loc(),
        }
    }

    fn program_with_types(types: Vec<TypeDeclaration>) -> Program {
        Program {
            types,
            ..Program::default()
        }
    }

    #[test]
    fn subset_chain_is_built() {
        let program = program_with_types(vec![subset("A", "number"), subset("B", "A")]);
        let analysis = TypeEnvironmentAnalysis::run(&program);
        let env = analysis.env();

        let a = env.get_type(&"A".into()).unwrap();
        let b = env.get_type(&"B".into()).unwrap();
        let n = env.get_type(&"number".into()).unwrap();
        assert!(env.is_subtype(b, a));
        assert!(env.is_subtype(b, n));
    }

    #[test]
    fn cyclic_subsets_are_detected_and_excluded() {
        let program = program_with_types(vec![subset("A", "B"), subset("B", "A")]);
        let analysis = TypeEnvironmentAnalysis::run(&program);

        assert!(analysis.is_cyclic(&"A".into()));
        assert!(analysis.is_cyclic(&"B".into()));
        assert!(!analysis.env().is_type(&"A".into()));
        assert!(!analysis.env().is_type(&"B".into()));
    }

    #[test]
    fn union_cycle_is_detected() {
        let program = program_with_types(vec![union("U", &["number", "U"])]);
        let analysis = TypeEnvironmentAnalysis::run(&program);
        assert!(analysis.is_cyclic(&"U".into()));
    }

    #[test]
    fn primitive_closure_of_unions() {
        let program = program_with_types(vec![
            subset("A", "number"),
            subset("S", "symbol"),
            union("U", &["A", "S"]),
        ]);
        let analysis = TypeEnvironmentAnalysis::run(&program);
        let primitives = analysis.primitive_types_in_union(&"U".into()).unwrap();
        let names: Vec<String> = primitives.iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["number", "symbol"]);
    }

    #[test]
    fn redefined_primitives_are_skipped() {
        let program = program_with_types(vec![subset("number", "symbol")]);
        let analysis = TypeEnvironmentAnalysis::run(&program);
        let env = analysis.env();
        let n = env.get_type(&"number".into()).unwrap();
        // still the pre-created primitive
        assert!(env.is_of_kind(n, crate::env::Kind::Signed));
    }

    #[test]
    fn recursive_record_is_forward_allocated() {
        let program = program_with_types(vec![TypeDeclaration::Record {
            name: "List".into(),
            fields: vec![
                Attribute::new("head", "number", loc()),
                Attribute::new("tail", "List", loc()),
            ],
            loc: loc(),
        }]);
        let analysis = TypeEnvironmentAnalysis::run(&program);
        let env = analysis.env();
        let list = env.get_type(&"List".into()).unwrap();
        match env.node(list) {
            crate::env::TypeNode::Record { fields } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1], list);
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn adt_with_undefined_field_stays_registered_without_branches() {
        let program = program_with_types(vec![TypeDeclaration::Adt {
            name: "T".into(),
            branches: vec![BranchDeclaration::new(
                "Leaf",
                vec![Attribute::new("x", "NoSuchType", loc())],
                loc(),
            )],
            loc: loc(),
        }]);
        let analysis = TypeEnvironmentAnalysis::run(&program);
        let env = analysis.env();
        let t = env.get_type(&"T".into()).unwrap();
        assert_eq!(env.adt_branches(t).unwrap().len(), 0);
    }
}
