//! The type environment: an owner arena of named types, plus the lattice
//! operations defined over them.
//!
//! Types may refer to each other (records and ADTs may even refer to
//! themselves), so the arena hands out `TypeId` indices instead of
//! references. The four constant types and the four primitive types are
//! pre-created under reserved names and cannot be redeclared.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use strudel_ast::QualifiedName;

use crate::type_set::TypeSet;

/// Index of a type within its environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        TypeId(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The six kinds a type can root in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Signed,
    Unsigned,
    Float,
    Symbol,
    Record,
    Adt,
}

impl Kind {
    /// The attribute-qualifier prefix used in RAM relation signatures.
    #[must_use]
    pub fn qualifier_prefix(self) -> &'static str {
        match self {
            Kind::Signed => "i",
            Kind::Unsigned => "u",
            Kind::Float => "f",
            Kind::Symbol => "s",
            Kind::Record => "r",
            Kind::Adt => "+",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Signed | Kind::Unsigned | Kind::Float)
    }
}

/// One constructor of an ADT, with its product of field types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdtBranch {
    pub name: String,
    pub field_types: Vec<TypeId>,
}

/// The structure of a named type.
#[derive(Clone, Debug)]
pub enum TypeNode {
    /// One of the four pre-created constant types.
    Constant { kind: Kind },
    /// A pre-created primitive (the fixed subset of its constant type).
    Primitive { base: TypeId },
    /// A user-declared subset type.
    Subset { base: TypeId },
    /// A union; subtype of `u` iff every element is, supertype via any
    /// element.
    Union { elements: Vec<TypeId> },
    /// A nominal product of field types.
    Record { fields: Vec<TypeId> },
    /// A nominal sum; branches are kept sorted by constructor name.
    Adt { branches: Vec<AdtBranch> },
}

struct TypeEntry {
    name: QualifiedName,
    node: TypeNode,
}

/// Stores the named types of a program instance.
pub struct TypeEnvironment {
    types: Vec<TypeEntry>,
    by_name: IndexMap<QualifiedName, TypeId>,
    constant_types: TypeSet,
    constant_numeric_types: TypeSet,
    primitive_types: TypeSet,
}

impl TypeEnvironment {
    #[must_use]
    pub fn new() -> Self {
        let mut env = TypeEnvironment {
            types: Vec::new(),
            by_name: IndexMap::new(),
            constant_types: TypeSet::empty(),
            constant_numeric_types: TypeSet::empty(),
            primitive_types: TypeSet::empty(),
        };

        let signed = env.register("__numberConstant", TypeNode::Constant { kind: Kind::Signed });
        let float = env.register("__floatConstant", TypeNode::Constant { kind: Kind::Float });
        let symbol = env.register("__symbolConstant", TypeNode::Constant { kind: Kind::Symbol });
        let unsigned = env.register(
            "__unsignedConstant",
            TypeNode::Constant {
                kind: Kind::Unsigned,
            },
        );
        env.constant_types = TypeSet::of([signed, float, symbol, unsigned]);
        env.constant_numeric_types = TypeSet::of([signed, float, unsigned]);

        let number = env.register("number", TypeNode::Primitive { base: signed });
        let float_prim = env.register("float", TypeNode::Primitive { base: float });
        let symbol_prim = env.register("symbol", TypeNode::Primitive { base: symbol });
        let unsigned_prim = env.register("unsigned", TypeNode::Primitive { base: unsigned });
        env.primitive_types = TypeSet::of([number, float_prim, symbol_prim, unsigned_prim]);

        env
    }

    fn register(&mut self, name: impl Into<QualifiedName>, node: TypeNode) -> TypeId {
        let name = name.into();
        assert!(
            !self.by_name.contains_key(&name),
            "registering present type {name}"
        );
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.types.push(TypeEntry { name, node });
        id
    }

    /// Create a subset type over an existing base.
    pub fn create_subset(&mut self, name: impl Into<QualifiedName>, base: TypeId) -> TypeId {
        self.register(name, TypeNode::Subset { base })
    }

    /// Create a union type over existing element types.
    pub fn create_union(&mut self, name: impl Into<QualifiedName>, elements: Vec<TypeId>) -> TypeId {
        self.register(name, TypeNode::Union { elements })
    }

    /// Forward-allocate a record type; its fields are filled in once they
    /// have been created (they may refer back to the record).
    pub fn create_record(&mut self, name: impl Into<QualifiedName>) -> TypeId {
        self.register(name, TypeNode::Record { fields: Vec::new() })
    }

    pub fn set_record_fields(&mut self, record: TypeId, fields: Vec<TypeId>) {
        match &mut self.types[record.index()].node {
            TypeNode::Record { fields: slot } => *slot = fields,
            _ => unreachable!("set_record_fields on non-record"),
        }
    }

    /// Forward-allocate an ADT; its branches are filled in once created.
    pub fn create_adt(&mut self, name: impl Into<QualifiedName>) -> TypeId {
        self.register(name, TypeNode::Adt { branches: Vec::new() })
    }

    pub fn set_adt_branches(&mut self, adt: TypeId, mut branches: Vec<AdtBranch>) {
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        match &mut self.types[adt.index()].node {
            TypeNode::Adt { branches: slot } => *slot = branches,
            _ => unreachable!("set_adt_branches on non-adt"),
        }
    }

    // -- lookups ------------------------------------------------------------

    #[must_use]
    pub fn is_type(&self, name: &QualifiedName) -> bool {
        self.by_name.contains_key(name)
    }

    #[must_use]
    pub fn get_type(&self, name: &QualifiedName) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn name(&self, ty: TypeId) -> &QualifiedName {
        &self.types[ty.index()].name
    }

    #[must_use]
    pub fn node(&self, ty: TypeId) -> &TypeNode {
        &self.types[ty.index()].node
    }

    /// The constant type rooting the given kind. Record and ADT kinds have
    /// no constant type.
    #[must_use]
    pub fn constant_type(&self, kind: Kind) -> TypeId {
        let name = match kind {
            Kind::Signed => "__numberConstant",
            Kind::Unsigned => "__unsignedConstant",
            Kind::Float => "__floatConstant",
            Kind::Symbol => "__symbolConstant",
            Kind::Record | Kind::Adt => unreachable!("there is no constant record type"),
        };
        self.by_name[&QualifiedName::from(name)]
    }

    /// The primitive type of the given kind.
    #[must_use]
    pub fn primitive_type(&self, kind: Kind) -> TypeId {
        let name = match kind {
            Kind::Signed => "number",
            Kind::Unsigned => "unsigned",
            Kind::Float => "float",
            Kind::Symbol => "symbol",
            Kind::Record | Kind::Adt => unreachable!("there is no primitive record type"),
        };
        self.by_name[&QualifiedName::from(name)]
    }

    #[must_use]
    pub fn constant_types(&self) -> &TypeSet {
        &self.constant_types
    }

    #[must_use]
    pub fn constant_numeric_types(&self) -> &TypeSet {
        &self.constant_numeric_types
    }

    #[must_use]
    pub fn primitive_types(&self) -> &TypeSet {
        &self.primitive_types
    }

    #[must_use]
    pub fn is_primitive(&self, ty: TypeId) -> bool {
        self.primitive_types.contains(ty)
    }

    /// All registered types as a set.
    #[must_use]
    pub fn all_types(&self) -> TypeSet {
        TypeSet::of((0..self.types.len() as u32).map(TypeId::from_index))
    }

    // -- lattice operations -------------------------------------------------

    /// Whether `ty` is rooted in `root`, climbing subset bases and
    /// distributing over union elements. Memoized per query so cyclic
    /// unions terminate (an in-progress type counts as not rooted).
    fn is_of_root_type(&self, ty: TypeId, root: TypeId) -> bool {
        fn go(
            env: &TypeEnvironment,
            ty: TypeId,
            root: TypeId,
            seen: &mut FxHashMap<TypeId, bool>,
        ) -> bool {
            if let Some(&known) = seen.get(&ty) {
                return known;
            }
            seen.insert(ty, false);
            let result = if ty == root {
                true
            } else {
                match env.node(ty) {
                    TypeNode::Constant { .. } | TypeNode::Record { .. } | TypeNode::Adt { .. } => {
                        false
                    }
                    TypeNode::Primitive { base } | TypeNode::Subset { base } => {
                        go(env, *base, root, seen)
                    }
                    TypeNode::Union { elements } => {
                        !elements.is_empty() && elements.iter().all(|&e| go(env, e, root, seen))
                    }
                }
            };
            seen.insert(ty, result);
            result
        }
        go(self, ty, root, &mut FxHashMap::default())
    }

    /// Whether the type is of the given kind.
    #[must_use]
    pub fn is_of_kind(&self, ty: TypeId, kind: Kind) -> bool {
        match kind {
            Kind::Record => matches!(self.node(ty), TypeNode::Record { .. }),
            Kind::Adt => matches!(self.node(ty), TypeNode::Adt { .. }),
            _ => self.is_of_root_type(ty, self.constant_type(kind)),
        }
    }

    /// Whether every member of a non-empty, non-universal set is of the
    /// given kind.
    #[must_use]
    pub fn set_is_of_kind(&self, set: &TypeSet, kind: Kind) -> bool {
        !set.is_empty() && !set.is_all() && set.iter().all(|t| self.is_of_kind(t, kind))
    }

    /// The kind of a type. Total: a union whose elements do not agree on
    /// a root (rejected by the checker) recovers to the signed kind.
    #[must_use]
    pub fn kind_of(&self, ty: TypeId) -> Kind {
        for kind in [
            Kind::Signed,
            Kind::Unsigned,
            Kind::Float,
            Kind::Record,
            Kind::Symbol,
            Kind::Adt,
        ] {
            if self.is_of_kind(ty, kind) {
                return kind;
            }
        }
        Kind::Signed
    }

    /// The common kind of a set, if all members agree. ADTs are excluded:
    /// an all-ADT set has no single constant root.
    #[must_use]
    pub fn kind_of_set(&self, set: &TypeSet) -> Option<Kind> {
        [
            Kind::Signed,
            Kind::Unsigned,
            Kind::Float,
            Kind::Record,
            Kind::Symbol,
        ]
        .into_iter()
        .find(|&kind| self.set_is_of_kind(set, kind))
    }

    #[must_use]
    pub fn set_is_numeric(&self, set: &TypeSet) -> bool {
        self.set_is_of_kind(set, Kind::Signed)
            || self.set_is_of_kind(set, Kind::Unsigned)
            || self.set_is_of_kind(set, Kind::Float)
    }

    #[must_use]
    pub fn set_is_orderable(&self, set: &TypeSet) -> bool {
        self.set_is_numeric(set) || self.set_is_of_kind(set, Kind::Symbol)
    }

    /// The subtype relation.
    #[must_use]
    pub fn is_subtype(&self, a: TypeId, b: TypeId) -> bool {
        if self.is_of_root_type(a, b) {
            return true;
        }
        if let TypeNode::Union { elements } = self.node(a) {
            return elements.iter().all(|&e| self.is_subtype(e, b));
        }
        if let TypeNode::Union { elements } = self.node(b) {
            return elements.iter().any(|&e| self.is_subtype(a, e));
        }
        false
    }

    #[must_use]
    pub fn are_equivalent(&self, a: TypeId, b: TypeId) -> bool {
        self.is_subtype(a, b) && self.is_subtype(b, a)
    }

    /// Whether a supertype common to both exists.
    #[must_use]
    pub fn have_common_supertype(&self, a: TypeId, b: TypeId) -> bool {
        if a == b || self.is_subtype(a, b) || self.is_subtype(b, a) {
            return true;
        }
        (0..self.types.len() as u32)
            .map(TypeId::from_index)
            .any(|t| self.is_subtype(a, t) && self.is_subtype(b, t))
    }

    /// Greatest common subtypes of two types.
    #[must_use]
    pub fn greatest_common_subtypes(&self, a: TypeId, b: TypeId) -> TypeSet {
        if self.is_subtype(a, b) {
            return TypeSet::singleton(a);
        }
        if self.is_subtype(b, a) {
            return TypeSet::singleton(b);
        }

        let mut result = TypeSet::empty();
        if matches!(self.node(a), TypeNode::Union { .. })
            && matches!(self.node(b), TypeNode::Union { .. })
        {
            // Collect elements of a (descending nested unions) that are
            // subtypes of b.
            fn collect(env: &TypeEnvironment, ty: TypeId, b: TypeId, result: &mut TypeSet) {
                if env.is_subtype(ty, b) {
                    result.insert(ty);
                } else if let TypeNode::Union { elements } = env.node(ty) {
                    for &element in elements {
                        collect(env, element, b, result);
                    }
                }
            }
            collect(self, a, b, &mut result);
        }
        result
    }

    /// Pairwise greatest common subtypes of two sets.
    #[must_use]
    pub fn greatest_common_subtypes_of_sets(&self, a: &TypeSet, b: &TypeSet) -> TypeSet {
        if a.is_empty() {
            return a.clone();
        }
        if b.is_empty() {
            return b.clone();
        }
        if a.is_all() {
            return b.clone();
        }
        if b.is_all() {
            return a.clone();
        }

        let mut result = TypeSet::empty();
        for x in a.iter() {
            for y in b.iter() {
                result.insert_all(&self.greatest_common_subtypes(x, y));
            }
        }
        result
    }

    /// Whether all branches of an ADT are nullary.
    #[must_use]
    pub fn is_adt_enum(&self, ty: TypeId) -> bool {
        match self.node(ty) {
            TypeNode::Adt { branches } => branches.iter().all(|b| b.field_types.is_empty()),
            _ => false,
        }
    }

    /// The branches of an ADT, sorted by constructor name.
    #[must_use]
    pub fn adt_branches(&self, ty: TypeId) -> Option<&[AdtBranch]> {
        match self.node(ty) {
            TypeNode::Adt { branches } => Some(branches),
            _ => None,
        }
    }

    /// The field types of an ADT constructor, if the ADT declares it.
    #[must_use]
    pub fn branch_field_types(&self, adt: TypeId, constructor: &str) -> Option<&[TypeId]> {
        self.adt_branches(adt)?
            .iter()
            .find(|branch| branch.name == constructor)
            .map(|branch| branch.field_types.as_slice())
    }

    /// The attribute-type qualifier string used in RAM relation
    /// signatures, e.g. `i:number` or `s:symbol`.
    #[must_use]
    pub fn type_qualifier(&self, ty: TypeId) -> String {
        format!("{}:{}", self.kind_of(ty).qualifier_prefix(), self.name(ty))
    }
}

impl Default for TypeEnvironment {
    fn default() -> Self {
        TypeEnvironment::new()
    }
}

impl fmt::Display for TypeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Types:")?;
        for entry in &self.types {
            write!(f, "\t")?;
            match &entry.node {
                TypeNode::Constant { .. } | TypeNode::Primitive { .. } => {
                    writeln!(f, "{}", entry.name)?;
                }
                TypeNode::Subset { base } => {
                    writeln!(f, "{} <: {}", entry.name, self.name(*base))?;
                }
                TypeNode::Union { elements } => {
                    let elems: Vec<String> =
                        elements.iter().map(|&e| self.name(e).to_string()).collect();
                    writeln!(f, "{} = {}", entry.name, elems.join(" | "))?;
                }
                TypeNode::Record { fields } => {
                    let names: Vec<String> =
                        fields.iter().map(|&e| self.name(e).to_string()).collect();
                    writeln!(f, "{} = ({})", entry.name, names.join(", "))?;
                }
                TypeNode::Adt { branches } => {
                    let rendered: Vec<String> = branches
                        .iter()
                        .map(|branch| {
                            let fields: Vec<String> = branch
                                .field_types
                                .iter()
                                .map(|&t| self.name(t).to_string())
                                .collect();
                            format!("{} {{{}}}", branch.name, fields.join(", "))
                        })
                        .collect();
                    writeln!(f, "{} = {}", entry.name, rendered.join(" | "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(env: &TypeEnvironment) -> TypeId {
        env.get_type(&"number".into()).unwrap()
    }

    fn symbol(env: &TypeEnvironment) -> TypeId {
        env.get_type(&"symbol".into()).unwrap()
    }

    #[test]
    fn primitives_have_their_kinds() {
        let env = TypeEnvironment::new();
        assert!(env.is_of_kind(number(&env), Kind::Signed));
        assert!(env.is_of_kind(symbol(&env), Kind::Symbol));
        assert!(!env.is_of_kind(number(&env), Kind::Symbol));
    }

    #[test]
    fn subset_kinds_follow_their_base() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let s = symbol(&env);
        let a = env.create_subset("A", n);
        let c = env.create_subset("C", s);

        assert!(env.is_of_kind(a, Kind::Signed));
        assert!(env.is_of_kind(c, Kind::Symbol));
        assert!(!env.is_of_kind(a, Kind::Symbol));
        assert!(!env.is_of_kind(c, Kind::Signed));
    }

    #[test]
    fn union_kind_requires_agreement() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let s = symbol(&env);
        let a = env.create_subset("A", n);
        let b = env.create_subset("B", n);
        let c = env.create_subset("C", s);

        let u = env.create_union("U", vec![a, b]);
        assert!(env.is_of_kind(u, Kind::Signed));
        assert!(!env.is_of_kind(u, Kind::Symbol));

        let u2 = env.create_union("U2", vec![a, b, c]);
        assert!(!env.is_of_kind(u2, Kind::Signed));
        assert!(!env.is_of_kind(u2, Kind::Symbol));
    }

    #[test]
    fn subtyping_is_reflexive_and_respects_bases() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let s = symbol(&env);
        let a = env.create_subset("A", n);
        let b = env.create_subset("B", n);

        assert!(env.is_subtype(n, n));
        assert!(env.is_subtype(a, a));
        assert!(env.is_subtype(a, n));
        assert!(env.is_subtype(b, n));

        assert!(!env.is_subtype(n, s));
        assert!(!env.is_subtype(a, b));
        assert!(!env.is_subtype(b, a));
        assert!(!env.is_subtype(a, s));
        assert!(!env.is_subtype(n, a));
    }

    #[test]
    fn union_subtyping_distributes() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let a = env.create_subset("A", n);
        let b = env.create_subset("B", n);
        let u = env.create_union("U", vec![a, b]);

        assert!(env.is_subtype(u, u));
        assert!(env.is_subtype(a, u));
        assert!(env.is_subtype(b, u));
        assert!(env.is_subtype(u, n));
        assert!(!env.is_subtype(u, a));
        assert!(!env.is_subtype(n, u));
    }

    #[test]
    fn subtyping_is_transitive_through_chains() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let a = env.create_subset("A", n);
        let a1 = env.create_subset("A1", a);
        let a2 = env.create_subset("A2", a1);

        assert!(env.is_subtype(a2, a));
        assert!(env.is_subtype(a2, n));
        assert!(!env.is_subtype(a, a2));
    }

    #[test]
    fn records_are_nominal() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let r1 = env.create_record("R1");
        env.set_record_fields(r1, vec![n, n]);
        let r2 = env.create_record("R2");
        env.set_record_fields(r2, vec![n, n]);

        assert!(env.is_subtype(r1, r1));
        assert!(!env.is_subtype(r1, r2));
        assert!(env.is_of_kind(r1, Kind::Record));
    }

    #[test]
    fn recursive_record_terminates() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let list = env.create_record("List");
        env.set_record_fields(list, vec![n, list]);

        assert!(env.is_of_kind(list, Kind::Record));
        assert!(env.is_subtype(list, list));
        assert!(!env.is_subtype(list, n));
    }

    #[test]
    fn gcs_of_singletons() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let s = symbol(&env);
        let a = env.create_subset("A", n);

        assert_eq!(env.greatest_common_subtypes(a, n), TypeSet::singleton(a));
        assert_eq!(env.greatest_common_subtypes(n, a), TypeSet::singleton(a));
        assert_eq!(env.greatest_common_subtypes(n, n), TypeSet::singleton(n));
        assert!(env.greatest_common_subtypes(n, s).is_empty());
    }

    #[test]
    fn gcs_of_unions_collects_common_elements() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let a = env.create_subset("A", n);
        let b = env.create_subset("B", n);
        let c = env.create_subset("C", n);
        let u1 = env.create_union("U1", vec![a, b]);
        let u2 = env.create_union("U2", vec![b, c]);

        assert_eq!(env.greatest_common_subtypes(u1, u2), TypeSet::singleton(b));
    }

    #[test]
    fn gcs_of_sets_is_pointwise() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let s = symbol(&env);
        let a = env.create_subset("A", n);

        let left = TypeSet::of([a, s]);
        let right = TypeSet::of([n]);
        assert_eq!(
            env.greatest_common_subtypes_of_sets(&left, &right),
            TypeSet::singleton(a)
        );

        assert_eq!(
            env.greatest_common_subtypes_of_sets(&TypeSet::All, &right),
            right
        );
        assert!(env
            .greatest_common_subtypes_of_sets(&TypeSet::empty(), &right)
            .is_empty());
    }

    #[test]
    fn common_supertype_queries() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let s = symbol(&env);
        let a = env.create_subset("A", n);
        let b = env.create_subset("B", n);

        assert!(env.have_common_supertype(a, b));
        assert!(env.have_common_supertype(a, n));
        assert!(!env.have_common_supertype(a, s));
    }

    #[test]
    fn equivalence_via_mutual_subtyping() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let a = env.create_subset("A", n);
        let u = env.create_union("U", vec![a]);

        assert!(env.are_equivalent(a, u));
        assert!(!env.are_equivalent(a, n));
    }

    #[test]
    fn adt_enum_detection_and_branch_ordering() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let e = env.create_adt("E");
        env.set_adt_branches(
            e,
            vec![
                AdtBranch {
                    name: "Z".into(),
                    field_types: vec![],
                },
                AdtBranch {
                    name: "A".into(),
                    field_types: vec![],
                },
            ],
        );
        assert!(env.is_adt_enum(e));
        let names: Vec<&str> = env
            .adt_branches(e)
            .unwrap()
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "Z"]);

        let t = env.create_adt("T");
        env.set_adt_branches(
            t,
            vec![AdtBranch {
                name: "Leaf".into(),
                field_types: vec![n],
            }],
        );
        assert!(!env.is_adt_enum(t));
        assert!(env.is_of_kind(t, Kind::Adt));
    }

    #[test]
    fn qualifier_strings() {
        let mut env = TypeEnvironment::new();
        let n = number(&env);
        let a = env.create_subset("A", n);
        let r = env.create_record("R");
        env.set_record_fields(r, vec![n]);

        assert_eq!(env.type_qualifier(n), "i:number");
        assert_eq!(env.type_qualifier(a), "i:A");
        assert_eq!(env.type_qualifier(r), "r:R");
        assert_eq!(
            env.type_qualifier(env.get_type(&"symbol".into()).unwrap()),
            "s:symbol"
        );
    }
}
