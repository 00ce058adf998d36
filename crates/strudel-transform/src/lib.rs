//! AST-to-AST rewrites for the strudel Datalog compiler.
//!
//! Transforms rewrite the shared translation unit in place and report
//! whether anything changed. The aggregate normalization sequence is
//! order-sensitive: generators are named first, witnesses are grounded
//! before aggregate bodies are outlined, and local variables are made
//! unique in between.

pub mod ground_witnesses;
pub mod materialize_aggregates;
pub mod normalize_generators;
pub mod unique_aggregate_variables;

use strudel_ast::TranslationUnit;
use tracing::debug;

pub use ground_witnesses::GroundWitnesses;
pub use materialize_aggregates::MaterializeAggregates;
pub use normalize_generators::NormalizeGenerators;
pub use unique_aggregate_variables::UniqueAggregateVariables;

/// A pass rewriting the translation unit.
pub trait Transform {
    fn name(&self) -> &'static str;

    /// Apply the rewrite; returns whether the program changed.
    fn apply(&mut self, tu: &mut TranslationUnit) -> bool;
}

/// Re-run a transform until it reports no change.
pub struct Fixpoint<T: Transform>(pub T);

impl<T: Transform> Transform for Fixpoint<T> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn apply(&mut self, tu: &mut TranslationUnit) -> bool {
        let mut changed = false;
        while self.0.apply(tu) {
            changed = true;
        }
        changed
    }
}

/// Run a sequence of transforms in order.
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Pipeline { transforms }
    }

    pub fn apply(&mut self, tu: &mut TranslationUnit) -> bool {
        let mut changed = false;
        for transform in &mut self.transforms {
            let step_changed = transform.apply(tu);
            debug!(transform = transform.name(), changed = step_changed, "transform applied");
            changed |= step_changed;
        }
        changed
    }
}

/// The aggregate normalization sequence in its pinned order. Generator
/// naming runs a second time after witness grounding: the copied
/// aggregates that ground a witness land inside atom arguments and must
/// be extracted into `v = <generator>` bindings like any other.
#[must_use]
pub fn aggregate_normalization_pipeline() -> Pipeline {
    Pipeline::new(vec![
        Box::new(NormalizeGenerators),
        Box::new(GroundWitnesses),
        Box::new(NormalizeGenerators),
        Box::new(UniqueAggregateVariables),
        Box::new(Fixpoint(MaterializeAggregates)),
    ])
}
