//! The compilation pipeline.
//!
//! A single-threaded, unidirectional pass sequence over one translation
//! unit: build the type environment, run the inference fixpoint,
//! normalize aggregates, check the program, stratify, and translate to
//! RAM. Passes communicate only through the translation unit and the
//! analysis values the driver owns.
//!
//! Two checkpoints short-circuit the pipeline:
//! - invalid type declarations skip type inference and type checking;
//! - any error recorded before translation skips RAM emission.

pub mod cli;

use strudel_ast::{Program, TranslationUnit};
use strudel_checker::{check_grounded_terms, SemanticChecker, TypeChecker};
use strudel_common::diagnostics::ErrorReport;
use strudel_common::options::Options;
use strudel_solver::{
    PrecedenceGraph, RecursiveClauses, RelationSchedule, SccGraph, TypeAnalysis,
};
use strudel_transform::aggregate_normalization_pipeline;
use strudel_translator::{TranslatorContext, UnitTranslator};
use strudel_types::TypeEnvironmentAnalysis;
use tracing::{debug, info};

pub use cli::Cli;

/// The result of a compilation: the RAM program when no error was
/// recorded, and the full diagnostic report either way.
#[derive(Debug)]
pub struct CompileOutcome {
    pub ram: Option<strudel_ram::Program>,
    pub report: ErrorReport,
}

impl CompileOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.ram.is_some()
    }
}

pub struct Driver {
    pub options: Options,
}

impl Driver {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Driver { options }
    }

    /// Run the full pipeline over a parsed, desugared program.
    #[must_use]
    pub fn compile(&self, program: Program) -> CompileOutcome {
        let mut tu = TranslationUnit::new(program, self.options.clone());

        // type environment and declaration validity
        let env_analysis = TypeEnvironmentAnalysis::run(&tu.program);
        let declarations_valid =
            TypeChecker::check_declarations(&tu.program, &env_analysis, &mut tu.report);
        if !declarations_valid {
            debug!("type declarations invalid; inference and type checking are skipped");
        }

        // aggregate normalization rewrites the program in place
        aggregate_normalization_pipeline().apply(&mut tu);

        // analyses over the transformed program
        let env_analysis = TypeEnvironmentAnalysis::run(&tu.program);
        let type_analysis = if declarations_valid {
            TypeAnalysis::run(&tu.program, env_analysis.env())
        } else {
            TypeAnalysis::empty(env_analysis.env())
        };
        let precedence = PrecedenceGraph::build(&tu.program);
        let sccs = SccGraph::build(&precedence);
        let recursive_clauses = RecursiveClauses::build(&tu.program, &sccs);
        let schedule = RelationSchedule::build(&tu.program, &precedence, &sccs);

        if self.options.shows("type-analysis") {
            info!(environment = %env_analysis.env(), "type analysis");
            for clause in &tu.program.clauses {
                info!(
                    clause = %clause,
                    types = %type_analysis.describe_clause(env_analysis.env(), clause),
                    "clause types"
                );
            }
        }

        // checks run to completion; they only append diagnostics
        let semantic = SemanticChecker {
            program: &tu.program,
            env_analysis: &env_analysis,
            precedence: &precedence,
            sccs: &sccs,
            recursive_clauses: &recursive_clauses,
            options: &self.options,
        };
        semantic.check(&mut tu.report);
        check_grounded_terms(&tu.program, &mut tu.report);
        if declarations_valid {
            let type_checker = TypeChecker {
                program: &tu.program,
                env_analysis: &env_analysis,
                types: &type_analysis,
                options: &self.options,
            };
            type_checker.check_arguments(&mut tu.report);
        }

        // any error blocks translation
        if tu.report.has_errors() {
            return CompileOutcome {
                ram: None,
                report: tu.report,
            };
        }

        let context = TranslatorContext {
            program: &tu.program,
            env: env_analysis.env(),
            types: &type_analysis,
            recursive_clauses: &recursive_clauses,
            sccs: &sccs,
            schedule: &schedule,
            options: &self.options,
        };
        let ram = UnitTranslator::new(&context).translate();
        CompileOutcome {
            ram: Some(ram),
            report: tu.report,
        }
    }
}

/// Compile with default options.
#[must_use]
pub fn compile(program: Program) -> CompileOutcome {
    Driver::new(Options::default()).compile(program)
}
