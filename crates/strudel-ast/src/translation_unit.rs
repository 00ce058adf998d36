//! The unit of compilation shared by all passes.

use strudel_common::diagnostics::ErrorReport;
use strudel_common::options::Options;

use crate::program::Program;

/// A program together with the diagnostic sink and the compiler options.
///
/// Every pass reads or rewrites the program and appends diagnostics;
/// passes communicate through nothing else.
#[derive(Debug)]
pub struct TranslationUnit {
    pub program: Program,
    pub report: ErrorReport,
    pub options: Options,
}

impl TranslationUnit {
    #[must_use]
    pub fn new(program: Program, options: Options) -> Self {
        let report = if options.no_warn {
            ErrorReport::without_warnings()
        } else {
            ErrorReport::new()
        };
        TranslationUnit {
            program,
            report,
            options,
        }
    }
}
