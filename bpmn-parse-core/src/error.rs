use crate::diagnostics::DiagnosticReport;

/// Why a compile produced no graphs.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Document is not well-formed or is not a BPMN `definitions` document.
    /// Raised before any semantic pass runs.
    #[error("schema violation in '{resource}' at line {line}: {message}")]
    SchemaViolation {
        resource: String,
        line: u32,
        message: String,
    },

    /// Every semantic error found in the document, reported together once the
    /// walk has finished.
    #[error("{0}")]
    Semantic(DiagnosticReport),

    /// Anything outside the accumulate-then-report path, e.g. a failing
    /// extension hook. Aborts the compile at the point of failure.
    #[error("unexpected failure in '{resource}' while {context}: {source}")]
    Unexpected {
        resource: String,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl CompileError {
    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            CompileError::Semantic(report) => Some(report),
            _ => None,
        }
    }
}

pub type BuildResult<T = ()> = Result<T, CompileError>;
