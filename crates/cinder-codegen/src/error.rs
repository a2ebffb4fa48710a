use thiserror::Error;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Errors found while walking the tree. Like parse errors they abort the
/// whole compilation; nothing is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// A variable read or assigned without a visible declaration.
    #[error("unresolved symbol '{name}'")]
    UnresolvedSymbol { name: String },

    /// A construct the target cannot express here.
    #[error("unsupported construct: {construct}")]
    Unsupported { construct: String },
}

impl CodegenError {
    pub(crate) fn unsupported(construct: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            construct: construct.into(),
        }
    }
}
