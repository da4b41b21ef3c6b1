use parse::error::ParseError;
use thiserror::Error;

/// Failures of the define and link pipeline. A class that fails is evicted
/// from the loader; nothing else in the cache is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("could not define {class}: {source}")]
    Parse {
        class: String,
        #[source]
        source: ParseError,
    },

    #[error("requested {requested} but the classfile defines {found}")]
    NameMismatch { requested: String, found: String },

    #[error("{class} depends on {supertype}, which could not be found")]
    MissingSupertype { class: String, supertype: String },

    #[error("linking {class} went deeper than {depth} supertypes")]
    LinkageCycleTooDeep { class: String, depth: usize },

    #[error("{0} is already being defined")]
    ReentrantDefinition(String),

    #[error("{0} is not loaded by this loader")]
    NotLoaded(String),

    #[error("constant #{index} of {class} is not a class reference")]
    DanglingConstantReference { class: String, index: u16 },
}

pub type LoadResult<T> = Result<T, LoadError>;
