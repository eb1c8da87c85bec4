use thiserror::Error;

use crate::params::ParamKind;
use crate::uri::UriError;

/// Validation failures raised while building a pipeline request.
///
/// Every variant is raised synchronously at the point of construction of the
/// offending entity; a job parameter set or request document is either fully
/// valid or never produced.
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter name is not a valid POSIX shell variable name.
    #[error("invalid {kind} name: {name}")]
    Name { kind: ParamKind, name: String },

    /// A path or URI failed validation or rewriting.
    #[error(transparent)]
    Uri(#[from] UriError),

    /// Two or more parameters share a name across the job parameter set.
    /// Carries every offending name so all conflicts can be fixed in one
    /// pass.
    #[error("bad job config; duplicate names found: {}", .0.join(", "))]
    Collision(Vec<String>),

    /// The resource specification or a user step is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
