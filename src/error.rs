//! Error types for the dependency injection resolution engine.

use std::fmt;

/// Dependency injection errors.
///
/// Represents the error conditions that can occur during service
/// registration, resolution, or container operations.
///
/// `Circular`/`WrongLifestyle`/`DepthExceeded` are never constructed by
/// hand — the engine classifies a failed resolution's root cause into one
/// of these from the construction log (see `container::sealed_error`) and
/// falls back to the general-purpose `Unresolved` when nothing more
/// specific applies.
///
/// # Examples
///
/// ```rust
/// use reflective_di::DiError;
///
/// let not_found = DiError::NotFound("MyService");
/// let circular = DiError::Circular("A -> B -> A".to_string());
/// println!("Error: {}", not_found);
/// println!("Error: {}", circular);
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// No configuration/implementation was found for the requested service.
    NotFound(&'static str),
    /// A constructed value could not be downcast to the expected type.
    TypeMismatch(&'static str),
    /// A cyclic dependency was detected; the message is the pretty-printed path.
    Circular(String),
    /// A contract name appeared twice (case-insensitively) on one stack.
    DuplicateContract(String),
    /// An empty contract name was supplied.
    EmptyContract,
    /// More than one implementation satisfies a non-enumerable request.
    ManyImplementations(&'static str),
    /// A resolution ended in `Error` or `DependencyError` status.
    ///
    /// Carries the pretty-printed construction log so callers can see why.
    Unresolved {
        type_name: &'static str,
        log: String,
    },
    /// `create` was asked to bypass the container cache for a type that is
    /// only resolvable as a singleton, or `resolve` was asked to produce a
    /// `PerRequest`-marked type.
    WrongLifestyle(&'static str),
    /// Maximum recursion depth exceeded (defensive bound, not expected in practice).
    DepthExceeded(usize),
    /// One or more disposal hooks failed during `Container::dispose`; each
    /// entry is one hook's rendered error, collected rather than
    /// short-circuited so a single bad disposable can't mask the rest.
    Aggregate(Vec<String>),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotFound(name) => write!(f, "no implementations for {}", name),
            DiError::TypeMismatch(name) => write!(f, "type mismatch for: {}", name),
            DiError::Circular(path) => write!(f, "cyclic dependency {}", path),
            DiError::DuplicateContract(stack) => {
                write!(f, "invalid contracts {} - duplicates found", stack)
            }
            DiError::EmptyContract => write!(f, "contract name must not be empty"),
            DiError::ManyImplementations(name) => {
                write!(f, "many implementations for [{}]", name)
            }
            DiError::Unresolved { type_name, log } => {
                write!(f, "failed to resolve {}\n{}", type_name, log)
            }
            DiError::WrongLifestyle(msg) => write!(f, "lifestyle error: {}", msg),
            DiError::DepthExceeded(depth) => write!(f, "max depth {} exceeded", depth),
            DiError::Aggregate(errors) => {
                write!(f, "{} disposal error(s): {}", errors.len(), errors.join("; "))
            }
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;
