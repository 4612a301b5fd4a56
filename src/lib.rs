//! # reflective-di
//!
//! A reflective dependency-injection resolution engine: contract-scoped
//! service identity, at-most-one-construction caching, cycle detection, and
//! union-contract fan-out — built around the same narrow seams a runtime
//! reflection layer would occupy in a language that has one.
//!
//! Rust has no runtime reflection, so constructor discovery and
//! inheritance scanning are represented as traits
//! ([`TypeIntrospector`], [`InheritanceIndex`]) backed by explicit,
//! ahead-of-time registration through [`ContainerBuilder`] rather than by
//! scanning assemblies.
//!
//! ## Quick start
//!
//! ```
//! use reflective_di::{ContainerBuilder, ParameterInfo, ServiceConfiguration};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_constructor::<Database>(vec![], |_args| {
//!     Arc::new(Database { connection_string: "postgres://localhost".into() })
//! });
//! builder.register_configuration::<Database>(&[], ServiceConfiguration::new()).unwrap();
//! builder.register_constructor::<UserService>(
//!     vec![ParameterInfo::new("db", reflective_di::TypeRef::of::<Database>())],
//!     |args| Arc::new(UserService { db: args[0].clone().downcast::<Database>().unwrap() }),
//! );
//! builder.register_configuration::<UserService>(&[], ServiceConfiguration::new()).unwrap();
//!
//! let container = builder.build();
//! let user_service = container.resolve::<UserService>(&[]).instance();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Contract scoping
//!
//! Every resolution is keyed by a type *and* an ordered stack of contract
//! names. Two requests for the same type under different contracts (or the
//! same contracts in a different order) are distinct identities and never
//! share a cached instance — see [`ServiceName`].

mod arguments;
mod builder;
mod cache;
mod configuration;
mod container;
mod context;
mod contracts;
mod error;
mod instantiator;
mod introspection;
mod lifecycle;
mod log;
mod observer;
mod registration;
mod resolved;
mod resolver;
mod runner;
mod service_name;

use std::any::Any;
use std::sync::Arc;

/// Any resolvable instance, boxed for storage in the cache and for
/// constructor-argument passing. Downcasting to a concrete `T` happens at
/// the public API boundary ([`Container::resolve`]).
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub use arguments::ArgumentsMap;
pub use configuration::{ConfigurationRegistry, ParameterOverride, ServiceConfiguration};
pub use container::Container;
pub use error::{DiError, DiResult};
pub use introspection::{ConstructorError, ConstructorInfo, InheritanceIndex, ParamAttributes, ParameterInfo, TypeIntrospector};
pub use lifecycle::AsyncDisposable;
pub use observer::{DiObserver, LoggingObserver};
pub use registration::ContainerBuilder;
pub use resolved::{ResolvedService, ResolvedTrait};
pub use runner::Runner;
pub use service_name::{ContractName, ContractStack, ServiceName, TypeRef};
