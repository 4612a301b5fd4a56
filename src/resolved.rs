//! Lazy resolution outcomes returned by `Container::resolve`/`resolve_trait`
//! (spec.md §6/§7): the call itself never fails — only accessing the
//! produced value can, panicking with the pretty-printed construction log.
//! `Container::create` is the eager counterpart and stays `Result`-based.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::builder::ContainerService;
use crate::container::{downcast, sealed_error};
use crate::error::{DiError, DiResult};
use crate::log::render_log;
use crate::AnyArc;

/// Either a sealed resolution tree, or a request that was rejected before
/// resolution even started (a malformed contract stack) — kept distinct so
/// the original `DiError` variant (`DuplicateContract`/`EmptyContract`)
/// survives instead of collapsing into the generic `Unresolved`.
pub(crate) enum SealedOutcome {
    Sealed(Arc<ContainerService>),
    Rejected(DiError),
}

impl SealedOutcome {
    fn is_ok(&self) -> bool {
        matches!(self, SealedOutcome::Sealed(sealed) if sealed.is_ok())
    }

    fn log(&self) -> String {
        match self {
            SealedOutcome::Sealed(sealed) => render_log(sealed),
            SealedOutcome::Rejected(e) => e.to_string(),
        }
    }

    fn single(&self) -> DiResult<AnyArc> {
        match self {
            SealedOutcome::Rejected(e) => Err(e.clone()),
            SealedOutcome::Sealed(sealed) if sealed.is_ok() => sealed.single_instance(),
            SealedOutcome::Sealed(sealed) => Err(sealed_error(sealed)),
        }
    }

    fn all(&self) -> DiResult<Vec<AnyArc>> {
        match self {
            SealedOutcome::Rejected(e) => Err(e.clone()),
            SealedOutcome::Sealed(sealed) if sealed.is_ok() => Ok(sealed.get_all_values()),
            SealedOutcome::Sealed(sealed) => Err(sealed_error(sealed)),
        }
    }
}

/// A lazy resolution of a concrete `T`, returned by `Container::resolve`.
pub struct ResolvedService<T: 'static> {
    outcome: SealedOutcome,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ResolvedService<T> {
    pub(crate) fn sealed(sealed: Arc<ContainerService>) -> Self {
        Self { outcome: SealedOutcome::Sealed(sealed), _marker: PhantomData }
    }

    pub(crate) fn rejected(err: DiError) -> Self {
        Self { outcome: SealedOutcome::Rejected(err), _marker: PhantomData }
    }

    /// Whether the underlying resolution succeeded — check this before
    /// calling `instance`/`instances` to avoid the panic.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The human-readable construction log, regardless of outcome.
    pub fn log(&self) -> String {
        self.outcome.log()
    }

    /// The single produced instance. Panics, with the construction log,
    /// if resolution failed or produced zero/many instances.
    pub fn instance(&self) -> Arc<T> {
        self.try_instance().unwrap_or_else(|e| panic!("{e}"))
    }

    /// Non-panicking form of [`Self::instance`].
    pub fn try_instance(&self) -> DiResult<Arc<T>> {
        downcast(self.outcome.single()?)
    }

    /// Every produced instance. Panics, with the construction log, if
    /// resolution itself failed.
    pub fn instances(&self) -> Vec<Arc<T>> {
        self.try_instances().unwrap_or_else(|e| panic!("{e}"))
    }

    /// Non-panicking form of [`Self::instances`].
    pub fn try_instances(&self) -> DiResult<Vec<Arc<T>>> {
        self.outcome.all()?.into_iter().map(downcast::<T>).collect()
    }
}

/// A lazy resolution of interface `I`, returned by `Container::resolve_trait`.
/// See [`crate::Container::resolve_trait`] for why `I` can't go through
/// [`ResolvedService`] directly.
pub struct ResolvedTrait<I: ?Sized + 'static> {
    outcome: SealedOutcome,
    _marker: PhantomData<fn() -> *const I>,
}

impl<I: ?Sized + 'static> ResolvedTrait<I> {
    pub(crate) fn sealed(sealed: Arc<ContainerService>) -> Self {
        Self { outcome: SealedOutcome::Sealed(sealed), _marker: PhantomData }
    }

    pub(crate) fn rejected(err: DiError) -> Self {
        Self { outcome: SealedOutcome::Rejected(err), _marker: PhantomData }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn log(&self) -> String {
        self.outcome.log()
    }

    pub fn instance(&self) -> Arc<I> {
        self.try_instance().unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_instance(&self) -> DiResult<Arc<I>> {
        unwrap_trait_object(self.outcome.single()?)
    }

    pub fn instances(&self) -> Vec<Arc<I>> {
        self.try_instances().unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_instances(&self) -> DiResult<Vec<Arc<I>>> {
        self.outcome.all()?.into_iter().map(unwrap_trait_object::<I>).collect()
    }
}

/// `Any::downcast` only recovers a `Sized` target, and `I` is typically
/// `dyn Trait`; the instance is stored as `Arc::new(coerced) as AnyArc`
/// where `coerced: Arc<I>`, so this downcasts to `Arc<I>` itself (a fat
/// pointer, hence `Sized`) and unwraps one layer.
fn unwrap_trait_object<I: ?Sized + 'static>(any: AnyArc) -> DiResult<Arc<I>> {
    any.downcast::<Arc<I>>().map(|boxed| (*boxed).clone()).map_err(|_| DiError::TypeMismatch(std::any::type_name::<I>()))
}
