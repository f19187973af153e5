use anyhow::{Context, Result};
use std::marker::PhantomData;

/// Defines the core `Transform` trait for composable data processing pipelines.
///
/// The `Transform<I, O>` trait represents an operation converting an input of
/// type `I` to an output of type `O`. Randomized transforms draw from the
/// thread-local RNG slot, which the loader fills with its own RNG while it
/// fetches (see [`crate::dataloader::with_scoped_rng`]), so the trait itself
/// stays `&self`.
///
/// Steps chain statically via `.then(...)`, or dynamically via [`Compose`]
/// when the pipeline shape depends on configuration.
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

/// A chain of two transforms (`A` -> `B`)
/// - `PhantomData<M>` enforces intermediate type alignment.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>()
                )
            })
    }
}

/// An ordered list of same-type transforms assembled at runtime.
///
/// An empty `Compose` is the identity.
pub struct Compose<I> {
    steps: Vec<(&'static str, Box<dyn Transform<I, I>>)>,
}

impl<I> Default for Compose<I> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<I> Compose<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    pub fn push<T>(mut self, step: T) -> Self
    where
        T: Transform<I, I> + 'static,
    {
        self.steps
            .push((std::any::type_name::<T>(), Box::new(step)));
        self
    }

    /// Appends a step only when `enabled`.
    pub fn push_if<T>(self, enabled: bool, step: impl FnOnce() -> Result<T>) -> Result<Self>
    where
        T: Transform<I, I> + 'static,
    {
        Ok(if enabled { self.push(step()?) } else { self })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Type names of the steps, in order.
    pub fn step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|(name, _)| *name)
    }
}

impl<I> Transform<I, I> for Compose<I> {
    fn apply(&self, input: I) -> Result<I> {
        self.steps.iter().try_fold(input, |value, (name, step)| {
            step.apply(value)
                .with_context(|| format!("Pipeline step failed: {}", name))
        })
    }
}
