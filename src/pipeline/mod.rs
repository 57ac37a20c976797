//! Ordered, short-circuiting middleware chains.
//!
//! A [`VirtualStack`] resolves step names against a [`MiddlewareRegistry`]
//! into a [`Chain`]. Running a chain feeds every step the results of the
//! steps before it and stops at the first [`Rejection`].

pub mod context;
pub mod stack;

pub use context::{RequestContext, StepResults};
pub use stack::{
    Chain, Middleware, MiddlewareRegistry, Rejection, StackError, StepOutcome, VirtualStack,
};
