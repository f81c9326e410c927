//! Handler shapes and type erasure.
//!
//! # What can be registered
//!
//! A route target is either a function or a struct action. Functions come in
//! five shapes, told apart by their parameters:
//!
//! ```text
//! fn() -> R                                  Shape::Bare
//! fn(&mut Context) -> R                      Shape::Context
//! fn(&Request) -> R                          Shape::Request
//! fn(&ResponseWriter) -> R                   Shape::Response
//! fn(&ResponseWriter, &Request) -> R         Shape::ResponseRequest
//! ```
//!
//! where `R: IntoReply`. A struct action is any `T: Action`; its shape is
//! `StructPointer` or `StructValue` depending on whether the method answering
//! the verb takes `&mut self` or `&self`.
//!
//! # How targets are stored
//!
//! Every shape is classified once, at registration, by trait resolution: the
//! marker type `M` in `Handler<M>` records which blanket impl applied. The
//! result is erased into a [`BoxedEndpoint`] so the router holds all routes
//! uniformly:
//!
//! ```text
//! engine.get("/", hello)             ← user writes this
//!        ↓ Handler<(Bare, R)>
//! hello.into_endpoint(setup)         ← blanket impl picks the shape
//!        ↓
//! Arc::new(FnEndpoint { f: hello })  ← stored as Arc<dyn Endpoint>
//!        ↓
//! endpoint.call(ctx)  per request    ← builds the argument list, one vtable call
//! ```
//!
//! A function with any other signature does not implement [`Handler`] and is
//! rejected by the compiler.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::action::{Action, ActionEndpoint, AnyAction};
use crate::context::Context;
use crate::method::Method;
use crate::middleware::compress::CompressType;
use crate::pool::Pools;
use crate::reply::{IntoReply, Render, Reply};
use crate::request::Request;
use crate::response::ResponseWriter;

/// The structural category of a route target. Decides the argument list the
/// dispatcher builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Bare,
    Context,
    Request,
    Response,
    ResponseRequest,
    StructValue,
    StructPointer,
}

impl Shape {
    pub fn is_struct(self) -> bool {
        matches!(self, Self::StructValue | Self::StructPointer)
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// signature of the public [`Handler`] trait. External crates cannot usefully
/// implement it.
#[doc(hidden)]
pub trait Endpoint: Send + Sync + 'static {
    /// The shape `method` is dispatched with, or `None` if this target does
    /// not answer `method`.
    fn shape(&self, method: Method) -> Option<Shape>;

    /// A fresh per-request instance. Only struct actions have one.
    fn instantiate(&self) -> Option<Box<dyn AnyAction>> {
        None
    }

    fn render(&self) -> Render {
        Render::Plain
    }

    fn compress(&self) -> Option<CompressType> {
        None
    }

    fn call(&self, ctx: &mut Context) -> Reply;
}

/// A type-erased route target shared across concurrent requests.
#[doc(hidden)]
pub type BoxedEndpoint = Arc<dyn Endpoint>;

/// Registration-time resources a target may claim (the per-type pools).
#[doc(hidden)]
pub struct Setup<'a> {
    pub(crate) pools: &'a mut Pools,
    pub(crate) pool_size: usize,
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route target.
///
/// You never implement this yourself. It is satisfied by the five function
/// shapes listed in the [module docs](self) and by every [`Action`] type.
/// The `M` parameter is an inference marker naming the shape; it never needs
/// to be written out.
///
/// The trait is **sealed** (via the private `Sealed` supertrait).
pub trait Handler<M>: private::Sealed<M> + Send + 'static {
    #[doc(hidden)]
    fn into_endpoint(self, setup: &mut Setup<'_>) -> BoxedEndpoint;
}

mod private {
    pub trait Sealed<M> {}
}

/// Shape markers. Only used as `Handler<M>` type arguments.
#[doc(hidden)]
pub mod marker {
    pub struct Bare;
    pub struct WithContext;
    pub struct WithRequest;
    pub struct WithResponse;
    pub struct WithResponseRequest;
    pub struct Struct;
}

use marker::{Bare, Struct, WithContext, WithRequest, WithResponse, WithResponseRequest};

// ── Function shapes ───────────────────────────────────────────────────────────

/// Newtype holding a concrete function `F`; `M` remembers its shape.
struct FnEndpoint<F, M> {
    f: F,
    _shape: PhantomData<fn() -> M>,
}

impl<F, M> FnEndpoint<F, M> {
    fn boxed(f: F) -> BoxedEndpoint
    where
        Self: Endpoint,
    {
        Arc::new(Self { f, _shape: PhantomData })
    }
}

macro_rules! function_shape {
    ($marker:ident, $shape:expr, ($($arg:ty),*), |$this:ident, $ctx:ident| $call:expr) => {
        impl<F, R> private::Sealed<($marker, R)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReply + 'static,
        {
        }

        impl<F, R> Handler<($marker, R)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReply + 'static,
        {
            fn into_endpoint(self, _setup: &mut Setup<'_>) -> BoxedEndpoint {
                FnEndpoint::<F, ($marker, R)>::boxed(self)
            }
        }

        impl<F, R> Endpoint for FnEndpoint<F, ($marker, R)>
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReply + 'static,
        {
            fn shape(&self, _method: Method) -> Option<Shape> {
                Some($shape)
            }

            fn call(&self, $ctx: &mut Context) -> Reply {
                let $this = &self.f;
                $call.into_reply()
            }
        }
    };
}

function_shape!(Bare, Shape::Bare, (), |f, _ctx| f());

function_shape!(WithContext, Shape::Context, (&mut Context), |f, ctx| f(ctx));

function_shape!(WithRequest, Shape::Request, (&Request), |f, ctx| {
    let req = ctx.shared_request();
    f(&*req)
});

function_shape!(WithResponse, Shape::Response, (&ResponseWriter), |f, ctx| {
    let w = ctx.response().clone();
    f(&w)
});

function_shape!(WithResponseRequest, Shape::ResponseRequest, (&ResponseWriter, &Request), |f, ctx| {
    let w = ctx.response().clone();
    let req = ctx.shared_request();
    f(&w, &*req)
});

// ── Struct actions ────────────────────────────────────────────────────────────

impl<T: Action> private::Sealed<Struct> for T {}

/// The registered value only names the type: every request gets its own
/// `T::default()` from the type's pool.
impl<T: Action> Handler<Struct> for T {
    fn into_endpoint(self, setup: &mut Setup<'_>) -> BoxedEndpoint {
        let pool = setup.pools.get_or_create::<T>(setup.pool_size);
        Arc::new(ActionEndpoint::<T>::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint<M>(h: impl Handler<M>) -> BoxedEndpoint {
        let mut pools = Pools::default();
        h.into_endpoint(&mut Setup { pools: &mut pools, pool_size: 4 })
    }

    fn bare() -> &'static str { "x" }
    fn with_ctx(_: &mut Context) {}
    fn with_req(req: &Request) -> String { req.path().to_owned() }
    fn with_resp(w: &ResponseWriter) { w.write_str("w"); }
    fn with_both(_: &ResponseWriter, _: &Request) {}

    #[test]
    fn functions_are_classified_by_signature() {
        assert_eq!(endpoint(bare).shape(Method::Get), Some(Shape::Bare));
        assert_eq!(endpoint(with_ctx).shape(Method::Get), Some(Shape::Context));
        assert_eq!(endpoint(with_req).shape(Method::Post), Some(Shape::Request));
        assert_eq!(endpoint(with_resp).shape(Method::Put), Some(Shape::Response));
        assert_eq!(endpoint(with_both).shape(Method::Delete), Some(Shape::ResponseRequest));
    }

    #[test]
    fn closures_are_handlers() {
        assert_eq!(endpoint(|| "closure").shape(Method::Get), Some(Shape::Bare));
        assert!(endpoint(|| "closure").instantiate().is_none());
    }
}
