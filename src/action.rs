//! Struct actions.
//!
//! An action is a user type that answers HTTP verbs with methods and receives
//! per-request dependencies through setters. Each request works on its own
//! `T::default()` instance drawn from the type's [`Pool`].
//!
//! ```
//! use rondo::{Action, Methods, Params, Render};
//!
//! #[derive(Default)]
//! struct Greeting {
//!     params: Params,
//! }
//!
//! impl Greeting {
//!     fn get(&mut self) -> String {
//!         format!("hello {}", self.params.get(":name"))
//!     }
//! }
//!
//! impl Action for Greeting {
//!     fn methods(m: &mut Methods<Self>) {
//!         m.get(Self::get)
//!             .inject(|a: &mut Self, p: Params| a.params = p)
//!             .render(Render::Plain);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::handler::{Endpoint, Shape};
use crate::method::Method;
use crate::middleware::compress::CompressType;
use crate::pool::Pool;
use crate::reply::{IntoReply, Render, Reply};

/// A struct route target.
///
/// `methods` is called once, at registration, to build the table the
/// dispatcher consults for every request.
pub trait Action: Default + Send + 'static {
    fn methods(m: &mut Methods<Self>);
}

// ── Method table ──────────────────────────────────────────────────────────────

/// How a verb method borrows the instance.
#[doc(hidden)]
pub enum Receiver<T> {
    /// `fn(&mut self)`: dispatched as [`Shape::StructPointer`].
    Mut(Box<dyn Fn(&mut T) -> Reply + Send + Sync>),
    /// `fn(&self)`: dispatched as [`Shape::StructValue`].
    Ref(Box<dyn Fn(&T) -> Reply + Send + Sync>),
}

impl<T> Receiver<T> {
    fn shape(&self) -> Shape {
        match self {
            Self::Mut(_) => Shape::StructPointer,
            Self::Ref(_) => Shape::StructValue,
        }
    }
}

/// Implemented by methods an action can answer a verb with: `fn(&mut self) -> R`
/// or `fn(&self) -> R`, `R: IntoReply`.
pub trait ActionMethod<T, M>: Send + Sync + 'static {
    #[doc(hidden)]
    fn into_receiver(self) -> Receiver<T>;
}

#[doc(hidden)]
pub struct ByMut;
#[doc(hidden)]
pub struct ByRef;

impl<T, F, R> ActionMethod<T, (ByMut, R)> for F
where
    F: Fn(&mut T) -> R + Send + Sync + 'static,
    R: IntoReply,
{
    fn into_receiver(self) -> Receiver<T> {
        Receiver::Mut(Box::new(move |t| self(t).into_reply()))
    }
}

impl<T, F, R> ActionMethod<T, (ByRef, R)> for F
where
    F: Fn(&T) -> R + Send + Sync + 'static,
    R: IntoReply,
{
    fn into_receiver(self) -> Receiver<T> {
        Receiver::Ref(Box::new(move |t| self(t).into_reply()))
    }
}

type Setter<T> = Box<dyn Fn(&mut T, &dyn Any) + Send + Sync>;
type ContextHook<T> = Box<dyn Fn(&mut T, &mut Context) + Send + Sync>;
type Hook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// The method set of an action type.
pub struct Methods<T> {
    verbs: HashMap<Method, Receiver<T>>,
    fallback: Option<Receiver<T>>,
    setters: HashMap<TypeId, Setter<T>>,
    context: Vec<ContextHook<T>>,
    before: Vec<Hook<T>>,
    after: Vec<Hook<T>>,
    render: Render,
    compress: Option<CompressType>,
}

impl<T: Action> Methods<T> {
    pub(crate) fn build() -> Self {
        let mut m = Self {
            verbs: HashMap::new(),
            fallback: None,
            setters: HashMap::new(),
            context: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            render: Render::Plain,
            compress: None,
        };
        T::methods(&mut m);
        m
    }

    /// Answers `method` with `f`.
    pub fn on<M>(&mut self, method: Method, f: impl ActionMethod<T, M>) -> &mut Self {
        self.verbs.insert(method, f.into_receiver());
        self
    }

    pub fn get<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Get, f) }
    pub fn post<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Post, f) }
    pub fn put<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Put, f) }
    pub fn delete<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Delete, f) }
    pub fn head<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Head, f) }
    pub fn options<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Options, f) }
    pub fn patch<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Patch, f) }
    pub fn trace<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Trace, f) }
    pub fn connect<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self { self.on(Method::Connect, f) }

    /// The default action, used for any registered verb without its own method.
    pub fn fallback<M>(&mut self, f: impl ActionMethod<T, M>) -> &mut Self {
        self.fallback = Some(f.into_receiver());
        self
    }

    /// Declares a setter for dependencies of type `D`. Matching is by exact
    /// type: a setter for `Arc<Request>` is not called with a `Request`.
    pub fn inject<D, F>(&mut self, f: F) -> &mut Self
    where
        D: Clone + 'static,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        let setter: Setter<T> = Box::new(move |t, dep| {
            if let Some(d) = dep.downcast_ref::<D>() {
                f(t, d.clone());
            }
        });
        self.setters.insert(TypeId::of::<D>(), setter);
        self
    }

    /// Declares a hook that receives the request context before dispatch.
    pub fn context(&mut self, f: impl Fn(&mut T, &mut Context) + Send + Sync + 'static) -> &mut Self {
        self.context.push(Box::new(f));
        self
    }

    /// Runs `f` on the forward pass, before the verb method.
    pub fn before(&mut self, f: impl Fn(&mut T) + Send + Sync + 'static) -> &mut Self {
        self.before.push(Box::new(f));
        self
    }

    /// Runs `f` on the unwind, after the verb method.
    pub fn after(&mut self, f: impl Fn(&mut T) + Send + Sync + 'static) -> &mut Self {
        self.after.push(Box::new(f));
        self
    }

    /// Renders structured results and errors as JSON or XML.
    pub fn render(&mut self, render: Render) -> &mut Self {
        self.render = render;
        self
    }

    /// Asks the compression middleware to encode this action's responses.
    pub fn compress(&mut self, kind: CompressType) -> &mut Self {
        self.compress = Some(kind);
        self
    }

    /// Verb method, else the fallback. `HEAD` without either borrows `GET`.
    fn resolve(&self, method: Method) -> Option<&Receiver<T>> {
        self.verbs
            .get(&method)
            .or(self.fallback.as_ref())
            .or_else(|| match method {
                Method::Head => self.verbs.get(&Method::Get),
                _ => None,
            })
    }
}

// ── Per-request instance ──────────────────────────────────────────────────────

/// Object-safe view of one request's action instance.
#[doc(hidden)]
pub trait AnyAction: Send {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Calls the setter declared for `key`, if any.
    fn inject(&mut self, key: TypeId, dep: &dyn Any) -> bool;
    fn set_context(&mut self, ctx: &mut Context);
    fn before(&mut self);
    fn after(&mut self);
    /// Runs the method answering `method`.
    fn call(&mut self, method: Method) -> Option<Reply>;
}

struct Instance<T> {
    value: T,
    methods: Arc<Methods<T>>,
}

impl<T: Action> AnyAction for Instance<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.value
    }

    fn inject(&mut self, key: TypeId, dep: &dyn Any) -> bool {
        match self.methods.setters.get(&key) {
            Some(set) => {
                set(&mut self.value, dep);
                true
            }
            None => false,
        }
    }

    fn set_context(&mut self, ctx: &mut Context) {
        for hook in &self.methods.context {
            hook(&mut self.value, ctx);
        }
    }

    fn before(&mut self) {
        for hook in &self.methods.before {
            hook(&mut self.value);
        }
    }

    fn after(&mut self) {
        for hook in &self.methods.after {
            hook(&mut self.value);
        }
    }

    fn call(&mut self, method: Method) -> Option<Reply> {
        Some(match self.methods.resolve(method)? {
            Receiver::Mut(f) => f(&mut self.value),
            Receiver::Ref(f) => f(&self.value),
        })
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

pub(crate) struct ActionEndpoint<T> {
    methods: Arc<Methods<T>>,
    pool: Arc<Pool<T>>,
}

impl<T: Action> ActionEndpoint<T> {
    pub(crate) fn new(pool: Arc<Pool<T>>) -> Self {
        Self { methods: Arc::new(Methods::build()), pool }
    }

    fn fresh(&self) -> Box<dyn AnyAction> {
        Box::new(Instance { value: self.pool.take(), methods: Arc::clone(&self.methods) })
    }
}

impl<T: Action> Endpoint for ActionEndpoint<T> {
    fn shape(&self, method: Method) -> Option<Shape> {
        self.methods.resolve(method).map(Receiver::shape)
    }

    fn instantiate(&self) -> Option<Box<dyn AnyAction>> {
        Some(self.fresh())
    }

    fn render(&self) -> Render {
        self.methods.render
    }

    fn compress(&self) -> Option<CompressType> {
        self.methods.compress
    }

    fn call(&self, ctx: &mut Context) -> Reply {
        let Some(method) = ctx.verb() else {
            return Reply::Nothing;
        };
        let mut action = ctx.take_action().unwrap_or_else(|| self.fresh());
        let reply = action.call(method).unwrap_or(Reply::Nothing);
        ctx.put_action(action);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;

    #[derive(Default)]
    struct Item {
        params: Params,
        log: Vec<&'static str>,
    }

    impl Item {
        fn get(&mut self) -> &'static str { "get" }
        fn post(&self) -> String { "post".into() }
    }

    impl Action for Item {
        fn methods(m: &mut Methods<Self>) {
            m.get(Self::get)
                .post(Self::post)
                .inject(|a: &mut Self, p: Params| a.params = p)
                .before(|a| a.log.push("before"))
                .after(|a| a.log.push("after"));
        }
    }

    #[derive(Default)]
    struct WithFallback;

    impl Action for WithFallback {
        fn methods(m: &mut Methods<Self>) {
            m.put(|_: &mut Self| "put").fallback(|_: &mut Self| "do");
        }
    }

    #[derive(Default)]
    struct OnlyGet;

    impl Action for OnlyGet {
        fn methods(m: &mut Methods<Self>) {
            m.get(|_: &Self| "only");
        }
    }

    fn endpoint<T: Action>() -> ActionEndpoint<T> {
        ActionEndpoint::new(Arc::new(Pool::new(4)))
    }

    #[test]
    fn receiver_decides_struct_shape() {
        let e = endpoint::<Item>();
        assert_eq!(e.shape(Method::Get), Some(Shape::StructPointer));
        assert_eq!(e.shape(Method::Post), Some(Shape::StructValue));
        assert_eq!(e.shape(Method::Delete), None);
    }

    #[test]
    fn missing_verb_falls_back_to_default_action() {
        let e = endpoint::<WithFallback>();
        let mut a = e.fresh();
        assert!(matches!(a.call(Method::Put), Some(Reply::Text(s)) if s == "put"));
        assert!(matches!(a.call(Method::Patch), Some(Reply::Text(s)) if s == "do"));
    }

    #[test]
    fn head_borrows_get() {
        let e = endpoint::<OnlyGet>();
        assert_eq!(e.shape(Method::Head), Some(Shape::StructValue));
        assert_eq!(e.shape(Method::Post), None);
    }

    #[test]
    fn setters_match_exact_type() {
        let e = endpoint::<Item>();
        let mut a = e.fresh();
        let mut p = Params::new();
        p.push(":id", "9");

        assert!(a.inject(TypeId::of::<Params>(), &p));
        assert!(!a.inject(TypeId::of::<String>(), &String::from("x")));

        let item = a.as_any_mut().downcast_mut::<Item>().unwrap();
        assert_eq!(item.params.get(":id"), "9");
    }

    #[test]
    fn events_run_in_order() {
        let e = endpoint::<Item>();
        let mut a = e.fresh();
        a.before();
        a.call(Method::Get);
        a.after();
        let item = a.as_any_mut().downcast_mut::<Item>().unwrap();
        assert_eq!(item.log, ["before", "after"]);
    }
}
