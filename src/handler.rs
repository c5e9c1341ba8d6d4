//! Handler trait and type erasure.
//!
//! The router stores handlers of *different* concrete types in one table, so
//! each registered `async fn` is erased behind `Arc<dyn ErasedHandler>`. The
//! path from user code to dispatch is:
//!
//! ```text
//! async fn get_task(req: Request) -> Response { … }
//!        ↓ router.get("/tasks/{id}", get_task)
//! Arc::new(FnHandler(get_task))        stored as BoxedHandler
//!        ↓ at request time
//! handler.call(req)                    one Arc clone + one vtable call
//!        ↓
//! Box::pin(async { get_task(req).await.into_response() })
//! ```
//!
//! The per-request cost is one atomic increment and one virtual call,
//! negligible next to network I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future resolving to a [`Response`].
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send +
/// 'static` so tokio may move it across worker threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it leaks through the
/// return type of [`Handler::into_boxed_handler`]. External crates cannot do
/// anything useful with it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself; it is automatically satisfied for any
/// `async fn name(req: Request) -> impl IntoResponse` (and for closures with
/// that shape). The trait is sealed via the private `Sealed` supertrait, so
/// the blanket impl below is the only way in and the API surface stays
/// stable.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` into the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
