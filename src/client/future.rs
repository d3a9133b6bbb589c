use std::time::Duration;

use futures::future::{self, Either, Future, IntoFuture};
use futures::Poll;
use tokio_core::reactor::{Handle, Timeout};

use errors::{Error, ErrorKind};

/// A boxed future with erased concrete type, the common currency of the
/// client's public surface.
pub struct StaticBoxFuture<T = (), E = Error>(Box<Future<Item = T, Error = E> + 'static>)
    where T: 'static,
          E: 'static;

impl<T, E> StaticBoxFuture<T, E> {
    pub fn new<F>(inner: F) -> Self
        where F: IntoFuture<Item = T, Error = E> + 'static,
              F::Future: 'static,
              T: 'static,
              E: 'static
    {
        StaticBoxFuture(Box::new(inner.into_future()))
    }

    pub fn ok(item: T) -> Self {
        StaticBoxFuture(Box::new(future::ok(item)))
    }

    pub fn err(err: E) -> Self {
        StaticBoxFuture(Box::new(future::err(err)))
    }
}

impl<T, E> From<ErrorKind> for StaticBoxFuture<T, E>
    where E: From<ErrorKind>
{
    fn from(err: ErrorKind) -> Self {
        Self::err(err.into())
    }
}

impl<T, E> Future for StaticBoxFuture<T, E> {
    type Item = T;
    type Error = E;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        self.0.poll()
    }
}

pub trait ToStaticBoxFuture<T, E> {
    fn static_boxed(self) -> StaticBoxFuture<T, E>;
}

impl<F, T, E> ToStaticBoxFuture<T, E> for F
    where F: Future<Item = T, Error = E> + 'static,
          T: 'static,
          E: 'static
{
    fn static_boxed(self) -> StaticBoxFuture<T, E> {
        StaticBoxFuture::new(self)
    }
}

/// Race a future against a reactor timeout.
pub fn with_deadline<F>(future: F,
                        duration: Duration,
                        handle: &Handle,
                        reason: &'static str)
                        -> StaticBoxFuture<F::Item>
    where F: Future<Error = Error> + 'static,
          F::Item: 'static
{
    match Timeout::new(duration, handle) {
        Ok(timeout) => {
            future
                .select2(timeout)
                .then(move |result| match result {
                          Ok(Either::A((item, _))) => Ok(item),
                          Ok(Either::B(((), _))) => {
                              Err(ErrorKind::RequestTimeout(reason).into())
                          }
                          Err(Either::A((err, _))) => Err(err),
                          Err(Either::B((err, _))) => Err(err.into()),
                      })
                .static_boxed()
        }
        Err(err) => {
            warn!("fail to create timeout, {}", err);

            future.static_boxed()
        }
    }
}
