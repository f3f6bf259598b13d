use std::{
    convert::Infallible,
    io,
    pin::Pin,
    task::{Context, Poll},
};

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::{Body, Bytes, Frame};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::DropGuard;

/// Body type of every response the relay produces.
pub type ResponseBody = BoxBody<Bytes, io::Error>;

pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into()).map_err(never).boxed()
}

pub fn empty() -> ResponseBody {
    Empty::new().map_err(never).boxed()
}

fn never(never: Infallible) -> io::Error {
    match never {}
}

/// Streams the chunks a pump task receives from upstream.
///
/// Holds the request's cancellation guard: when the server drops the body
/// (client disconnected, or the response is done) the token is cancelled and
/// the pump lets go of the upstream connection.
#[derive(Debug)]
pub struct RelayBody {
    rx: Receiver<io::Result<Bytes>>,
    _guard: DropGuard,
}

impl RelayBody {
    pub fn new(rx: Receiver<io::Result<Bytes>>, guard: DropGuard) -> Self {
        Self { rx, _guard: guard }
    }
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut()
            .rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|res| res.map(Frame::data)))
    }
}
