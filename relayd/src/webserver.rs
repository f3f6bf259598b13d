use std::{convert::Infallible, future::Future, net::SocketAddr, pin::Pin};

use common::headers::apply_cors;
use http::{Request, Response, StatusCode};
use hyper::{body::Incoming, server::conn::http1, service};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    body::{full, ResponseBody},
    tls::{self, Certs, MaybeTls},
    Relay,
};

pub async fn run(addr: SocketAddr, certs: Option<Certs>, relay: Relay) -> anyhow::Result<()> {
    let tls_acceptor = certs.map(tls::acceptor).transpose()?;

    let listener = TcpListener::bind(&addr).await?;
    debug!(
        "Relay listening on {}://{}{}",
        if tls_acceptor.is_some() { "https" } else { "http" },
        addr,
        relay.config().route
    );

    serve(listener, tls_acceptor, relay).await
}

/// Accepts connections forever, one task per connection.
pub async fn serve(
    listener: TcpListener,
    tls_acceptor: Option<TlsAcceptor>,
    relay: Relay,
) -> anyhow::Result<()> {
    let service = Service::new(relay);
    loop {
        let (stream, peer) = listener.accept().await?;

        tokio::spawn({
            let tls_acceptor = tls_acceptor.clone();
            let service = service.clone();
            async move {
                let io = match tls_acceptor {
                    Some(tls_acceptor) => match tls_acceptor.accept(stream).await {
                        Ok(stream) => MaybeTls::Left(stream),
                        Err(err) => {
                            error!(%peer, "failed to perform tls handshake: {err}");
                            return;
                        }
                    },
                    None => MaybeTls::Right(stream),
                };

                if let Err(err) = http1::Builder::new()
                    .serve_connection(TokioIo::new(io), service)
                    .await
                {
                    // a client hanging up mid-stream lands here too
                    debug!(%peer, "connection closed with error: {err}");
                }
            }
        });
    }
}

#[derive(Debug, Clone)]
struct Service {
    relay: Relay,
}

impl Service {
    fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

impl service::Service<Request<Incoming>> for Service {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        debug!("Received request {} {}", req.method(), req.uri());

        if req.uri().path() != self.relay.config().route {
            return Box::pin(async { Ok(not_found()) });
        }

        let relay = self.relay.clone();
        Box::pin(async move { Ok(relay.handle(req, CancellationToken::new()).await) })
    }
}

fn not_found() -> Response<ResponseBody> {
    let mut response = Response::new(full("Not found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    apply_cors(response.headers_mut());
    response
}
