use std::{io, pin::pin, sync::Arc};

use common::{
    headers::{apply_cors, filter_hop_by_hop_headers},
    ProxyRequest, RelayMethod,
};
use http::{
    header::{RANGE, USER_AGENT},
    HeaderMap, Method, Request, Response, StatusCode, Uri,
};
use hyper::body::Bytes;
use tokio::{
    sync::mpsc::{self, Receiver},
    time::timeout,
};
use tokio_stream::StreamExt;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::{
    body::{empty, RelayBody, ResponseBody},
    Error, RelayConfig,
};

/// Forwards media requests to allow-listed upstream hosts and streams the
/// answer back.
///
/// Cheap to clone, every clone shares the same config and connection pool.
#[derive(Debug, Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
    client: reqwest::Client,
}

enum Outcome {
    Preflight,
    Upstream(reqwest::Response),
}

impl Relay {
    /// Fails only when the HTTP client can't be built (e.g. no TLS backend).
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(config.timeout);
        for (host, addr) in &config.resolve {
            builder = builder.resolve(host, *addr);
        }

        Ok(Self {
            client: builder.build()?,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Answers one inbound request.
    ///
    /// `cancel` is cancelled when this future or the returned body is dropped,
    /// and cancelling it from outside stops the transfer as well. Either way
    /// the upstream request is released.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        cancel: CancellationToken,
    ) -> Response<ResponseBody> {
        let guard = cancel.clone().drop_guard();
        // the relay never reads inbound bodies
        let (head, _) = req.into_parts();

        match self
            .open(&head.method, &head.uri, &head.headers, &cancel)
            .await
        {
            Ok(Outcome::Preflight) => {
                guard.disarm();
                preflight()
            }
            Ok(Outcome::Upstream(upstream)) => {
                forward(upstream, cancel, guard, self.config.channel_capacity)
            }
            Err(err) => {
                guard.disarm();
                match &err {
                    Error::UpstreamConnect(_) | Error::UpstreamTimeout(_) => {
                        warn!("upstream unreachable: {err}")
                    }
                    _ => debug!("rejecting request: {err}"),
                }
                err.into_response()
            }
        }
    }

    async fn open(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Outcome, Error> {
        if RelayMethod::from_method(method)? == RelayMethod::Options {
            return Ok(Outcome::Preflight);
        }

        let request = ProxyRequest::from_parts(method, uri, headers)?;
        if !self.config.allow_list.allows(request.host()) {
            return Err(Error::HostNotAllowed(request.host().to_owned()));
        }

        self.connect(&request, cancel).await.map(Outcome::Upstream)
    }

    async fn connect(
        &self,
        request: &ProxyRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        let user_agent = request
            .user_agent
            .clone()
            .unwrap_or_else(|| self.config.user_agent.clone());

        let mut builder = self
            .client
            .request(request.method.as_method(), request.target_url.clone())
            .header(USER_AGENT, user_agent);
        if let Some(range) = &request.range {
            builder = builder.header(RANGE, range.clone());
        }

        debug!(url = %request.target_url, range = ?request.range, "connecting to upstream");

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = timeout(self.config.timeout, builder.send()) => {
                let upstream = res??;
                debug!(status = %upstream.status(), "upstream answered");
                Ok(upstream)
            }
        }
    }
}

fn preflight() -> Response<ResponseBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    apply_cors(response.headers_mut());
    response
}

fn forward(
    upstream: reqwest::Response,
    cancel: CancellationToken,
    guard: DropGuard,
    capacity: usize,
) -> Response<ResponseBody> {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    filter_hop_by_hop_headers(&mut headers);
    apply_cors(&mut headers);

    let rx = spawn_pump(upstream, cancel, capacity);

    let mut response = Response::new(ResponseBody::new(RelayBody::new(rx, guard)));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

// Moves upstream body chunks into a bounded channel until the body ends,
// fails, or the request is cancelled. The upstream response is dropped
// when this task returns.
fn spawn_pump(
    upstream: reqwest::Response,
    cancel: CancellationToken,
    capacity: usize,
) -> Receiver<io::Result<Bytes>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let mut body = pin!(upstream.bytes_stream());
        let mut total = 0;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(total, "client went away, dropping upstream");
                    return;
                }
                chunk = body.next() => chunk,
            };

            let item = match chunk {
                None => {
                    debug!(total, "upstream body complete");
                    return;
                }
                Some(Ok(chunk)) => {
                    total += chunk.len();
                    Ok(chunk)
                }
                Some(Err(err)) => {
                    warn!(total, "upstream body failed: {err}");
                    Err(io::Error::other(err))
                }
            };
            let failed = item.is_err();

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(total, "client went away, dropping upstream");
                    return;
                }
                res = tx.send(item) => {
                    if res.is_err() || failed {
                        return;
                    }
                }
            }
        }
    });

    rx
}
