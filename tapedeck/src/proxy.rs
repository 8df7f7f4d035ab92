use crate::{
    error::{Error, Result},
    session::SessionController,
};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, Uri,
};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use tokio::task::JoinHandle;
use tracing::error;

/// A local HTTP server that sends everything it receives through a
/// [`SessionController`], with `upstream` as the origin of the live service.
///
/// Point any HTTP client at [`InterceptionProxy::url`] to record or replay it.
/// The server stops when the proxy is dropped.
#[derive(Debug)]
pub struct InterceptionProxy {
    local_addr: SocketAddr,
    join_handle: JoinHandle<()>,
}

impl InterceptionProxy {
    /// Binds `addr` and serves in the background. Must be called within a tokio runtime.
    pub fn start<S: Into<String>>(
        addr: SocketAddr,
        upstream: S,
        controller: Arc<SessionController>,
    ) -> Result<Self> {
        let upstream: String = upstream.into();
        let upstream = Arc::new(String::from(upstream.trim_end_matches('/')));

        let server = Server::try_bind(&addr)?.serve(make_service_fn(move |_| {
            let controller = controller.clone();
            let upstream = upstream.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |request| {
                    let controller = controller.clone();
                    let upstream = upstream.clone();

                    async move {
                        Ok::<_, Infallible>(handle_request(&controller, &upstream, request).await)
                    }
                }))
            }
        }));
        let local_addr = server.local_addr();

        let join_handle = tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("Interception proxy error: {}", e);
            }
        });

        Ok(Self {
            local_addr,
            join_handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

impl Drop for InterceptionProxy {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

async fn handle_request(
    controller: &SessionController,
    upstream: &str,
    request: Request<Body>,
) -> Response<Body> {
    let result = match upstream_request(upstream, request) {
        Ok(request) => controller.intercept(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            error!("Couldn't handle the intercepted request: {}", e);
            let mut response = Response::new(Body::from(e.to_string()));
            *response.status_mut() = hyper::StatusCode::BAD_GATEWAY;
            response
        }
    }
}

fn upstream_request(upstream: &str, request: Request<Body>) -> Result<Request<Body>> {
    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str())
        .unwrap_or("/");

    parts.uri = format!("{}{}", upstream, path_and_query)
        .parse::<Uri>()
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;

    Ok(Request::from_parts(parts, body))
}
