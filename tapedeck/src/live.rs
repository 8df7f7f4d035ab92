use crate::{
    data::{Headers, RequestDescriptor, ResponseDescriptor},
    error::{Error, Result},
};
use hyper::{
    body::{self, Bytes},
    header::{HeaderName, HeaderValue},
    Body, HeaderMap, Request, Response,
};

/// An intercepted request whose body can be read any number of times.
///
/// The first call to [`LiveRequest::descriptor`] drains the body stream, then puts
/// an identical body back on the request so it can still be forwarded.
#[derive(Debug)]
pub struct LiveRequest {
    request: Request<Body>,
    body: Option<Bytes>,
    descriptor: Option<RequestDescriptor>,
}

impl LiveRequest {
    pub fn new(request: Request<Body>) -> Self {
        Self {
            request,
            body: None,
            descriptor: None,
        }
    }

    pub async fn descriptor(&mut self) -> Result<RequestDescriptor> {
        if let Some(descriptor) = &self.descriptor {
            return Ok(descriptor.clone());
        }

        let bytes = self.body_bytes().await?;
        let descriptor = RequestDescriptor {
            method: self.request.method().to_string(),
            url: self.request.uri().to_string(),
            headers: extract_headers(self.request.headers()),
            body: if bytes.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&bytes).into())
            },
        };

        self.descriptor = Some(descriptor.clone());
        Ok(descriptor)
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn into_request(self) -> Request<Body> {
        self.request
    }

    async fn body_bytes(&mut self) -> Result<Bytes> {
        if let Some(bytes) = &self.body {
            return Ok(bytes.clone());
        }

        let bytes = body::to_bytes(self.request.body_mut())
            .await
            .map_err(|_| Error::InvalidBody)?;
        *self.request.body_mut() = Body::from(bytes.clone());
        self.body = Some(bytes.clone());

        Ok(bytes)
    }
}

pub fn extract_headers(header_map: &HeaderMap) -> Headers {
    // it currently ignores header values with opaque characters
    header_map
        .iter()
        .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str()))
        .filter_map(|(key, value)| value.ok().map(|v| (key, String::from(v))))
        .collect()
}

pub fn put_headers<'a, I: IntoIterator<Item = (&'a String, &'a String)>>(
    header_map: &mut HeaderMap<HeaderValue>,
    headers: I,
) -> Result<()> {
    for (key, value) in headers {
        let header_name = HeaderName::from_lowercase(key.to_lowercase().as_bytes())?;
        let header_value = HeaderValue::from_str(value)?;
        header_map.append(header_name, header_value);
    }

    Ok(())
}

/// Builds a request that carries the descriptor's method, URL, headers and body.
pub fn into_request(descriptor: &RequestDescriptor) -> Result<Request<Body>> {
    let mut request_builder = Request::builder()
        .uri(descriptor.url.as_str())
        .method(descriptor.method.as_str());

    if let Some(headers_mut) = request_builder.headers_mut() {
        put_headers(
            headers_mut,
            descriptor
                .headers
                .iter()
                .filter(|(header_name, _)| !is_hop_by_hop(header_name)),
        )?;
    }

    let body = descriptor.body.clone().map(Body::from).unwrap_or_else(Body::empty);

    Ok(request_builder.body(body)?)
}

pub fn into_response(descriptor: &ResponseDescriptor) -> Result<Response<Body>> {
    let mut response_builder = Response::builder().status(descriptor.status);

    put_headers(
        response_builder.headers_mut().ok_or(Error::InvalidBody)?,
        descriptor
            .headers
            .iter()
            // the body is always written in one piece
            .filter(|(key, _)| !is_hop_by_hop(key) && key.as_str() != "content-length"),
    )?;

    Ok(response_builder.body(descriptor.body.clone().into())?)
}

pub async fn read_response(response: Response<Body>) -> Result<ResponseDescriptor> {
    let status = response.status().as_u16();
    let headers = extract_headers(response.headers());
    let body = body::to_bytes(response.into_body())
        .await
        .map_err(|e| Error::Transport(Box::new(e)))?;

    Ok(ResponseDescriptor {
        status,
        headers,
        body: String::from_utf8_lossy(&body).into(),
    })
}

fn is_hop_by_hop(header_name: &str) -> bool {
    matches!(
        header_name.to_lowercase().as_str(),
        "host" | "connection" | "transfer-encoding" | "keep-alive" | "upgrade"
    )
}
