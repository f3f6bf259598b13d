use http::{
    header::{RANGE, USER_AGENT},
    HeaderMap, HeaderValue, Method, Uri,
};
use url::Url;

pub mod allow_list;
pub mod headers;

pub use allow_list::AllowList;

/// Name of the query parameter carrying the upstream url.
pub const URL_PARAM: &str = "url";

/// Methods the relay answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Get,
    Head,
    Options,
}

impl RelayMethod {
    pub fn from_method(method: &Method) -> Result<Self, RequestError> {
        match *method {
            Method::GET => Ok(Self::Get),
            Method::HEAD => Ok(Self::Head),
            Method::OPTIONS => Ok(Self::Options),
            _ => Err(RequestError::MethodNotAllowed(method.clone())),
        }
    }

    pub fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Head => Method::HEAD,
            Self::Options => Method::OPTIONS,
        }
    }
}

/// Everything the relay needs from an inbound request, parsed once.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub target_url: Url,
    pub method: RelayMethod,
    pub range: Option<HeaderValue>,
    pub user_agent: Option<HeaderValue>,
}

impl ProxyRequest {
    pub fn from_parts(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Self, RequestError> {
        let method = RelayMethod::from_method(method)?;
        let target_url = target_url(uri)?;

        Ok(Self {
            target_url,
            method,
            range: headers.get(RANGE).cloned(),
            user_agent: headers.get(USER_AGENT).cloned(),
        })
    }

    /// Hostname the allow-list is checked against, empty when the url has none.
    pub fn host(&self) -> &str {
        self.target_url.host_str().unwrap_or_default()
    }
}

// Extracts and parses the `url` query parameter.
fn target_url(uri: &Uri) -> Result<Url, RequestError> {
    let raw = uri
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == URL_PARAM)
                .map(|(_, v)| v.into_owned())
        })
        .ok_or(RequestError::MissingUrl)?;

    let url = Url::parse(&raw).map_err(|err| RequestError::InvalidUrl(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(RequestError::InvalidUrl(format!(
            "unsupported scheme {scheme}"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    #[error("missing url parameter")]
    MissingUrl,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
