mod gate;
mod job;
mod mutation;
mod poll;
mod queries;
mod rest;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;
pub use crate::gate::*;
pub use crate::job::*;
pub use crate::mutation::*;
pub use crate::poll::*;
pub use crate::queries::*;
pub use crate::rest::*;
pub use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;
use thiserror::Error;
use ureq::{
    Agent, SendBody,
    http::{
        Request,
        header::{HeaderValue, InvalidHeaderValue},
    },
    middleware::MiddlewareNext,
};
use url::Url;

pub static GRAPHQL_ENDPOINT: &str = "/api/graphql";

static USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_REPOSITORY"),
    ")",
);

pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => panic!("page size must be nonzero"),
};

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the delete safety gate applies to a destructive operation
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum DeleteSafety {
    #[default]
    Enforce,
    Disabled,
}

impl DeleteSafety {
    pub fn from_disable_flag(disable: bool) -> DeleteSafety {
        if disable {
            DeleteSafety::Disabled
        } else {
            DeleteSafety::Enforce
        }
    }
}

/// Anything that can send a single GraphQL request to Dewrangle.
///
/// `Client` is the real implementation; tests substitute a scripted one.
pub trait Executor {
    fn base_url(&self) -> &str;

    fn send(&self, payload: QueryPayload) -> Result<JsonMap, QueryError>;

    /// Run `query`, refusing destructive operations against non-local hosts
    /// unless `safety` is [`DeleteSafety::Disabled`].
    fn execute<Q: Query>(&self, query: &Q, safety: DeleteSafety) -> Result<Q::Output, QueryError> {
        if query.is_destructive() && safety == DeleteSafety::Enforce {
            check_delete_allowed(self.base_url())?;
        }
        let data = self.send(query.payload())?;
        query.parse_response(data).map_err(Into::into)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    base_url: Url,
    token: String,
    execution_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: Option<&str>,
        token: Option<&str>,
    ) -> Result<ClientConfig, BuildClientError> {
        let base_url = base_url.filter(|s| !s.trim().is_empty());
        let token = token.filter(|s| !s.trim().is_empty());
        let (Some(base_url), Some(token)) = (base_url, token) else {
            return Err(BuildClientError::MissingConfig);
        };
        let url = Url::parse(base_url).map_err(|source| BuildClientError::BaseUrl {
            url: base_url.to_owned(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BuildClientError::Scheme(base_url.to_owned()));
        }
        Ok(ClientConfig {
            base_url: url,
            token: token.to_owned(),
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        })
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> ClientConfig {
        self.execution_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }
}

#[derive(Clone, Debug)]
pub struct Client {
    graphql: Agent,
    transfer: Agent,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Client, BuildClientError> {
        let api_key = HeaderValue::from_str(&config.token)?;
        let base_url = config.base_url.as_str().trim_end_matches('/').to_owned();
        tracing::info!(
            url = %format!("{base_url}{GRAPHQL_ENDPOINT}"),
            "Setting up GraphQL client"
        );
        Ok(Client {
            graphql: build_agent(api_key.clone(), Some(config.execution_timeout)),
            // Uploads and downloads may legitimately run for a long time
            transfer: build_agent(api_key, None),
            base_url,
        })
    }

    /// Absolute URL for an endpoint path on the configured Dewrangle host
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn transfer_agent(&self) -> &Agent {
        &self.transfer
    }
}

fn build_agent(api_key: HeaderValue, timeout: Option<Duration>) -> Agent {
    Agent::config_builder()
        .user_agent(USER_AGENT)
        .http_status_as_error(false)
        .timeout_global(timeout)
        .middleware(
            move |mut req: Request<SendBody<'_>>, next: MiddlewareNext<'_>| {
                let _ = req.headers_mut().insert("x-api-key", api_key.clone());
                next.handle(req)
            },
        )
        .build()
        .into()
}

impl Executor for Client {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(&self, payload: QueryPayload) -> Result<JsonMap, QueryError> {
        let mut response = self
            .graphql
            .post(self.endpoint(GRAPHQL_ENDPOINT))
            .send_json(&payload)
            .map_err(|e| QueryError::Http(Box::new(e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response
            .into_body()
            .read_to_vec()
            .map_err(|e| QueryError::Read(Box::new(e)))?;
        serde_json::from_slice::<Response>(&bytes)?
            .into_data()
            .map_err(Into::into)
    }
}

#[derive(Debug, Error)]
pub enum BuildClientError {
    #[error(
        "missing required configuration: set DEWRANGLE_BASE_URL to the Dewrangle URL and DEWRANGLE_DEV_PAT to your Dewrangle personal access token"
    )]
    MissingConfig,
    #[error("invalid Dewrangle base URL {url:?}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Dewrangle base URL {0:?} must use http or https")]
    Scheme(String),
    #[error("invalid access token")]
    Auth(#[from] InvalidHeaderValue),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to perform GraphQL request")]
    Http(#[source] Box<ureq::Error>),
    #[error("GraphQL request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to read GraphQL response")]
    Read(#[source] Box<ureq::Error>),
    #[error("failed to deserialize GraphQL response")]
    Json(#[from] serde_json::Error),
    #[error("GraphQL server returned error response")]
    GraphQL(#[from] GqlError),
    #[error(transparent)]
    Unsafe(#[from] DeleteGateError),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct QueryPayload {
    pub query: String,
    pub variables: JsonMap,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct Response {
    #[serde(default)]
    data: Option<JsonMap>,
    #[serde(default)]
    errors: GqlError,
}

impl Response {
    fn into_data(self) -> Result<JsonMap, GqlError> {
        if self.errors.is_empty() {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(self.errors)
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct GqlError(Vec<GqlInnerError>);

impl GqlError {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query errored:")?;
        let mut first = true;
        for e in &self.0 {
            if !std::mem::take(&mut first) {
                writeln!(f, "---")?;
            }
            writeln!(f, "    Message: {}", e.message)?;
            if let Some(ref p) = e.path {
                writeln!(f, "    Path: {p:?}")?;
            }
            if let Some(code) = e.extensions.as_ref().and_then(|ext| ext.code.as_ref()) {
                writeln!(f, "    Code: {code}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for GqlError {}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct GqlInnerError {
    message: String,
    #[serde(default)]
    path: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    extensions: Option<GqlErrorExtensions>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct GqlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}
