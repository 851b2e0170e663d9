use std::sync::OnceLock;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::ChatError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    read_timeout: Duration,
) -> Result<reqwest::Client, ChatError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        // Per read, not per request: a streamed answer may outlive it.
        .read_timeout(read_timeout)
        .no_proxy()
        .build()
        .map_err(|err| ChatError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Outbound HTTP client shared by the provider and search integrations.
///
/// The underlying `reqwest::Client` is built on first use and reused for the
/// lifetime of the process.
pub struct HttpTransport {
    client: OnceLock<reqwest::Client>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with pooling and timeouts from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        Self {
            client: OnceLock::new(),
            pool_max_idle_per_host: config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            timeout: Duration::from_secs(config.timeout),
        }
    }

    /// The shared client; initialised exactly once.
    pub fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| {
            build_reqwest_client(
                self.pool_max_idle_per_host,
                self.pool_idle_timeout,
                self.timeout,
            )
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                reqwest::Client::new()
            })
        })
    }

    /// POST a JSON body and return the raw response (status not checked).
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Transport` when the request cannot be sent.
    pub async fn post_json(
        &self,
        url: &str,
        headers: http::HeaderMap,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, ChatError> {
        self.client()
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| ChatError::Transport(format!("Request to {url} failed: {err}")))
    }

    /// GET with query parameters and return the raw response (status not checked).
    /// The whole exchange is bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Transport` when the request cannot be sent.
    pub async fn get_with_query(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ChatError> {
        self.client()
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| ChatError::Transport(format!("Request to {url} failed: {err}")))
    }
}
