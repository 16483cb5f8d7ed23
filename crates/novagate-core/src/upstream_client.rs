//! Pooled HTTP transport: turns an `UpstreamHttpRequest` into bytes on the
//! wire and an `UpstreamHttpResponse` (buffered or streamed) back.
//!
//! Client-cache-by-proxy, "buffer non-streaming/non-2xx, stream 2xx with a
//! per-chunk idle timeout" response handling, and error-classification-by-
//! string for transport failures. Built on plain `reqwest` rather than a
//! browser-impersonation fork, since that fork is not meant to be pulled in
//! as a dependency outside its own project, and `reqwest` is what every
//! other example repo in the pack already reaches for.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc};

use novagate_provider_core::{Headers, HttpMethod, UpstreamBody, UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse, UpstreamTransportErrorKind};

pub trait UpstreamClient: Send + Sync {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(120),
        }
    }
}

/// Resolves a per-request proxy override; `None` falls back to the
/// client's own configured proxy (or none). Injected so a future
/// per-provider proxy setting doesn't need a new client type.
pub type ProxyResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

pub struct ReqwestUpstreamClient {
    config: UpstreamClientConfig,
    proxy_resolver: ProxyResolver,
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl ReqwestUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Self {
        let default_proxy = config.proxy.clone();
        Self {
            config,
            proxy_resolver: Arc::new(move || default_proxy.clone()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_proxy_resolver(config: UpstreamClientConfig, proxy_resolver: ProxyResolver) -> Self {
        Self {
            config,
            proxy_resolver,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, UpstreamFailure> {
        let key = proxy.map(str::to_string);
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90));
        if let Some(proxy) = &key {
            let proxy = reqwest::Proxy::all(proxy).map_err(|err| UpstreamFailure::Transport {
                kind: UpstreamTransportErrorKind::Other,
                message: format!("invalid proxy url: {err}"),
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|err| UpstreamFailure::Transport {
            kind: UpstreamTransportErrorKind::Other,
            message: format!("failed to build http client: {err}"),
        })?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

impl UpstreamClient for ReqwestUpstreamClient {
    fn send<'a>(
        &'a self,
        req: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>> {
        Box::pin(async move {
            let proxy = (self.proxy_resolver)();
            let client = self.client_for(proxy.as_deref()).await?;

            let method = match req.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };
            let mut builder = client.request(method, &req.url).timeout(self.config.request_timeout);
            for (name, value) in &req.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = req.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(classify_reqwest_error)?;
            convert_response(response, req.is_stream, self.config.stream_idle_timeout).await
        })
    }
}

async fn convert_response(
    response: reqwest::Response,
    is_stream: bool,
    idle_timeout: Duration,
) -> Result<UpstreamHttpResponse, UpstreamFailure> {
    let status = response.status().as_u16();
    let headers = response_headers(&response);

    if !is_stream || !(200..300).contains(&status) {
        let body = response.bytes().await.map_err(classify_reqwest_error)?;
        if !(200..300).contains(&status) {
            return Err(UpstreamFailure::Http { status, headers, body });
        }
        return Ok(UpstreamHttpResponse {
            status,
            headers,
            body: UpstreamBody::Bytes(body),
        });
    }

    let (tx, rx) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::time::timeout(idle_timeout, stream.next()).await;
            match next {
                Ok(Some(Ok(chunk))) => {
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
                Ok(Some(Err(_))) | Ok(None) | Err(_) => return,
            }
        }
    });

    Ok(UpstreamHttpResponse {
        status,
        headers,
        body: UpstreamBody::Stream(rx),
    })
}

fn response_headers(response: &reqwest::Response) -> Headers {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
        .collect()
}

/// Maps a `reqwest::Error` to a transport-error kind by its flags and
/// message text, since the underlying library exposes no fully-typed
/// transport error enum.
fn classify_reqwest_error(err: reqwest::Error) -> UpstreamFailure {
    let kind = if err.is_timeout() {
        if err.is_connect() {
            UpstreamTransportErrorKind::Timeout
        } else {
            UpstreamTransportErrorKind::ReadTimeout
        }
    } else if err.is_connect() {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("dns") {
            UpstreamTransportErrorKind::Dns
        } else {
            UpstreamTransportErrorKind::Connect
        }
    } else {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("tls") || text.contains("certificate") {
            UpstreamTransportErrorKind::Tls
        } else {
            UpstreamTransportErrorKind::Other
        }
    };
    UpstreamFailure::Transport {
        kind,
        message: err.to_string(),
    }
}
