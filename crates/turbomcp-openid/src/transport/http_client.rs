//! reqwest-backed transport
//!
//! Built from a [`TransportConfig`]: timeouts, user agent, upstream proxy,
//! TLS peer verification and extra trust roots. Redirects are followed up to
//! `max_redirects` so discovery can land on the real identity page.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, StatusCode, redirect};
use std::error::Error as StdError;
use tracing::{debug, warn};

use super::{
    DISCOVERY_ACCEPT, FORM_CONTENT_TYPE, HttpMethod, HttpTransport, ResponseHeaders,
    TransportResponse,
};
use crate::config::{TlsConfig, TransportConfig};
use crate::error::{OpenIdError, Result, TransportError};
use crate::url::{self, QueryParams};

/// Production transport over a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: HttpClient,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl ReqwestTransport {
    /// Build a client from `config`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the proxy URL is invalid, a CA
    /// file cannot be read or parsed, or the client fails to build.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = HttpClient::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects));

        if let Some(proxy_config) = &config.proxy {
            let mut proxy = reqwest::Proxy::all(proxy_config.url())
                .map_err(|e| TransportError::Client(format!("invalid proxy: {e}")))?;
            if let Some((user, pass)) = proxy_config.credentials() {
                proxy = proxy.basic_auth(user, pass);
            }
            builder = builder.proxy(proxy);
        }

        builder = configure_tls(builder, &config.tls)?;

        let client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    ///
    /// The caller is responsible for its timeout and TLS settings.
    pub fn from_client(client: HttpClient) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        url: &str,
        method: HttpMethod,
        params: &QueryParams,
    ) -> Result<reqwest::Response> {
        let request = match method {
            HttpMethod::Post => self
                .client
                .post(url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(params.encode()),
            HttpMethod::Get => self.client.get(url).header(ACCEPT, DISCOVERY_ACCEPT),
            HttpMethod::Head => self.client.head(url).header(ACCEPT, DISCOVERY_ACCEPT),
        };
        request
            .send()
            .await
            .map_err(|e| OpenIdError::Transport(classify(url, &e)))
    }
}

fn configure_tls(
    mut builder: reqwest::ClientBuilder,
    tls: &TlsConfig,
) -> Result<reqwest::ClientBuilder> {
    if !tls.verify_peer {
        warn!(
            "SECURITY WARNING: TLS peer verification is DISABLED for OpenID requests. \
             Provider attestations can be forged by anyone on the network path."
        );
        return Ok(builder.danger_accept_invalid_certs(true));
    }

    let mut bundles = Vec::new();
    if let Some(file) = &tls.ca_file {
        bundles.push(std::path::PathBuf::from(file));
    }
    if let Some(dir) = &tls.ca_path {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| TransportError::Client(format!("cannot read CA path {dir}: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_cert = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "pem" | "crt"));
            if is_cert {
                bundles.push(path);
            }
        }
    }

    for path in bundles {
        let pem = std::fs::read(&path).map_err(|e| {
            TransportError::Client(format!("cannot read CA file {}: {e}", path.display()))
        })?;
        let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
            TransportError::Client(format!("invalid CA file {}: {e}", path.display()))
        })?;
        debug!("Loaded {} trust roots from {}", certs.len(), path.display());
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }
    Ok(builder)
}

fn classify(url: &str, error: &reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: url.to_string(),
        };
    }

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }

    let lowered = message.to_ascii_lowercase();
    if lowered.contains("certificate") || lowered.contains("tls") {
        TransportError::Tls {
            url: url.to_string(),
            message,
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message,
        }
    }
}

async fn into_transport_response(
    response: reqwest::Response,
    requested: &str,
    update_identity: bool,
    keep_body: bool,
) -> Result<TransportResponse> {
    let status = response.status();
    let mut headers = ResponseHeaders::new();
    for (name, value) in response.headers() {
        headers.insert(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }

    let effective = response.url().to_string();
    let redirected_to = if update_identity && !url::same_resource(&effective, requested) {
        debug!("{} redirected to {}", requested, effective);
        Some(effective)
    } else {
        None
    };

    let body = if keep_body {
        response
            .bytes()
            .await
            .map_err(|e| OpenIdError::Transport(classify(requested, &e)))?
    } else {
        Bytes::new()
    };

    if keep_body && !status.is_success() && body.is_empty() {
        return Err(TransportError::Status {
            url: requested.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    Ok(TransportResponse {
        status: status.as_u16(),
        body,
        headers,
        redirected_to,
    })
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        params: &QueryParams,
        update_identity: bool,
    ) -> Result<TransportResponse> {
        let target = if method != HttpMethod::Post && !params.is_empty() {
            url::with_query(url, &params.encode())?
        } else {
            url.to_string()
        };
        // Compare redirects against the client's normalized form of the URL
        let requested = ::url::Url::parse(&target)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| target.clone());

        match method {
            HttpMethod::Head => {
                let response = self.send(&target, HttpMethod::Head, params).await?;
                if response.status() == StatusCode::METHOD_NOT_ALLOWED {
                    debug!("HEAD not allowed at {}, retrying as GET", target);
                    let response = self.send(&target, HttpMethod::Get, params).await?;
                    into_transport_response(response, &requested, update_identity, false).await
                } else {
                    into_transport_response(response, &requested, update_identity, false).await
                }
            }
            HttpMethod::Get | HttpMethod::Post => {
                let response = self.send(&target, method, params).await?;
                into_transport_response(response, &requested, update_identity, true).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use secrecy::SecretString;

    #[test]
    fn test_client_creation() {
        let transport = ReqwestTransport::new(&TransportConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_client_with_proxy_and_insecure_tls() {
        let mut config = TransportConfig::default();
        config.proxy = Some(ProxyConfig {
            host: "proxy.local".to_string(),
            port: Some(3128),
            username: Some("user".to_string()),
            password: Some(SecretString::new("secret".to_string())),
        });
        config.tls.verify_peer = false;
        assert!(ReqwestTransport::new(&config).is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_reported() {
        let mut config = TransportConfig::default();
        config.tls.ca_file = Some("/nonexistent/ca-bundle.pem".to_string());
        let err = ReqwestTransport::new(&config).unwrap_err();
        assert!(matches!(
            err,
            OpenIdError::Transport(TransportError::Client(_))
        ));
    }
}
