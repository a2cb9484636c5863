//! # Discovery Engine
//!
//! Resolves an identifier to its provider endpoint. Each iteration:
//!
//! 1. checks that the current host resolves,
//! 2. (Yadis) issues `HEAD`; an `X-XRDS-Location` header restarts the loop at
//!    that location, an XRDS content type fetches and scans the document,
//! 3. (Yadis) issues `GET`; an `X-XRDS-Location` header or
//!    `<meta http-equiv="X-XRDS-Location">` tag restarts the loop,
//! 4. scans the page for `openid2.provider`/`openid2.local_id` links, then for
//!    `openid.server`/`openid.delegate`.
//!
//! The number of iterations, not wall-clock time, bounds the work: a chain of
//! XRDS redirects longer than the bound fails with
//! [`OpenIdError::EndlessRedirection`].

use tracing::debug;

use super::html::html_tag;
use super::types::{Discovery, ProtocolVersion, ProviderEndpoint};
use super::xrds::{is_xrds_content_type, parse_services};
use crate::config::{CompiledOverride, DEFAULT_MAX_DISCOVERY_ITERATIONS};
use crate::error::{OpenIdError, Result};
use crate::identity;
use crate::transport::{HttpMethod, HttpTransport, TransportResponse};
use crate::url::{QueryParams, resolve_reference};

const XRDS_LOCATION_HEADER: &str = "x-xrds-location";

/// Discovery over a borrowed transport
pub struct DiscoveryEngine<'a, T: HttpTransport + ?Sized> {
    transport: &'a T,
    max_iterations: usize,
    xrds_override: Option<CompiledOverride>,
}

impl<T: HttpTransport + ?Sized> std::fmt::Debug for DiscoveryEngine<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("max_iterations", &self.max_iterations)
            .field("xrds_override", &self.xrds_override)
            .finish()
    }
}

/// Mutable state of one discovery run
struct Run {
    original: String,
    url: String,
    yadis: bool,
    redirected_identity: Option<String>,
}

impl Run {
    fn track_redirect(&mut self, response: &TransportResponse) {
        if let Some(location) = &response.redirected_to {
            self.redirected_identity = Some(location.clone());
            self.url = location.clone();
        }
    }

    fn follow_xrds_location(&mut self, location: &str) -> Result<()> {
        let next = resolve_reference(&self.url, location.trim())?;
        debug!("Following X-XRDS-Location {} -> {}", self.url, next);
        self.url = next;
        Ok(())
    }

    fn fall_back_to_html(&mut self) {
        debug!("No OpenID service in XRDS at {}, falling back to HTML", self.url);
        self.yadis = false;
        self.url = self.original.clone();
    }

    fn finish(self, endpoint: ProviderEndpoint) -> Discovery {
        debug!(
            "Discovered OpenID {} provider {}",
            endpoint.version().as_u8(),
            endpoint.url()
        );
        Discovery {
            endpoint,
            redirected_identity: self.redirected_identity,
        }
    }
}

/// What a Yadis step decided
enum Step {
    Found(ProviderEndpoint),
    Restart,
    Page(String),
}

impl<'a, T: HttpTransport + ?Sized> DiscoveryEngine<'a, T> {
    /// Engine with the default iteration bound and no override
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            max_iterations: DEFAULT_MAX_DISCOVERY_ITERATIONS,
            xrds_override: None,
        }
    }

    /// Set the iteration bound
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Rewrite the discovery URL once before the loop starts
    pub fn with_override(mut self, xrds_override: Option<CompiledOverride>) -> Self {
        self.xrds_override = xrds_override;
        self
    }

    /// Discover the provider for `identifier`
    ///
    /// XRIs are resolved through the `xri.net` proxy.
    ///
    /// # Errors
    ///
    /// - [`OpenIdError::MissingIdentity`] for a blank identifier
    /// - [`OpenIdError::HostUnreachable`] if a host does not resolve
    /// - [`OpenIdError::NoProviderFound`] when the final page has no provider
    /// - [`OpenIdError::EndlessRedirection`] when the iteration bound is hit
    /// - [`OpenIdError::Transport`] for network failures
    pub async fn discover(&self, identifier: &str) -> Result<Discovery> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(OpenIdError::MissingIdentity);
        }

        let original = identity::discovery_url(identifier);
        let url = match &self.xrds_override {
            Some(rewrite) => rewrite.apply(&original),
            None => original.clone(),
        };
        let mut run = Run {
            original,
            url,
            yadis: true,
            redirected_identity: None,
        };

        for iteration in 1..=self.max_iterations {
            debug!("Discovery iteration {} at {}", iteration, run.url);

            if !self.transport.host_exists(&run.url).await {
                return Err(OpenIdError::HostUnreachable { url: run.url });
            }

            let mut page = None;
            if run.yadis {
                match self.yadis_step(&mut run).await? {
                    Step::Found(endpoint) => return Ok(run.finish(endpoint)),
                    Step::Restart => continue,
                    Step::Page(body) => page = Some(body),
                }
            }

            let content = match page {
                Some(body) => body,
                None => self.get(&run.url, false).await?.text(),
            };

            return match html_provider(&content) {
                Some(endpoint) => Ok(run.finish(endpoint)),
                None => Err(OpenIdError::NoProviderFound { url: run.url }),
            };
        }

        Err(OpenIdError::EndlessRedirection {
            iterations: self.max_iterations,
        })
    }

    async fn yadis_step(&self, run: &mut Run) -> Result<Step> {
        let empty = QueryParams::new();
        let head = self
            .transport
            .request(&run.url, HttpMethod::Head, &empty, true)
            .await?;
        run.track_redirect(&head);

        if let Some(location) = head.headers.get(XRDS_LOCATION_HEADER) {
            run.follow_xrds_location(location)?;
            return Ok(Step::Restart);
        }

        let lenient = self.xrds_override.is_some();
        if head
            .content_type()
            .is_some_and(|ct| is_xrds_content_type(ct, lenient))
        {
            let document = self.get(&run.url, false).await?.text();
            return self.scan_document(run, &document);
        }

        let response = self.get(&run.url, true).await?;
        run.track_redirect(&response);

        if let Some(location) = response.headers.get(XRDS_LOCATION_HEADER) {
            run.follow_xrds_location(location)?;
            return Ok(Step::Restart);
        }

        let body = response.text();
        if response
            .content_type()
            .is_some_and(|ct| is_xrds_content_type(ct, false))
        {
            return self.scan_document(run, &body);
        }

        if let Some(location) = html_tag(&body, "meta", "http-equiv", "X-XRDS-Location", "content")
        {
            run.follow_xrds_location(&location)?;
            return Ok(Step::Restart);
        }

        Ok(Step::Page(body))
    }

    fn scan_document(&self, run: &mut Run, document: &str) -> Result<Step> {
        match parse_services(document, &run.url)? {
            Some(endpoint) => Ok(Step::Found(endpoint)),
            None => {
                run.fall_back_to_html();
                Ok(Step::Restart)
            }
        }
    }

    async fn get(&self, url: &str, update_identity: bool) -> Result<TransportResponse> {
        self.transport
            .request(url, HttpMethod::Get, &QueryParams::new(), update_identity)
            .await
    }
}

/// Provider advertised by HTML `<link>` tags, preferring OpenID 2.0 markup
fn html_provider(content: &str) -> Option<ProviderEndpoint> {
    if let Some(server) = html_tag(content, "link", "rel", "openid2.provider", "href") {
        let local_id = html_tag(content, "link", "rel", "openid2.local_id", "href");
        return Some(ProviderEndpoint::new(server, ProtocolVersion::V2).with_local_id(local_id));
    }

    let server = html_tag(content, "link", "rel", "openid.server", "href")?;
    let delegate = html_tag(content, "link", "rel", "openid.delegate", "href");
    Some(ProviderEndpoint::new(server, ProtocolVersion::V1).with_local_id(delegate))
}
