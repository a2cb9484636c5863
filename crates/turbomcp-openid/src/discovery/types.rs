//! Discovery result types

use serde::{Deserialize, Serialize};

/// OpenID 2.0 namespace
pub const OPENID2_NS: &str = "http://specs.openid.net/auth/2.0";

/// OpenID protocol generation spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// OpenID 1.1
    V1,
    /// OpenID 2.0
    V2,
}

impl ProtocolVersion {
    /// `1` or `2`
    pub fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

/// Extensions a provider advertised in its XRDS service
///
/// Both flags are false when discovery went through HTML links, which carry
/// no extension information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSupport {
    /// Attribute Exchange 1.0
    pub ax: bool,
    /// Simple Registration 1.0/1.1
    pub sreg: bool,
}

impl ExtensionSupport {
    /// Whether anything was advertised at all
    pub fn any(self) -> bool {
        self.ax || self.sreg
    }
}

/// A resolved OpenID Provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    url: String,
    version: ProtocolVersion,
    local_id: Option<String>,
    extensions: ExtensionSupport,
    op_identifier: bool,
}

impl ProviderEndpoint {
    /// Endpoint at `url` speaking `version`
    pub fn new(url: impl Into<String>, version: ProtocolVersion) -> Self {
        Self {
            url: url.into(),
            version,
            local_id: None,
            extensions: ExtensionSupport::default(),
            op_identifier: false,
        }
    }

    /// Set the delegate / OP-local identifier
    pub fn with_local_id(mut self, local_id: Option<String>) -> Self {
        self.local_id = local_id.filter(|id| !id.is_empty());
        self
    }

    /// Set the advertised extensions
    pub fn with_extensions(mut self, extensions: ExtensionSupport) -> Self {
        self.extensions = extensions;
        self
    }

    /// Mark the endpoint as an OP identifier (`.../2.0/server` service)
    pub fn with_op_identifier(mut self, op_identifier: bool) -> Self {
        self.op_identifier = op_identifier;
        self
    }

    /// Provider URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Protocol version
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Delegate / OP-local identifier, if discovered
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    /// Advertised extensions
    pub fn extensions(&self) -> ExtensionSupport {
        self.extensions
    }

    /// Whether the provider selects the identifier itself
    pub fn is_op_identifier(&self) -> bool {
        self.op_identifier
    }
}

/// Outcome of one discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// The provider endpoint
    pub endpoint: ProviderEndpoint,
    /// Effective identity URL if redirects moved it
    pub redirected_identity: Option<String>,
}
