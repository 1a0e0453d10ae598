//! Semantic client: find operations by meaning and invoke them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::document::ApiDocument;
use crate::error::{ClientError, RequestError, TransportError};
use crate::loader::is_url;
use crate::matcher::{find_operation, OperationQuery, SearchOptions};
use crate::operation::OperationSchema;
use crate::request::{build_request, values_from_url, HttpRequest};
use crate::resource::SemanticResource;
use crate::transport::{CredentialStore, HttpResponse, MemoryCredentials, Transport};
use crate::types::{Method, OperationDescriptor, ParameterDescriptor, ResponseDescriptor};
use crate::validator::{ConstraintChecker, JsonSchemaChecker};

struct ClientInner {
    document: ApiDocument,
    base_url: String,
    transport: Box<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    checker: Box<dyn ConstraintChecker>,
}

/// Entry point for semantic navigation of one API.
///
/// Cheap to clone; clones share the document, transport and credentials.
#[derive(Clone)]
pub struct SemanticClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for SemanticClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

/// Configuration for a [`SemanticClient`].
pub struct ClientBuilder {
    document: ApiDocument,
    base_url: Option<String>,
    transport: Option<Box<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    checker: Option<Box<dyn ConstraintChecker>>,
}

impl ClientBuilder {
    pub fn new(document: ApiDocument) -> Self {
        Self {
            document,
            base_url: None,
            transport: None,
            credentials: None,
            checker: None,
        }
    }

    /// Use this base URL instead of the document's first server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn checker(mut self, checker: impl ConstraintChecker + 'static) -> Self {
        self.checker = Some(Box::new(checker));
        self
    }

    /// Build the client.
    ///
    /// Defaults: `ReqwestTransport` (feature `remote`), empty
    /// `MemoryCredentials`, `JsonSchemaChecker`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NoServerUrl` when no base URL is configured and
    /// the document declares no server, or a transport error when no
    /// transport is available.
    pub fn build(self) -> Result<SemanticClient, ClientError> {
        let base_url = self
            .base_url
            .or_else(|| self.document.server_url())
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::NoServerUrl)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        Ok(SemanticClient {
            inner: Arc::new(ClientInner {
                document: self.document,
                base_url: base_url.trim_end_matches('/').to_string(),
                transport,
                credentials: self
                    .credentials
                    .unwrap_or_else(|| Arc::new(MemoryCredentials::new())),
                checker: self
                    .checker
                    .unwrap_or_else(|| Box::new(JsonSchemaChecker)),
            }),
        })
    }
}

#[cfg(feature = "remote")]
fn default_transport() -> Result<Box<dyn Transport>, ClientError> {
    Ok(Box::new(crate::transport::ReqwestTransport::new()?))
}

#[cfg(not(feature = "remote"))]
fn default_transport() -> Result<Box<dyn Transport>, ClientError> {
    Err(TransportError::network("no transport configured").into())
}

impl SemanticClient {
    pub fn builder(document: ApiDocument) -> ClientBuilder {
        ClientBuilder::new(document)
    }

    pub fn document(&self) -> &ApiDocument {
        &self.inner.document
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.inner.credentials.as_ref()
    }

    pub(crate) fn checker(&self) -> &dyn ConstraintChecker {
        self.inner.checker.as_ref()
    }

    /// Best operation for a query, or `None` when nothing matches.
    pub fn find(&self, query: OperationQuery, options: &SearchOptions) -> Option<ApiOperation> {
        let authenticated = self.credentials().is_authenticated();
        find_operation(self.document(), &query, options, authenticated).map(|op| self.operation(op))
    }

    /// Operation performing an action, by `operationId` or `@id`.
    pub fn does(&self, action: &str) -> Option<ApiOperation> {
        self.find(OperationQuery::Action(action.to_string()), &SearchOptions::new())
    }

    /// GET operation returning a resource of this semantic type.
    pub fn get(&self, semantic_type: &str) -> Option<ApiOperation> {
        self.find(OperationQuery::Returns(semantic_type.to_string()), &SearchOptions::new())
    }

    /// GET operation returning a list of this semantic type.
    pub fn list(&self, semantic_type: &str) -> Option<ApiOperation> {
        self.find(OperationQuery::Lists(semantic_type.to_string()), &SearchOptions::new())
    }

    /// GET operation serving this URL, with the URL's path and query values
    /// set as parameter defaults.
    pub fn from_url(&self, url: &str) -> Option<ApiOperation> {
        let relative = self.relative_to_base(url, None);
        let mut operation = self.find(OperationQuery::Path(relative.clone()), &SearchOptions::new())?;
        for (name, value) in values_from_url(&operation.schema, &relative) {
            operation.schema.set_default(&name, value);
        }
        Some(operation)
    }

    /// Resolve a URL reference against the URL it was served from (the base
    /// URL by default), then make it relative to the base URL when it lives
    /// under it. References that cannot be resolved are returned unchanged.
    pub(crate) fn relative_to_base(&self, reference: &str, served_from: Option<&str>) -> String {
        let context = served_from
            .filter(|url| is_url(url))
            .unwrap_or_else(|| self.base_url());
        let absolute = match Url::parse(context).and_then(|url| url.join(reference)) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => return reference.to_string(),
        };
        if let Some(rest) = absolute.strip_prefix(self.base_url()) {
            if rest.is_empty() {
                return "/".to_string();
            }
            if rest.starts_with('/') {
                return rest.to_string();
            }
        }
        absolute
    }

    pub(crate) fn operation(&self, descriptor: OperationDescriptor) -> ApiOperation {
        ApiOperation {
            client: self.clone(),
            schema: OperationSchema::new(descriptor),
        }
    }

    /// Send a request: base URL prefixed, bearer token attached.
    ///
    /// A 401 clears the stored token.
    pub(crate) fn call(&self, mut request: HttpRequest) -> Result<HttpResponse, ClientError> {
        if !is_url(&request.url) {
            let separator = if request.url.starts_with('/') { "" } else { "/" };
            request.url = format!("{}{}{}", self.base_url(), separator, request.url);
        }
        if let Some(token) = self.credentials().token() {
            request
                .headers
                .push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        debug!(method = %request.method, url = %request.url, "sending request");
        match self.inner.transport.send(&request) {
            Ok(mut response) => {
                if response.url.is_empty() {
                    response.url = request.url;
                }
                Ok(response)
            }
            Err(TransportError {
                status: Some(401), ..
            }) => {
                self.credentials().clear_token();
                Err(ClientError::AuthenticationRequired)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A matched operation bound to a client.
#[derive(Debug, Clone)]
pub struct ApiOperation {
    client: SemanticClient,
    schema: OperationSchema,
}

impl ApiOperation {
    pub fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    /// Mutable access, to preset parameter defaults.
    pub fn schema_mut(&mut self) -> &mut OperationSchema {
        &mut self.schema
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        self.schema.operation()
    }

    /// The operation is secured and no token is currently stored.
    pub fn requires_authentication(&self) -> bool {
        self.descriptor().has_security && !self.client.credentials().is_authenticated()
    }

    /// Required parameters with neither a value in `values` nor a default.
    pub fn missing_parameters(&self, values: &Value) -> Vec<&ParameterDescriptor> {
        self.schema.missing_parameters(values, true)
    }

    pub fn build_request(&self, values: &Value) -> Result<HttpRequest, RequestError> {
        build_request(&self.schema, values)
    }

    /// Request built from defaults alone, for GET operations that need
    /// nothing more.
    pub fn build_default_request(&self) -> Option<HttpRequest> {
        if self.descriptor().verb != Method::Get {
            return None;
        }
        build_request(&self.schema, &Value::Null).ok()
    }

    /// Send the operation and wrap the response.
    ///
    /// # Errors
    ///
    /// `AuthenticationRequired` when the operation is secured and no token
    /// is stored (or the server answered 401), `Request` when the request
    /// cannot be built, `Transport` for any other failure.
    pub fn invoke(&self, values: &Value) -> Result<SemanticResource, ClientError> {
        if self.requires_authentication() {
            return Err(ClientError::AuthenticationRequired);
        }
        let request = self.build_request(values)?;
        let response = self.client.call(request)?;

        let documentation = self
            .descriptor()
            .response(response.status)
            .cloned()
            .unwrap_or_default();
        let schema = documentation
            .schema_for_content_type(response.content_type())
            .cloned();
        Ok(SemanticResource::new(
            self.client.clone(),
            response.body.clone(),
            schema,
            Arc::new(response),
            Arc::new(documentation),
        ))
    }

    /// Documentation of the primary response.
    pub fn response_documentation(&self) -> Option<&ResponseDescriptor> {
        self.descriptor().primary_response()
    }
}
