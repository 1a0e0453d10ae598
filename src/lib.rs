//! Semantic navigation of annotated OpenAPI descriptions.
//!
//! This library lets callers use a REST API by meaning instead of by URL:
//! "the operation returning an `Order`", "the relation that cancels this
//! order", "the customer's name, wherever it lives". The API description is
//! an OpenAPI v3 document annotated with JSON-LD keywords.
//!
//! # Example
//!
//! ```
//! use semnav::{build_request, find_operation, ApiDocument, OperationQuery, OperationSchema, SearchOptions};
//! use serde_json::json;
//!
//! let document = ApiDocument::from_value(&json!({
//!     "@context": { "schema": "http://schema.org/", "Order": "schema:Order" },
//!     "paths": {
//!         "/orders/{id}": {
//!             "get": {
//!                 "parameters": [{ "name": "id", "in": "path", "schema": { "type": "string" } }],
//!                 "responses": {
//!                     "200": { "content": { "application/json": { "schema": { "@id": "schema:Order" } } } }
//!                 }
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let query = OperationQuery::Returns("http://schema.org/Order".into());
//! let operation = find_operation(&document, &query, &SearchOptions::new(), false).unwrap();
//! let request = build_request(&OperationSchema::new(operation), &json!({ "id": "42" })).unwrap();
//!
//! assert_eq!(request.url, "/orders/42");
//! ```
//!
//! # Annotations
//!
//! | Keyword | Where | Meaning |
//! |---------|-------|---------|
//! | `@context` | document root | key → semantic id/type, namespaces for compact IRIs |
//! | `@id` | schema, parameter, operation, header | what the node means |
//! | `@type` | schema | what kind of thing the node is |
//! | `@relation` | response link | what following the link does |
//! | `x-affiliation: parent` | nested schema, link | fields/links belong to the parent |
//!
//! The `x-@id`, `x-@type`, `x-@context` and `x-@relation` vendor spellings are
//! accepted too.
//!
//! # Navigation
//!
//! [`SemanticClient`] finds operations ([`SemanticClient::get`],
//! [`SemanticClient::does`], …) and invokes them; responses come back as
//! [`SemanticResource`]s whose fields and relations are read by semantic
//! key.

mod client;
mod context;
mod document;
mod error;
mod expander;
mod expression;
mod hypermedia;
mod loader;
mod matcher;
mod operation;
mod request;
mod resource;
mod schema;
mod transport;
mod types;
mod validator;

pub use client::{ApiOperation, ClientBuilder, SemanticClient};
pub use context::{expand_curies, normalize_vendor_keys, SemanticIndex};
pub use document::ApiDocument;
pub use error::{ClientError, LoadError, RequestError, TransportError};
pub use expander::{expand_document, merge_schemas};
pub use expression::{evaluate_value, RuntimeExpression};
pub use hypermedia::{controls_of, parse_link_header, HypermediaControl, NormalizedHeader};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, navigate_fragment};
pub use matcher::{find_operation, match_url_pattern, OperationQuery, SearchOptions};
pub use operation::OperationSchema;
pub use request::{build_request, extract_parameters, values_from_url, HttpRequest};
pub use resource::{RelationDescriptor, SemanticResource, SemanticValue};
pub use schema::{find_property, flatten_properties, FlatProperty};
pub use transport::{CredentialStore, HttpResponse, MemoryCredentials, Transport};
pub use types::{
    HeaderDescriptor, LinkDescriptor, Method, OperationDescriptor, ParameterDescriptor,
    ParameterLocation, RequestBodyDescriptor, ResponseDescriptor,
};
pub use validator::{ConstraintChecker, JsonSchemaChecker};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
#[cfg(feature = "remote")]
pub use transport::ReqwestTransport;
