//! Domain types shared by handlers, strategies and storage.

pub mod arguments;
pub mod client;
pub mod form;
pub mod http;
pub mod request;
pub mod response;
pub mod session;

pub use arguments::Arguments;
pub use client::{Client, ClientValidationError, TokenEndpointAuthMethod};
pub use form::Form;
pub use http::{HttpRequest, HttpResponse, parse_basic_auth};
pub use request::{AccessRequest, AuthorizeRequest, Request, ResponseMode};
pub use response::{AccessResponse, AuthorizeResponse, IntrospectionResponse};
pub use session::{Session, TokenKind};
