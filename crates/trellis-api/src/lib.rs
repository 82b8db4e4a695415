// trellis-api: declarative REST resources (routes, response parsers, request engine)

pub mod engine;
pub mod error;
pub mod options;
pub mod parser;
pub mod resource;
pub mod route;
pub mod transport;
pub mod util;

pub use engine::RequestEngine;
pub use error::Error;
pub use options::{RequestOptions, RouteCall};
pub use parser::{HandlerSet, ParserEntry, ParserFn, ParserTable, ParserTarget};
pub use resource::{DEFAULT_TIMEOUT, ResourceDef, ResourceDefBuilder};
pub use route::{ResolvedRoute, RouteSpec, RouteTable, RouteTarget, Verb};
pub use transport::{
    HttpTransport, RawResponse, TlsMode, Transport, TransportConfig, TransportRequest,
    TransportResponse,
};
