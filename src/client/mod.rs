pub mod api;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, API_VERSION};
pub use request::{Method, PostData, QueryParams, RequestBody, RequestOptions, UrlBuilder};
pub use response::ResponseEnvelope;
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportOptions, TransportRequest};
