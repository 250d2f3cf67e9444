//! Delivery of segment payloads to the collection endpoint.

pub mod module;
pub mod request;
pub mod settings;
pub mod transport;

pub use module::NetworkModule;
pub use request::{Request, RETRY_HEADER};
pub use settings::{NetworkSettings, NetworkSettingsBuilder, DEFAULT_ENDPOINT};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{default_transport, DiscardTransport, NetworkError, Transport, NO_RESPONSE};
