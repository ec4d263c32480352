pub mod error;
pub mod gateway;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use error::GatewayError;
pub use gateway::{Gateway, GatewayConfig};
pub use session::{LogLoginRedirect, LoginRedirect, LogoutReason, SessionStore};
pub use transport::{
    HttpMethod, ReqwestTransport, Transport, TransportFailure, TransportFailureKind,
};
