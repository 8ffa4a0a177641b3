pub mod error;
pub mod smtp;
pub mod tls;
