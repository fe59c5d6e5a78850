//! Concrete [`Transport`](avs_core::Transport) implementations.

pub mod http;

pub use http::HttpTransport;
