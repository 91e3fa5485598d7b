pub mod capture_delegate;
pub mod loopback_source;
