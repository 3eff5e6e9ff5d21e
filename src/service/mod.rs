pub mod http;
pub mod mix;
pub mod status;
