pub mod handler;
pub mod headers;
pub mod upstream;
