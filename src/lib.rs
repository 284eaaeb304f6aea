pub mod cache;
pub mod config;
pub mod exception;
pub mod header;
pub mod index;
pub mod negotiate;
pub mod param;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;
pub mod util;

pub use config::{Config, ServeOptions};
pub use exception::Exception;
pub use header::HeaderSet;
pub use index::{AssetEntry, AssetIndex, CompressedVariant};
pub use negotiate::{negotiate, Negotiated};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use resolver::resolve;
pub use response::{Outcome, Response, ServeRecord};
pub use server::{StaticServer, UnmatchedHandler};
