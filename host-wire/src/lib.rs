//! The line-oriented, length-prefixed wire protocol (§6, §9): a `Value` model
//! standing in for the source's ref-counted value trees, and a codec reading
//! and writing RESP-style frames directly over a `tokio` stream.

mod codec;
mod value;

pub use codec::{read_request, read_value, write_response};
pub use value::Value;
