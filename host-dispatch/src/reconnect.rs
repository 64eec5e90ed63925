//! Re-exports `host-core`'s `Reconnectable`/`ReconnectPolicy` (moved there so
//! `host-store`'s `RedisStore` can implement the trait without a dependency
//! cycle back onto this crate) so existing callers of `host_dispatch::{...}`
//! keep working unchanged.

pub use host_core::{Reconnectable, ReconnectPolicy};
