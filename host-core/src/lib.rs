//! Shared primitives for the game-hosting service: typed entity identifiers,
//! the time and random sources, the wire-level error taxonomy, and constants
//! pulled from across the rest of the workspace so no crate has to guess at
//! another's magic numbers.

mod clock;
mod constants;
mod error;
mod id;
mod reconnect;
mod rng;

pub use clock::{Clock, FixedClock, ScaledClock, DEFAULT_TIMESCALE};
pub use constants::*;
pub use error::{HostError, HostResult};
pub use id::{Unique, ID};
pub use reconnect::{Reconnectable, ReconnectPolicy};
pub use rng::Random;
