//! Session / Auth Gate
//!
//! Two-state authentication machine for the shell:
//!
//! - **Absent**: no token, only login/registration is possible
//! - **Present**: a bearer token is held and persisted for the gateway origin
//!
//! Transitions happen only on an explicit login/registration exchange or an
//! explicit logout. Tokens never expire client-side.

mod epoch;
mod gate;
mod store;
mod token;

pub use epoch::{SessionEpoch, SessionGuard};
pub use gate::{SessionError, SessionGate};
pub use store::{TokenStore, TOKEN_KEY};
pub use token::Token;
