//! Auth-domain identifiers, login attempts, and token secrets.

pub mod attempt;
pub mod id;
pub mod token;

pub use attempt::*;
pub use id::*;
pub use token::*;
