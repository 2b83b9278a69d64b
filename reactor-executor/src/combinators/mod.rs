//! Future combinators: sequencing (`Then`), parallel composition (`Join`),
//! and first-to-finish racing (`Select`).
//!
//! All three are themselves [`crate::Future`] implementations, so they can
//! be spawned directly or nested inside one another.

mod join;
mod select;
mod then;

pub use join::{Join, JoinError};
pub use select::{Select, SelectError};
pub use then::{Then, ThenError};
