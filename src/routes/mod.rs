//! Router Module Index
//!
//! Splits the routing table by access level. Each group gets its guard applied as a
//! route layer in `create_router`, so a handler cannot be exposed with the wrong
//! protection by forgetting an extractor.

/// Routes anyone may call, logged in or not.
pub mod public;

/// Routes that need a logged-in session of any role.
pub mod authenticated;

/// Routes restricted to sessions with the 'admin' role.
pub mod admin;
