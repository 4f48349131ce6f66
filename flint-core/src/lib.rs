//! # Flint Core
//!
//! Shared error taxonomy for the Flint cluster compute client.

pub mod error;

pub use error::{Error, ErrorCode, Result};

pub mod prelude {
    //! Common imports for Flint applications

    pub use crate::error::{Error, ErrorCode, Result};
}
