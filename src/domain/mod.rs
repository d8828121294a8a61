//! Structures specific to file serving and authorization
//!
//! Everything in here is shared between the modules, most notably the wire types exchanged
//! between the file service and the authorization service.

mod access;
mod file;

pub use access::*;
pub use file::*;
