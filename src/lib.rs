//! This library crate contains everything required to run a filebus deployment.
//!
//! Submodules have been introduced to split responsibilities. Each module has a specific focus
//! and they together form a chain of dependencies from the low-level [`library`], over the
//! [`domain`] specific wire types, through the executable [`harness`], up to the
//! high-level [`modules`](module) which bundle the actual services.
//!
//! The interesting part lives in [`library::communication`]: a request/response
//! correlation layer built on nothing but publish/subscribe channels.

#![deny(missing_docs)]

pub mod domain;
pub mod harness;
pub mod library;
pub mod module;
