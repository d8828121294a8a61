//! Request and response on top of plain publish/subscribe channels
//!
//! The underlying brokers only know how to deliver fire-and-forget messages to
//! whoever listens on a named channel. This module layers single-shot request/response
//! semantics on top of that:
//!
//! 1. The [`transport`] module wraps a broker connection pair and provides lazy,
//!    race-free connection establishment as well as a channel to subscriber table.
//! 2. The [`request`] module contains the [`Requestor`](request::Requestor) which sends a
//!    query and awaits exactly one reply (or a timeout) on a private, randomly named reply
//!    channel, and the [`ResponderRegistry`](request::ResponderRegistry) which binds handlers
//!    to query channels and sends their results back to the embedded reply channel.
//! 3. The [`implementation`] module contains broker bindings for Redis and a process-local
//!    in-memory broker.
//!
//! Channel names are the correlation keys. A query for `event` on `service` is published on
//! `query:<service>:<event>` and its reply is expected on `response:<service>:<request-id>`.

pub mod implementation;
pub mod request;
pub mod transport;
