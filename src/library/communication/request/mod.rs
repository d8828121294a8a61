//! Single-shot request/response on top of [`transport`](super::transport)
//!
//! A [`Requestor`] publishes a [`QueryEnvelope`] on `query:<service>:<event>` and listens on a
//! private reply channel named in the envelope. Handlers registered with a
//! [`ResponderRegistry`] receive the query and publish a [`ResponseEnvelope`] to said channel.
//! Each query settles exactly once, either with the first reply or when its deadline passes,
//! and the reply channel is released in both cases.

mod envelope;
mod pending;
mod requestor;
mod responder;
mod validator;

pub use envelope::{query_channel, response_channel, QueryEnvelope, ResponseEnvelope};
pub use requestor::{QueryError, Requestor, DEFAULT_QUERY_TIMEOUT};
pub use responder::{
    handler_fn, HandlerFn, InboundRequest, Listener, Processor, RequestHandler, RequestProcessor,
    ResponderError, ResponderRegistry,
};
pub use validator::{validator_fn, ResponseValidator, Typed, ValidatorFn};
