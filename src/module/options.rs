//! Various options usable by modules
//!
//! The structs in this module allow other modules to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use crate::library::helpers::parse_millis;
use std::time::Duration;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis database server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        global = true,
        default_value = "redis://localhost/",
        value_name = "url"
    )]
    pub url: String,
}

/// Options for querying the authorization service
#[derive(Debug, StructOpt)]
pub struct QueryOptions {
    /// Service name under which the authorization service is listening
    #[structopt(long, env, default_value = "auth", value_name = "name")]
    pub auth_service: String,

    /// Milliseconds to wait for an access decision before denying access
    #[structopt(long, env, default_value = "1000", parse(try_from_str = parse_millis), value_name = "ms")]
    pub access_timeout: Duration,
}
