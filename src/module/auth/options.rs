use super::policy::Grant;
use crate::module::options::RedisOptions;
use structopt::StructOpt;

/// Options for the authorization module
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Service name under which access checks are answered
    #[structopt(long, env, default_value = "auth", value_name = "name")]
    pub service_name: String,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub policy: PolicyOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,
}

/// Options describing who may read which files
#[derive(Debug, StructOpt)]
pub struct PolicyOptions {
    /// Access grants in the form SESSION:FILE where either side may be `*`.
    /// Everything not granted is denied.
    #[structopt(long = "grant", env = "GRANTS", use_delimiter = true, value_name = "grant")]
    pub grants: Vec<Grant>,
}
