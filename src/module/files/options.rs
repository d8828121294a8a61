use crate::module::options::{QueryOptions, RedisOptions};
use std::path::PathBuf;
use structopt::StructOpt;

/// Options for the file module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub server: ServerOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,
}

/// Options for serving files over HTTP
#[derive(Debug, StructOpt)]
pub struct ServerOptions {
    /// Port on which the HTTP server listens
    #[structopt(short, long, env, default_value = "8080")]
    pub port: u16,

    /// Directory in which file contents are stored
    #[structopt(long, env, parse(from_os_str), default_value = "/var/lib/filebus")]
    pub storage_dir: PathBuf,

    /// SQLite database URL for file metadata
    #[structopt(long, env, default_value = "sqlite:///var/lib/filebus/metadata.db", value_name = "url")]
    pub database: String,

    /// Maximum accepted upload size in bytes
    #[structopt(long, env, default_value = "67108864", value_name = "bytes")]
    pub upload_limit: u64,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub query: QueryOptions,
}
