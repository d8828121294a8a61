use filebus::library::helpers::parse_millis;
use std::str::FromStr;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "File service with authorization checks over publish/subscribe.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "info,hyper=warn,warp=warn,sqlx=warn",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,

    /// Log output format
    ///
    /// Formats: text, compact, json
    #[structopt(long, global = true, default_value = "text", env, value_name = "format")]
    pub log_format: LogFormat,

    /// Enable status reporting server which can be used as a readiness probe
    #[structopt(long, global = true, env, value_name = "port")]
    pub status_server: Option<u16>,

    /// Time background jobs are given to shut down before they are aborted
    #[structopt(long, global = true, env, default_value = "5000", parse(try_from_str = parse_millis), value_name = "ms")]
    pub grace_period: Duration,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Answers file access checks
    Auth(filebus::module::auth::Options),
    /// Serves files over HTTP
    Files(filebus::module::files::Options),
    /// Runs both services in one process without an external broker
    Standalone(filebus::module::standalone::Options),
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Text,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "text" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}
