use anyhow::Result;
use filebus::harness::ModuleRunner;
use filebus::module::auth::Auth;
use filebus::module::files::Files;
use filebus::module::standalone::Standalone;
use options::{Command, LogFormat};
use structopt::StructOpt;
use tracing::info;

mod options;

#[tokio::main]
async fn main() -> Result<()> {
    let (command, runner) = init()?;

    match command {
        Command::Auth(options) => runner.run(Auth::new(options)).await,
        Command::Files(options) => runner.run(Files::new(options)).await,
        Command::Standalone(options) => runner.run(Standalone::new(options)).await,
    };

    Ok(())
}

fn init() -> Result<(Command, ModuleRunner)> {
    let options = options::MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log);

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    let runner = match options.status_server {
        Some(port) => ModuleRunner::new_with_status_server(port),
        None => ModuleRunner::default(),
    }
    .with_grace_period(options.grace_period);

    info!("filebus {}", env!("CARGO_PKG_VERSION"));

    Ok((options.command, runner))
}
