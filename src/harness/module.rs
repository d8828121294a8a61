use super::{DeathReason, Heart};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::lock::Mutex;
use jatsl::{JobScheduler, State, StatusServer};
use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Executable module
#[async_trait]
pub trait Module {
    /// Executed before running the core loop
    async fn pre_startup(&mut self) -> EmptyResult {
        Ok(())
    }

    /// Core run loop of the module
    ///
    /// When the function returns `Some(_)` the death of the returned [`Heart`] is awaited before calling the shutdown hook.
    /// Returning `None` results in the program entering a shutdown state right away.
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError>;

    /// Shutdown hook executed after the core loop and all associated jobs have terminated
    #[instrument(skip(self))]
    async fn post_shutdown(&mut self, termination_reason: ModuleTerminationReason) {
        match termination_reason {
            ModuleTerminationReason::HeartDied(_) | ModuleTerminationReason::ExitedNormally => {
                info!("Module exited normally")
            }
            _ => error!("Module terminated with an error"),
        }
    }
}

/// Reason why a module has terminated
#[derive(Error, Debug)]
pub enum ModuleTerminationReason {
    /// Startup routine threw an error
    #[error("startup routine threw an error")]
    StartupFailed(#[source] BoxedError),
    /// Core run loop threw an error
    #[error("error during operation")]
    OperationalError(#[source] BoxedError),
    /// [`Heart`] provided by module died
    #[error("heart provided by module died: {0}")]
    HeartDied(DeathReason),
    /// Run loop exited cleanly
    #[error("run loop exited cleanly")]
    ExitedNormally,
    /// Timeout during startup or shutdown
    #[error("timeout during startup or shutdown")]
    Timeout,
}

/// Readiness state published by the optional status server
type SharedState = Arc<Mutex<State>>;

/// Runner for [`Module`] implementations
///
/// Drives a module through startup, its run loop and shutdown. Jobs spawned on the scheduler
/// are asked to terminate once the run loop is over and are aborted when they do not comply
/// within the grace period.
pub struct ModuleRunner {
    startup_timeout: Duration,
    shutdown_timeout: Duration,
    grace_period: Duration,
    status_server_port: Option<u16>,
}

impl ModuleRunner {
    /// Creates a new instance using default timeouts and enabling the status server
    pub fn new_with_status_server(status_server_port: u16) -> Self {
        Self {
            status_server_port: Some(status_server_port),
            ..Default::default()
        }
    }

    /// Replaces the time jobs are given to wind down before they are aborted
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

impl Default for ModuleRunner {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(60),
            grace_period: Duration::from_secs(5),
            status_server_port: None,
        }
    }
}

impl ModuleRunner {
    /// Executes a [`Module`] until it exits by calling the corresponding lifecycle functions in order
    #[instrument(skip(self, module), fields(module_name = type_name::<M>()))]
    pub async fn run<M: Module + Send + Sync>(&self, mut module: M) {
        let scheduler = JobScheduler::default();
        let state = self.spawn_status_server(&scheduler).await;

        let termination_reason = self.operate(&mut module, &scheduler, &state).await;

        update_state(&state, State::Shutdown).await;
        info!(grace_period = ?self.grace_period, "Terminating remaining jobs");
        scheduler.terminate_jobs(self.grace_period).await;

        info!("Commencing module shutdown sequence");
        if timeout(self.shutdown_timeout, module.post_shutdown(termination_reason))
            .await
            .is_err()
        {
            error!("Module shutdown sequence timed out");
        }
    }

    async fn spawn_status_server(&self, scheduler: &JobScheduler) -> Option<SharedState> {
        let port = self.status_server_port?;

        info!(port, "Spawning status server");
        let (state, status_server) = StatusServer::new(scheduler, port);
        scheduler.spawn_job(status_server).await;

        Some(state)
    }

    async fn operate<M: Module + Send + Sync>(
        &self,
        module: &mut M,
        scheduler: &JobScheduler,
        state: &Option<SharedState>,
    ) -> ModuleTerminationReason {
        info!("Commencing module startup sequence");
        match timeout(self.startup_timeout, module.pre_startup()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                error!(?error, "Module startup sequence encountered an error");
                return ModuleTerminationReason::StartupFailed(error);
            }
            Err(_) => {
                error!("Module startup sequence timed out");
                return ModuleTerminationReason::Timeout;
            }
        }

        info!("Executing module run procedure");
        let heart = match module.run(scheduler).await {
            Ok(heart) => heart,
            Err(error) => {
                error!(?error, "Module run procedure encountered an error");
                return ModuleTerminationReason::OperationalError(error);
            }
        };

        update_state(state, State::Running).await;

        match heart {
            Some(mut heart) => {
                debug!("Module run procedure completed successfully, entering run loop");
                let death_reason = heart.death().await;
                info!(?death_reason, "Heart provided by run procedure died");
                ModuleTerminationReason::HeartDied(death_reason)
            }
            None => {
                debug!("Module run procedure completed successfully");
                ModuleTerminationReason::ExitedNormally
            }
        }
    }
}

async fn update_state(state: &Option<SharedState>, new_state: State) {
    if let Some(state) = state {
        *state.lock().await = new_state;
    }
}
