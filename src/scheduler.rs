//! Time-driven maintenance of the current election's `started` flag.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::Mutex,
    Orbit, Rocket,
};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    common::election::ElectionId,
    store::{Db, ElectionStore, Store},
};
use crate::scheduled_task::PeriodicTask;

/// What a single scheduler tick did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// There is no current election.
    NoElection,
    /// The current election lacks a start or end time.
    IncompleteWindow(ElectionId),
    /// The election's window opened, so it was marked started.
    Started(ElectionId),
    /// The election's window closed, so it was marked stopped.
    Stopped(ElectionId),
    /// Nothing to do, or another writer got there first.
    Unchanged(ElectionId),
}

/// Reconcile the current election's `started` flag with its window at `now`.
///
/// The flag is written with a compare-and-set, so repeated or concurrent ticks
/// never flip it twice and never undo an early end.
pub async fn tick(store: &dyn Store, now: DateTime<Utc>) -> Result<TickOutcome> {
    let Some(election) = store.current_election().await? else {
        debug!("Scheduler: no current election");
        return Ok(TickOutcome::NoElection);
    };
    let id = election.id;
    let Some((start, end)) = election.window.bounds() else {
        debug!("Scheduler: election {id} has an incomplete window");
        return Ok(TickOutcome::IncompleteWindow(id));
    };

    let outcome = if !election.started && start <= now && now < end {
        if store.set_started(id, true).await? {
            info!("Election {id} started");
            TickOutcome::Started(id)
        } else {
            TickOutcome::Unchanged(id)
        }
    } else if election.started && now >= end {
        if store.set_started(id, false).await? {
            info!("Election {id} ended");
            TickOutcome::Stopped(id)
        } else {
            TickOutcome::Unchanged(id)
        }
    } else {
        TickOutcome::Unchanged(id)
    };
    Ok(outcome)
}

/// Run `tick` every `period`. A failed tick is logged and the next one runs as usual.
fn spawn_scheduler<F, Fut>(period: Duration, mut tick: F) -> PeriodicTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<TickOutcome>> + Send + 'static,
{
    PeriodicTask::spawn(period, move || {
        let run = tick();
        async move {
            match run.await {
                Ok(outcome) => debug!("Scheduler tick: {outcome:?}"),
                Err(err) => warn!("Scheduler tick failed: {err}"),
            }
        }
    })
}

/// A fairing that runs the scheduler from liftoff until shutdown.
#[derive(Default)]
pub struct SchedulerFairing {
    task: Mutex<Option<PeriodicTask>>,
}

#[rocket::async_trait]
impl Fairing for SchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election scheduler",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(config), Some(db)) = (rocket.state::<Config>(), rocket.state::<Db>()) else {
            error!("Scheduler not started: config or storage missing");
            return;
        };
        let period = config.scheduler_interval();
        let db = db.clone();
        let task = spawn_scheduler(period, move || {
            let db = db.clone();
            async move { tick(&*db, Utc::now()).await }
        });
        info!("Scheduler running every {}s", period.as_secs());
        *self.task.lock().await = Some(task);
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        if let Some(task) = self.task.lock().await.take() {
            if task.stop().await {
                info!("Scheduler stopped");
            } else {
                warn!("Scheduler task panicked before shutdown");
            }
        }
    }
}
