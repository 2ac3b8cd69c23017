use crate::config::SchedulerConfig;
use crate::service::EvolutionService;
use crate::store::DataStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Explicit per-process scheduler state: when the next pass runs. Updated
/// after every tick, readable at any time.
pub struct SchedulerState {
    next_run: Mutex<DateTime<Utc>>,
}

impl SchedulerState {
    fn new(next_run: DateTime<Utc>) -> Self {
        Self {
            next_run: Mutex::new(next_run),
        }
    }

    pub fn next_run(&self) -> DateTime<Utc> {
        *self.next_run.lock().unwrap()
    }

    fn set_next_run(&self, at: DateTime<Utc>) {
        *self.next_run.lock().unwrap() = at;
    }
}

/// One background thread per process. Each tick walks every non-completed
/// experiment, attempts an advance (the one-human-score gate applies) and
/// runs the cleanup sweep whether or not the advance happened. Failures are
/// logged and left for the next tick; nothing here aborts the loop.
pub struct Scheduler {
    state: Arc<SchedulerState>,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start<S: DataStore + 'static>(
        service: Arc<EvolutionService<S>>,
        config: &SchedulerConfig,
    ) -> Scheduler {
        let interval = Duration::from_secs(config.tick_secs);
        let period = ChronoDuration::seconds(config.tick_secs as i64);
        let state = Arc::new(SchedulerState::new(Utc::now() + period));
        let (stop_tx, ticks) = mpsc::channel::<()>();

        let loop_state = Arc::clone(&state);
        let handle = std::thread::spawn(move || loop {
            match ticks.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            run_tick(&service);
            loop_state.set_next_run(Utc::now() + period);
        });

        Scheduler {
            state,
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> Arc<SchedulerState> {
        Arc::clone(&self.state)
    }

    /// Signal the loop and wait for it to exit.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_tick<S: DataStore>(service: &EvolutionService<S>) {
    let experiments = match service.active_experiments() {
        Ok(experiments) => experiments,
        Err(e) => {
            error!("scheduler could not list experiments: {}", e);
            return;
        }
    };
    for experiment in experiments {
        match service.force_advance(experiment.id) {
            Ok(outcome) => debug!("tick advance for experiment {}: {:?}", experiment.id, outcome),
            Err(e) => error!("tick advance for experiment {} failed: {}", experiment.id, e),
        }
        // Sweep regardless of whether the advance happened.
        match service.sweep(experiment.id) {
            Ok(outcome) => debug!("tick sweep for experiment {}: {:?}", experiment.id, outcome),
            Err(e) => error!("tick sweep for experiment {} failed: {}", experiment.id, e),
        }
    }
}
