//! Orchestrator
//!
//! Builds the run context, spawns every long-running thread parked on the
//! start gate, releases them together, watches for the termination flag or
//! for all dispatch workers finishing, then shuts down and reports.

use crate::context::RunContext;
use crate::controls::Controls;
use crate::diagnostics::{Diagnostics, Profiler};
use anyhow::{Context, Result};
use hueflow_control::{
    spawn_worker, BatchExecutor, ClusterRegistry, CommandQueue, CommandWorker, DispatchSettings,
    DispatchWorker, RandomLook, StartGate, Sweeper, ValueSource, WorkerHandle, WorkerOutcome,
};
use hueflow_core::{
    ClusterAssignment, ControlStateStore, GlobalResults, HueflowConfig, Pipeline,
    SimulationClock, Throughput,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Orchestrator {
    config: HueflowConfig,
    clusters: Vec<ClusterAssignment>,
    ctx: Arc<RunContext>,
    controls: Controls,
    clock: Option<SimulationClock>,
    diagnostics: Diagnostics,
}

impl Orchestrator {
    /// Build the pipeline, open the state store and restore operator state.
    ///
    /// `clusters` must come from `config.validate()`.
    pub fn new(
        config: HueflowConfig,
        clusters: Vec<ClusterAssignment>,
        executor: Arc<dyn BatchExecutor>,
    ) -> Result<Self> {
        let (pipeline, handles) =
            Pipeline::from_config(&config.simulation, &clusters, config.light_count())
                .context("Failed to build pipeline")?;
        info!(
            "Pipeline: {} ({} lights)",
            pipeline.stage_names().join(" -> "),
            pipeline.len()
        );
        for warning in config.connection_headroom_warnings() {
            warn!("{}", warning);
        }
        let diagnostics = Diagnostics::from_config(&config.debug, pipeline.stage_names());

        let state_path = config.state_path();
        let state = ControlStateStore::open(&state_path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable control state {:?}: {}", state_path, e);
            ControlStateStore::empty(&state_path)
        });

        let ctx = Arc::new(RunContext {
            output: pipeline.output(),
            handles,
            queue: CommandQueue::new(),
            state,
            results: Arc::new(GlobalResults::new()),
            stop: Arc::new(AtomicBool::new(false)),
            registry: ClusterRegistry::from_config(&config),
            executor,
        });

        let controls = Controls::new(Arc::clone(&ctx), config.simulation.controls.clone());
        let snapshot = ctx.state.snapshot();
        controls.restore(&snapshot);

        let mut clock = SimulationClock::new(pipeline, config.simulation.frame_period());
        if let Some(history) = diagnostics.stage_history() {
            clock = clock.with_history(Arc::clone(history));
        }
        if let Some(stats) = diagnostics.frame_stats() {
            clock = clock.with_stats(Arc::clone(stats));
        }
        // Dispatch must never see an all-zero, never-computed output.
        clock.tick(0.0);

        Ok(Self {
            config,
            clusters,
            ctx,
            controls,
            clock: Some(clock),
            diagnostics,
        })
    }

    /// Run `profiler` from thread release until shutdown
    pub fn with_profiler(mut self, profiler: Box<dyn Profiler>) -> Self {
        self.diagnostics.set_profiler(profiler);
        self
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Operator entry points for a control surface
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    fn dispatch_workers(&self) -> Result<Vec<DispatchWorker>> {
        let sim = &self.config.simulation;
        let mut workers = Vec::new();

        for cluster in &self.clusters {
            let bridge = &self.config.bridges[&cluster.name];
            let endpoint = self.ctx.registry.resolve(&cluster.name)?.clone();
            let source = match RandomLook::from_look(&sim.look, bridge) {
                Some(look) => ValueSource::Random(look),
                None => ValueSource::Pipeline(self.ctx.output.clone()),
            };
            let settings = DispatchSettings {
                max_connects: bridge.max_connects,
                iterations: sim.iterations,
                transition: sim.transition,
            };

            for (idx, group) in cluster.workers.iter().enumerate() {
                let mut worker = DispatchWorker::new(
                    format!("{}/{}", cluster.name, idx),
                    endpoint.clone(),
                    group.clone(),
                    source.clone(),
                    settings.clone(),
                    Arc::clone(&self.ctx.executor),
                    Arc::clone(&self.ctx.results),
                    Arc::clone(&self.ctx.stop),
                );
                if let Some(history) = self.diagnostics.request_history() {
                    worker = worker.with_history(Arc::clone(history));
                }
                workers.push(worker);
            }
        }
        Ok(workers)
    }

    /// Spawn everything, run until stopped, and return the final throughput.
    pub fn run(mut self) -> Result<Throughput> {
        let sim = self.config.simulation.clone();
        let dispatchers = self.dispatch_workers()?;
        let clock = if sim.enabled { self.clock.take() } else { None };

        let parties = dispatchers.len() + 1 + usize::from(clock.is_some()) + usize::from(sim.sweep.enabled);
        let gate = Arc::new(StartGate::new(parties));
        let ctx = Arc::clone(&self.ctx);

        let mut spawned = Spawned::default();
        if let Err(e) = self.spawn_all(&gate, dispatchers, clock, &mut spawned) {
            // Let whatever did start exit straight away.
            ctx.request_stop();
            gate.release();
            return Err(e);
        }

        gate.wait_all_parked(None);
        debug!("All {} threads parked", parties);
        ctx.results.begin();
        self.diagnostics.start_profiler();
        gate.release();
        info!("Released {} threads", parties);

        let mut dispatch = spawned.dispatch;
        while !ctx.stop_requested() {
            thread::sleep(POLL_INTERVAL);
            dispatch = reap(dispatch);
            if dispatch.is_empty() {
                info!("All dispatch workers finished.");
                break;
            }
        }
        ctx.request_stop();

        let mut remaining = dispatch;
        remaining.extend(spawned.others);
        let deadline = Instant::now() + sim.shutdown_grace();
        while !remaining.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
            remaining = reap(remaining);
        }
        if !remaining.is_empty() {
            let names: Vec<&str> = remaining.iter().map(|h| h.name()).collect();
            warn!("Abandoning {} threads: {}", remaining.len(), names.join(", "));
        }

        ctx.results.done();
        if let Err(e) = self.diagnostics.dump() {
            warn!("Debug dump incomplete: {:#}", e);
        }
        Ok(ctx.results.throughput())
    }

    fn spawn_all(
        &self,
        gate: &Arc<StartGate>,
        dispatchers: Vec<DispatchWorker>,
        clock: Option<SimulationClock>,
        spawned: &mut Spawned,
    ) -> Result<()> {
        let ctx = &self.ctx;
        let sim = &self.config.simulation;

        for worker in dispatchers {
            let name = worker.name().to_string();
            spawned.dispatch.push(spawn_worker(name, Arc::clone(gate), move |start| {
                worker.run(start)
            })?);
        }

        if let Some(mut clock) = clock {
            let stop = Arc::clone(&ctx.stop);
            spawned.others.push(spawn_worker("simulation", Arc::clone(gate), move |start| {
                clock.run(start, &stop);
                Ok(WorkerOutcome::Stopped)
            })?);
        }

        let mut commands = CommandWorker::new(
            ctx.queue.clone(),
            Arc::clone(&ctx.executor),
            sim.commands.max_connects,
            sim.commands.poll_interval(),
            Arc::clone(&ctx.stop),
        );
        if let Some(history) = self.diagnostics.request_history() {
            commands = commands.with_history(Arc::clone(history));
        }
        spawned.others.push(spawn_worker("commands", Arc::clone(gate), move |_| commands.run())?);

        if sim.sweep.enabled {
            let sweeper = Sweeper::new(
                ctx.registry.endpoints().cloned().collect(),
                sim.sweep.values.clone(),
                sim.sweep.length,
                ctx.queue.clone(),
                Arc::clone(&ctx.stop),
            );
            spawned.others.push(spawn_worker("sweep", Arc::clone(gate), move |_| sweeper.run())?);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Spawned {
    dispatch: Vec<WorkerHandle>,
    others: Vec<WorkerHandle>,
}

/// Join and log finished workers, returning the ones still running
fn reap(handles: Vec<WorkerHandle>) -> Vec<WorkerHandle> {
    let (finished, running): (Vec<_>, Vec<_>) = handles.into_iter().partition(|h| h.is_finished());
    for handle in finished {
        let name = handle.name().to_string();
        match handle.join() {
            WorkerOutcome::Crashed(reason) => {
                error!(worker = %name, "Worker crashed, its lights stop updating: {}", reason)
            }
            outcome => debug!(worker = %name, "Worker {}", outcome),
        }
    }
    running
}
