//! Report watcher orchestrator
//!
//! One actor task per relay owns all watcher state and handles one input at a
//! time: control commands, relay frames, timer wakes and enforcement
//! completions. [`ReportWatcher`] is the cloneable handle the control surface
//! talks to.
//!
//! Enforcement never runs on the actor itself. Qualifying reports are handed
//! to spawned tasks that report back over a channel, so the relay stream keeps
//! draining while hide calls are pending. An in-flight set and a cache of
//! recently enforced targets keep duplicate reports from racing past the
//! decision-log check.

use crate::audit::{DecisionLog, ReviewMarkers};
use crate::backoff::ReconnectBackoff;
use crate::config::WatcherConfig;
use crate::connection::ConnectionManager;
use crate::executor::{ContentHider, Executor};
use crate::guard::{DedupGuard, StoreFailurePolicy};
use crate::pipeline::{EnforcementPipeline, PipelineOutcome};
use crate::policy::{PolicyVerdict, TrustPolicy};
use crate::report::{ReportEvent, ReportNormalizer, TargetKey};
use crate::scheduler::{Scheduler, Wake};
use crate::state::{ControlResponse, StateStore, WatcherState, WatcherStatus};
use crate::{Result, WatcherError};
use chrono::Utc;
use lru::LruCache;
use nostr_client::{Event, RelayConnector, RelayMessage};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// External collaborators of a watcher
pub struct WatcherServices {
    /// Opens relay connections
    pub connector: Arc<dyn RelayConnector>,
    /// Hides content on the relay
    pub hider: Arc<dyn ContentHider>,
    /// Decision audit log
    pub decisions: Arc<dyn DecisionLog>,
    /// Human review markers
    pub reviews: Arc<dyn ReviewMarkers>,
    /// Durable watcher state
    pub state_store: Arc<dyn StateStore>,
    /// Guard behaviour when a store fails
    pub failure_policy: StoreFailurePolicy,
    /// Report normalizer
    pub normalizer: ReportNormalizer,
}

impl WatcherServices {
    /// Services with the default normalizer and fail-open guard
    pub fn new(
        connector: Arc<dyn RelayConnector>,
        hider: Arc<dyn ContentHider>,
        decisions: Arc<dyn DecisionLog>,
        reviews: Arc<dyn ReviewMarkers>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            connector,
            hider,
            decisions,
            reviews,
            state_store,
            failure_policy: StoreFailurePolicy::default(),
            normalizer: ReportNormalizer::default(),
        }
    }

    /// Set the guard's store failure policy
    pub fn failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Use a custom normalizer
    pub fn normalizer(mut self, normalizer: ReportNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }
}

type Reply = oneshot::Sender<ControlResponse>;

enum Command {
    Start(Reply),
    Stop(Reply),
    Status(Reply),
    Shutdown(oneshot::Sender<()>),
}

struct Completion {
    target: TargetKey,
    outcome: PipelineOutcome,
}

/// Handle to a running watcher actor
#[derive(Debug, Clone)]
pub struct ReportWatcher {
    commands: mpsc::Sender<Command>,
}

impl ReportWatcher {
    /// Spawn the watcher actor on the current runtime
    ///
    /// The actor first restores saved state; if the watcher was running when
    /// the state was saved, it reconnects without waiting for [`start`].
    ///
    /// [`start`]: ReportWatcher::start
    pub fn spawn(config: WatcherConfig, services: WatcherServices) -> Result<Self> {
        config.validate()?;
        let (commands, inbox) = mpsc::channel(config.inbox_capacity);
        let actor = WatcherActor::new(config, services, inbox);
        tokio::spawn(actor.run());
        Ok(Self { commands })
    }

    /// Start watching; fails softly with "already running"
    pub async fn start(&self) -> Result<ControlResponse> {
        self.request(Command::Start).await
    }

    /// Stop watching; fails softly with "not running"
    pub async fn stop(&self) -> Result<ControlResponse> {
        self.request(Command::Stop).await
    }

    /// Current state plus live connection status
    pub async fn status(&self) -> Result<ControlResponse> {
        self.request(Command::Status).await
    }

    /// Close the connection, save state and end the actor
    ///
    /// The `running` flag is saved as-is so a restarted process resumes.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Shutdown(tx)).await.map_err(|_| WatcherError::ActorGone)?;
        rx.await.map_err(|_| WatcherError::ActorGone)
    }

    async fn request(&self, command: fn(Reply) -> Command) -> Result<ControlResponse> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(command(tx)).await.map_err(|_| WatcherError::ActorGone)?;
        rx.await.map_err(|_| WatcherError::ActorGone)
    }
}

struct WatcherActor {
    config: WatcherConfig,
    state: WatcherState,
    connection: ConnectionManager,
    scheduler: Scheduler,
    backoff: ReconnectBackoff,
    normalizer: ReportNormalizer,
    policy: TrustPolicy,
    pipeline: EnforcementPipeline,
    state_store: Arc<dyn StateStore>,
    inbox: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    in_flight: HashSet<TargetKey>,
    enforced: LruCache<TargetKey, ()>,
}

impl WatcherActor {
    fn new(config: WatcherConfig, services: WatcherServices, inbox: mpsc::Receiver<Command>) -> Self {
        let guard = DedupGuard::new(services.decisions.clone(), services.reviews)
            .with_failure_policy(services.failure_policy);
        let pipeline =
            EnforcementPipeline::new(guard, Executor::new(services.hider), services.decisions);
        let connection = ConnectionManager::new(
            services.connector,
            config.relay_url.clone(),
            config.subscription_id.clone(),
            config.connect_timeout,
        );
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let capacity = NonZeroUsize::new(config.enforced_cache_capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            state: WatcherState::new(config.initial_reconnect_delay),
            connection,
            scheduler: Scheduler::new(config.health_check_interval),
            backoff: ReconnectBackoff::new(config.initial_reconnect_delay, config.max_reconnect_delay),
            normalizer: services.normalizer,
            policy: TrustPolicy::from_config(&config),
            pipeline,
            state_store: services.state_store,
            inbox,
            completions_tx,
            completions,
            in_flight: HashSet::new(),
            enforced: LruCache::new(capacity),
            config,
        }
    }

    async fn run(mut self) {
        self.restore().await;

        loop {
            tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                frame = self.connection.next_frame() => self.handle_frame(frame),
                wake = self.scheduler.next_wake() => self.handle_wake(wake).await,
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
            }
        }

        tracing::debug!("Watcher actor for {} exited", self.config.relay_url);
    }

    async fn restore(&mut self) {
        match self.state_store.load().await {
            Ok(Some(saved)) => {
                self.state = saved
                    .restored(self.config.initial_reconnect_delay, self.config.max_reconnect_delay);
                self.backoff.restore(self.state.reconnect_delay, self.state.reconnect_attempts);
                self.sync_backoff();
                tracing::info!(
                    "Restored watcher state (running: {}, processed: {}, auto-hidden: {})",
                    self.state.running,
                    self.state.events_processed,
                    self.state.events_auto_hidden
                );
            }
            Ok(None) => tracing::debug!("No saved watcher state"),
            Err(e) => tracing::warn!("Failed to load watcher state, starting fresh: {}", e),
        }

        if self.state.running {
            tracing::info!("Watcher was running before restart, reconnecting");
            self.scheduler.start_health();
            self.connect_now().await;
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        let (reply, response) = match command {
            Command::Start(reply) => (reply, self.start().await),
            Command::Stop(reply) => (reply, self.stop().await),
            Command::Status(reply) => {
                let message = if self.state.running { "running" } else { "stopped" };
                (reply, self.respond(true, message))
            }
            Command::Shutdown(_) => return,
        };
        let _ = reply.send(response);
    }

    async fn start(&mut self) -> ControlResponse {
        if self.state.running {
            return self.respond(false, "already running");
        }

        tracing::info!("Starting report watcher for {}", self.config.relay_url);
        self.state.running = true;
        self.persist().await;
        self.scheduler.start_health();
        self.connect_now().await;

        if self.connection.is_connected() {
            self.respond(true, "watcher started")
        } else {
            self.respond(true, "watcher started, connection pending")
        }
    }

    async fn stop(&mut self) -> ControlResponse {
        if !self.state.running {
            return self.respond(false, "not running");
        }

        tracing::info!("Stopping report watcher for {}", self.config.relay_url);
        self.state.running = false;
        self.scheduler.stop();
        self.connection.disconnect().await;
        self.state.connected_at = None;
        self.backoff.reset();
        self.sync_backoff();
        self.persist().await;

        self.respond(true, "watcher stopped")
    }

    async fn shutdown(&mut self) {
        self.scheduler.stop();
        self.connection.disconnect().await;
        self.state.connected_at = None;
        self.persist().await;
        tracing::info!("Watcher for {} shut down", self.config.relay_url);
    }

    fn respond(&self, success: bool, message: &str) -> ControlResponse {
        ControlResponse { success, message: message.to_string(), status: self.status() }
    }

    fn status(&self) -> WatcherStatus {
        WatcherStatus {
            state: self.state.clone(),
            connected: self.connection.is_connected(),
            auto_hide_enabled: self.policy.is_enabled(),
        }
    }

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    async fn connect_now(&mut self) {
        match self.connection.connect().await {
            Ok(()) => {
                self.scheduler.cancel_reconnect();
                self.backoff.reset();
                self.sync_backoff();
                self.state.connected_at = Some(Utc::now());
            }
            Err(e) => {
                tracing::warn!("Connection to {} failed: {}", self.config.relay_url, e);
                self.schedule_reconnect();
            }
        }
    }

    fn handle_lost(&mut self, reason: &str) {
        tracing::warn!("Lost connection to {}: {}", self.config.relay_url, reason);
        self.connection.mark_lost();
        self.state.connected_at = None;
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.state.running {
            return;
        }

        let delay = self.backoff.next_delay();
        self.scheduler.schedule_reconnect(delay);
        self.sync_backoff();
        tracing::info!(
            "Reconnecting to {} in {:?} (attempt {})",
            self.config.relay_url,
            delay,
            self.state.reconnect_attempts
        );
    }

    fn sync_backoff(&mut self) {
        self.state.reconnect_attempts = self.backoff.attempts();
        self.state.reconnect_delay = self.backoff.current_delay();
    }

    async fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Reconnect => {
                // Stop disarms the timer; this covers a wake already in flight
                if !self.state.running || self.connection.is_connected() {
                    return;
                }
                self.connect_now().await;
            }
            Wake::HealthCheck => {
                if !self.state.running {
                    return;
                }
                if !self.connection.is_connected() && !self.scheduler.reconnect_pending() {
                    tracing::info!("Health check found no connection, reconnecting");
                    self.connect_now().await;
                } else {
                    tracing::debug!(
                        "Health check: connected={}, processed={}",
                        self.connection.is_connected(),
                        self.state.events_processed
                    );
                }
                self.persist().await;
            }
        }
    }

    async fn persist(&mut self) {
        if let Err(e) = self.state_store.save(&self.state).await {
            tracing::warn!("Failed to save watcher state: {}", e);
        }
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    fn handle_frame(&mut self, frame: Option<nostr_client::Result<String>>) {
        let text = match frame {
            None => return self.handle_lost("stream ended"),
            Some(Err(nostr_client::Error::Protocol(e))) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                return;
            }
            Some(Err(e)) => return self.handle_lost(&e.to_string()),
            Some(Ok(text)) => text,
        };

        match RelayMessage::parse(&text) {
            Err(e) => tracing::warn!("Dropping malformed frame: {}", e),
            Ok(RelayMessage::Event { subscription_id, event })
                if subscription_id == self.connection.subscription_id() =>
            {
                self.handle_report(&event)
            }
            Ok(RelayMessage::Event { subscription_id, .. }) => {
                tracing::debug!("Ignoring event for subscription {}", subscription_id)
            }
            Ok(RelayMessage::Eose { .. }) => tracing::debug!("Relay finished sending stored reports"),
            Ok(RelayMessage::Notice { message }) => tracing::info!("Relay notice: {}", message),
            Ok(RelayMessage::Closed { subscription_id, message })
                if subscription_id == self.connection.subscription_id() =>
            {
                self.handle_lost(&format!("subscription closed by relay: {}", message))
            }
            Ok(other) => tracing::debug!("Ignoring frame {:?}", other),
        }
    }

    fn handle_report(&mut self, event: &Event) {
        let report = match self.normalizer.normalize(event) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Dropping event {}: {}", event.id, e);
                return;
            }
        };

        self.state.events_processed += 1;
        self.state.last_event_at = Some(Utc::now());
        tracing::debug!(
            "Report {} against {} ({}, client {:?})",
            report.id,
            report.target(),
            report.category,
            report.reporting_client
        );

        match self.policy.evaluate(&report) {
            PolicyVerdict::Skip(reason) => {
                tracing::info!("Report {} not eligible for auto-hide: {}", report.id, reason);
                self.spawn_skip(report, reason);
            }
            PolicyVerdict::Qualifies => {
                let target = report.target();
                if self.in_flight.contains(&target) {
                    self.spawn_skip(report, "enforcement already in progress".to_string());
                } else if self.enforced.contains(&target) {
                    self.spawn_skip(report, "already auto-hidden".to_string());
                } else {
                    self.in_flight.insert(target.clone());
                    self.spawn_enforcement(report, target);
                }
            }
        }
    }

    fn spawn_skip(&self, report: ReportEvent, reason: String) {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            pipeline.skip(&report, &reason).await;
        });
    }

    fn spawn_enforcement(&self, report: ReportEvent, target: TargetKey) {
        let pipeline = self.pipeline.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = pipeline.enforce(&report).await;
            let _ = completions.send(Completion { target, outcome });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        self.in_flight.remove(&completion.target);

        match completion.outcome {
            PipelineOutcome::Hidden => {
                self.state.events_auto_hidden += 1;
                self.enforced.put(completion.target, ());
            }
            PipelineOutcome::Failed(error) => {
                tracing::debug!("Enforcement for {} failed: {}", completion.target, error)
            }
            PipelineOutcome::Skipped(reason) => {
                tracing::debug!("Enforcement for {} skipped: {}", completion.target, reason)
            }
        }
    }
}
