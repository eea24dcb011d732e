// Recognition engine
// Owns the shared arbitrator and bus, and drives one task per source:
// inertial channels on the async runtime, pose estimators on blocking threads,
// plus a periodic tick that releases deferred proposals

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::arbiter::Arbitrator;
use crate::bus::EventBus;
use crate::config::{ConfigError, EngineConfig};
use crate::events::{ActionEvent, Proposal, SourceId, SourceKind};
use crate::pipeline::session::{InertialSession, PoseSession};
use crate::sample::{ingest_inertial, InertialSample, Millis, PoseFrame, RawInertialRecord};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine has been shut down")]
    ShutDown,
}

/// Monotonic milliseconds since the engine started
#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    origin: Instant,
}

impl EngineClock {
    pub fn new() -> Self {
        EngineClock {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> Millis {
        Millis::try_from(self.origin.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Yields pose frames until the stream ends
pub trait PoseEstimator: Send + 'static {
    /// Blocks until the next frame; None ends the stream
    fn next_frame(&mut self) -> Option<PoseFrame>;
}

/// Publishes proposals, arbitrates them and publishes the winners
#[derive(Clone)]
pub struct ActionRouter {
    arbitrator: Arc<Arbitrator>,
    bus: Arc<EventBus>,
}

impl ActionRouter {
    pub fn new(arbitrator: Arc<Arbitrator>, bus: Arc<EventBus>) -> Self {
        ActionRouter { arbitrator, bus }
    }

    /// Returns the events published as a result
    pub fn route(&self, proposals: &[Proposal]) -> Vec<ActionEvent> {
        let mut published = Vec::new();
        for proposal in proposals {
            self.bus.gestures.publish(proposal);
            for event in self.arbitrator.submit(*proposal).events() {
                self.bus.actions.publish(&event);
                published.push(event);
            }
        }
        published
    }

    /// Release and publish deferred proposals that have waited long enough
    pub fn tick(&self, now_ms: Millis) -> Vec<ActionEvent> {
        let released = self.arbitrator.poll(now_ms);
        for event in &released {
            self.bus.actions.publish(event);
        }
        released
    }
}

/// Shared recognition state plus the tasks feeding it
///
/// Spawning the first source also starts the tick that releases deferred
/// proposals, so a proposal held back for a preferred source is published
/// within a window even when nothing else arrives.
pub struct Engine {
    config: EngineConfig,
    clock: EngineClock,
    arbitrator: Arc<Arbitrator>,
    bus: Arc<EventBus>,
    router: ActionRouter,
    shutdown: Arc<AtomicBool>,
    ticker_started: AtomicBool,
    next_inertial: AtomicU16,
    next_camera: AtomicU16,
}

impl Engine {
    /// Validate the configuration and build the shared state
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let arbitrator = Arc::new(Arbitrator::new(config.arbiter.clone()));
        let bus = Arc::new(EventBus::new());
        let router = ActionRouter::new(Arc::clone(&arbitrator), Arc::clone(&bus));

        Ok(Engine {
            config,
            clock: EngineClock::new(),
            arbitrator,
            bus,
            router,
            shutdown: Arc::new(AtomicBool::new(false)),
            ticker_started: AtomicBool::new(false),
            next_inertial: AtomicU16::new(0),
            next_camera: AtomicU16::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> EngineClock {
        self.clock
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn arbitrator(&self) -> Arc<Arbitrator> {
        Arc::clone(&self.arbitrator)
    }

    pub fn router(&self) -> ActionRouter {
        self.router.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.is_shut_down() {
            Err(EngineError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Tick often enough that a deferred proposal waits at most a little
    /// longer than the arbitration window
    fn tick_period(&self) -> Duration {
        Duration::from_millis((self.config.arbiter.arbitration_window_ms / 4).clamp(5, 50))
    }

    fn ensure_ticker(&self) -> Result<(), EngineError> {
        if self.ticker_started.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.spawn_ticker(self.tick_period()).map(|_| ())
    }

    /// Drive a handheld device from a channel of raw records
    /// The task ends, unregistering the source, when every sender is dropped
    /// Must be called from within a tokio runtime
    pub fn spawn_inertial(
        &self,
        mut records: mpsc::Receiver<RawInertialRecord>,
    ) -> Result<JoinHandle<SourceId>, EngineError> {
        self.ensure_running()?;
        self.ensure_ticker()?;

        let source = SourceId::inertial(self.next_inertial.fetch_add(1, Ordering::SeqCst));
        let mut session = InertialSession::new(source, &self.config);
        let clock = self.clock;
        let bus = Arc::clone(&self.bus);
        let router = self.router.clone();
        let arbitrator = Arc::clone(&self.arbitrator);

        arbitrator.register_source(SourceKind::Inertial);
        log::info!("{} connected", source);

        Ok(tokio::spawn(async move {
            while let Some(record) = records.recv().await {
                let sample = match ingest_inertial(&record) {
                    Ok(sample) => sample,
                    Err(e) => {
                        log::debug!("{}: dropped record: {}", source, e);
                        continue;
                    }
                };

                if let InertialSample::Button(edge) = &sample {
                    bus.buttons.publish(edge);
                }
                let proposals = session.handle(&sample, clock.now_ms());
                router.route(&proposals);
            }

            arbitrator.unregister_source(SourceKind::Inertial);
            log::info!("{} disconnected", source);
            source
        }))
    }

    /// Run a pose estimator on a blocking thread until it reports end of
    /// stream or the engine shuts down
    pub fn spawn_pose<E: PoseEstimator>(
        &self,
        mut estimator: E,
    ) -> Result<JoinHandle<SourceId>, EngineError> {
        self.ensure_running()?;
        self.ensure_ticker()?;

        let source = SourceId::camera(self.next_camera.fetch_add(1, Ordering::SeqCst));
        let mut session = PoseSession::new(source, &self.config);
        let clock = self.clock;
        let router = self.router.clone();
        let arbitrator = Arc::clone(&self.arbitrator);
        let shutdown = Arc::clone(&self.shutdown);

        arbitrator.register_source(SourceKind::Camera);
        log::info!("{} connected", source);

        Ok(tokio::task::spawn_blocking(move || {
            while !shutdown.load(Ordering::SeqCst) {
                let Some(frame) = estimator.next_frame() else {
                    break;
                };
                let proposals = session.handle(&frame, clock.now_ms());
                router.route(&proposals);
            }

            arbitrator.unregister_source(SourceKind::Camera);
            log::info!("{} disconnected", source);
            source
        }))
    }

    /// Periodically release deferred proposals
    /// Only needed for a custom period; spawning a source starts one
    pub fn spawn_ticker(&self, period: Duration) -> Result<JoinHandle<()>, EngineError> {
        self.ensure_running()?;
        self.ticker_started.store(true, Ordering::SeqCst);

        let clock = self.clock;
        let router = self.router.clone();
        let shutdown = Arc::clone(&self.shutdown);

        Ok(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                router.tick(clock.now_ms());
            }
        }))
    }

    /// Stop the pose workers and the ticker; inertial tasks end with their
    /// channels
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            log::info!("Engine shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ChannelSubscriber, FnSubscriber, SubscriberError};
    use crate::events::Action;
    use crate::sample::{ButtonEdge, Landmark, Leg};
    use std::collections::VecDeque;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    struct ScriptedEstimator {
        frames: VecDeque<PoseFrame>,
    }

    impl PoseEstimator for ScriptedEstimator {
        fn next_frame(&mut self) -> Option<PoseFrame> {
            self.frames.pop_front()
        }
    }

    /// Never ends on its own
    struct EndlessEstimator {
        t: Millis,
    }

    impl PoseEstimator for EndlessEstimator {
        fn next_frame(&mut self) -> Option<PoseFrame> {
            std::thread::sleep(Duration::from_millis(5));
            self.t += 33;
            Some(standing(0.5, self.t))
        }
    }

    fn standing(hip_x: f64, t: Millis) -> PoseFrame {
        let leg = Leg {
            hip: Landmark::new(hip_x, 0.5),
            knee: Landmark::new(hip_x, 0.7),
            ankle: Landmark::new(hip_x, 0.9),
        };
        PoseFrame {
            left: leg,
            right: leg,
            capture_ms: t,
            ..PoseFrame::default()
        }
    }

    fn subscribe_actions(engine: &Engine) -> UnboundedReceiver<ActionEvent> {
        let (subscriber, receiver) = ChannelSubscriber::<ActionEvent>::channel();
        engine.bus().actions.subscribe(Arc::new(subscriber));
        receiver
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.attack.low = 40.0;

        assert!(matches!(
            Engine::new(config),
            Err(EngineError::Config(ConfigError::Hysteresis { .. }))
        ));
    }

    #[tokio::test]
    async fn test_inertial_stream_end_to_end() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut actions = subscribe_actions(&engine);

        let (tx, rx) = mpsc::channel(16);
        let handle = engine.spawn_inertial(rx).unwrap();
        assert_eq!(engine.arbitrator().registered(SourceKind::Inertial), 1);

        for (values, t) in [
            (vec![0.0, 0.0, 9.8], 0),
            (vec![0.0, 0.0, 9.8], 20),
            (vec![30.0, 0.0, 9.8], 40),
        ] {
            tx.send(RawInertialRecord::new("accel", values, t)).await.unwrap();
        }
        // Malformed records are skipped without ending the stream
        tx.send(RawInertialRecord::new("barometer", vec![1.0], 50)).await.unwrap();
        drop(tx);

        let source = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(source, SourceId::inertial(0));
        assert_eq!(engine.arbitrator().registered(SourceKind::Inertial), 0);

        let event = timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, Action::Attack);
        assert_eq!(event.source, SourceId::inertial(0));
        assert!(timeout(QUIET, actions.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_button_edges_published() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut actions = subscribe_actions(&engine);
        let (edges, mut edge_rx) = ChannelSubscriber::<ButtonEdge>::channel();
        engine.bus().buttons.subscribe(Arc::new(edges));

        let (tx, rx) = mpsc::channel(4);
        let handle = engine.spawn_inertial(rx).unwrap();
        tx.send(RawInertialRecord::new("button", vec![25.0, 1.0], 10)).await.unwrap();
        tx.send(RawInertialRecord::new("button", vec![25.0, 0.0], 90)).await.unwrap();
        drop(tx);
        timeout(WAIT, handle).await.unwrap().unwrap();

        let pressed = timeout(WAIT, edge_rx.recv()).await.unwrap().unwrap();
        assert!(pressed.pressed);
        let released = timeout(WAIT, edge_rx.recv()).await.unwrap().unwrap();
        assert!(!released.pressed);

        let event = timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, Action::Parry);
    }

    #[tokio::test]
    async fn test_pose_worker_end_to_end() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut actions = subscribe_actions(&engine);

        let frames = [0.40, 0.43, 0.46, 0.49, 0.52]
            .iter()
            .enumerate()
            .map(|(i, x)| standing(*x, i as Millis * 33))
            .collect();
        let handle = engine.spawn_pose(ScriptedEstimator { frames }).unwrap();

        let source = timeout(WAIT, handle).await.unwrap().unwrap();
        assert_eq!(source, SourceId::camera(0));
        assert_eq!(engine.arbitrator().registered(SourceKind::Camera), 0);

        let event = timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, Action::DashIn);
        assert_eq!(event.source, source);
    }

    #[test]
    fn test_route_does_not_wait_for_subscribers() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.bus().actions.subscribe(Arc::new(FnSubscriber(
            |_: &ActionEvent| -> Result<(), SubscriberError> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            },
        )));

        let swing = Proposal::new(Action::Attack, SourceId::inertial(0), engine.clock().now_ms());
        let started = Instant::now();
        let published = engine.router().route(&[swing]);

        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(published.len(), 1);
    }

    #[tokio::test]
    async fn test_spawning_a_source_starts_the_ticker() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut actions = subscribe_actions(&engine);

        // An open phone channel makes inertial the preferred jump source
        let (tx, rx) = mpsc::channel(4);
        let handle = engine.spawn_inertial(rx).unwrap();

        let camera_jump = Proposal::new(Action::Jump, SourceId::camera(0), engine.clock().now_ms());
        assert!(engine.router().route(&[camera_jump]).is_empty());

        // Released by the engine's own tick once the window passes
        let event = timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, Action::Jump);
        assert_eq!(event.source, SourceId::camera(0));

        drop(tx);
        timeout(WAIT, handle).await.unwrap().unwrap();
        engine.shutdown();
    }

    #[tokio::test]
    async fn test_ticker_releases_deferred_proposal() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut actions = subscribe_actions(&engine);
        engine.arbitrator().register_source(SourceKind::Inertial);

        let camera_jump = Proposal::new(Action::Jump, SourceId::camera(0), engine.clock().now_ms());
        assert!(engine.router().route(&[camera_jump]).is_empty());

        let ticker = engine.spawn_ticker(Duration::from_millis(10)).unwrap();
        let event = timeout(WAIT, actions.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, Action::Jump);
        assert_eq!(event.source, SourceId::camera(0));

        engine.shutdown();
        timeout(WAIT, ticker).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_pose_worker() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let handle = engine.spawn_pose(EndlessEstimator { t: 0 }).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        engine.shutdown();

        assert_eq!(timeout(WAIT, handle).await.unwrap().unwrap(), SourceId::camera(0));
        assert!(matches!(
            engine.spawn_ticker(Duration::from_millis(10)),
            Err(EngineError::ShutDown)
        ));
    }
}
