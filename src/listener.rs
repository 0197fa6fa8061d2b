// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::validate_interval;
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::dispatch::ProtocolDispatcher;
use crate::error::Result;
use crate::event::{ClientEvent, EventSender};
use crate::protocol::Command;
use crate::registry::DeviceRegistry;
use crate::transport::broadcast::{BroadcastSocket, Broadcaster};

/// Pause after a socket receive error before the loop tries again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of the background listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ListenerState::Stopped => "stopped",
            ListenerState::Starting => "starting",
            ListenerState::Running => "running",
            ListenerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    /// Ask every known device for its color. First poll goes out at once.
    Refresh,
    /// Re-send the discovery probe. `start` already sent one, so the first
    /// tick waits a full period.
    Discover,
}

impl TimerKind {
    fn first_tick(self, period: Duration) -> Instant {
        match self {
            TimerKind::Refresh => Instant::now(),
            TimerKind::Discover => Instant::now() + period,
        }
    }
}

/// Tasks spawned by one `start`, torn down together by `stop`.
struct RunningUnits {
    shutdown_tx: watch::Sender<bool>,
    receive_loops: Vec<JoinHandle<()>>,
    timers: Vec<JoinHandle<()>>,
}

/// Owns the receive loops and periodic timers and drives the
/// `Stopped → Starting → Running → Stopping → Stopped` lifecycle.
///
/// State changes are compare-and-set on a watch channel. `start` and `stop`
/// also serialize on the `units` lock, so concurrent callers cannot both win
/// the same transition.
pub struct ListenerSupervisor {
    broadcaster: Arc<Broadcaster>,
    dispatcher: ProtocolDispatcher,
    registry: Arc<DeviceRegistry>,
    event_tx: EventSender,
    state_tx: Arc<watch::Sender<ListenerState>>,
    units: Mutex<Option<RunningUnits>>,
    settle_delay: Duration,
}

impl ListenerSupervisor {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        dispatcher: ProtocolDispatcher,
        registry: Arc<DeviceRegistry>,
        event_tx: EventSender,
        settle_delay: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(ListenerState::Stopped);
        Self {
            broadcaster,
            dispatcher,
            registry,
            event_tx,
            state_tx: Arc::new(state_tx),
            units: Mutex::new(None),
            settle_delay,
        }
    }

    pub fn state(&self) -> ListenerState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state_tx.subscribe()
    }

    /// Start listening on every socket.
    ///
    /// `refresh_ms` and `discover_ms` are timer periods in milliseconds; 0
    /// disables a timer and any other value below 500 is rejected before any
    /// state change. Starting when not `Stopped` does nothing.
    ///
    /// Once running, one discovery probe goes out and the call returns after
    /// the configured settle delay.
    pub async fn start(&self, refresh_ms: u64, discover_ms: u64) -> Result<()> {
        let refresh = validate_interval("refresh interval", refresh_ms)?;
        let discover = validate_interval("discover interval", discover_ms)?;

        let mut units = self.units.lock().await;
        if !transition(
            &self.state_tx,
            &self.event_tx,
            &[ListenerState::Stopped],
            ListenerState::Starting,
        ) {
            debug!(state = %self.state(), "Listener not stopped, start ignored");
            return Ok(());
        }

        let (shutdown_tx, _) = watch::channel(false);

        let receive_loops: Vec<JoinHandle<()>> = self
            .broadcaster
            .all_sockets()
            .map(|socket| {
                spawn_receive_loop(
                    socket.clone(),
                    self.dispatcher.clone(),
                    shutdown_tx.subscribe(),
                )
            })
            .collect();

        let mut timers = Vec::new();
        for (kind, period) in [(TimerKind::Refresh, refresh), (TimerKind::Discover, discover)] {
            if let Some(period) = period {
                timers.push(spawn_timer(
                    kind,
                    period,
                    self.broadcaster.clone(),
                    self.registry.clone(),
                    shutdown_tx.subscribe(),
                ));
            }
        }

        info!(
            sockets = receive_loops.len(),
            timers = timers.len(),
            "Listener started"
        );
        *units = Some(RunningUnits {
            shutdown_tx,
            receive_loops,
            timers,
        });
        transition(
            &self.state_tx,
            &self.event_tx,
            &[ListenerState::Starting],
            ListenerState::Running,
        );
        drop(units);

        self.broadcaster.discover().await;
        sleep(self.settle_delay).await;
        Ok(())
    }

    /// Request shutdown and return immediately.
    ///
    /// The state moves to `Stopping` now and to `Stopped` once every receive
    /// loop and timer has exited. Stopping a listener that is not running does
    /// nothing.
    pub async fn stop(&self) {
        let mut units = self.units.lock().await;
        if !matches!(
            self.state(),
            ListenerState::Running | ListenerState::Starting
        ) {
            debug!(state = %self.state(), "Listener not running, stop ignored");
            return;
        }
        let Some(running) = units.take() else {
            return;
        };
        transition(
            &self.state_tx,
            &self.event_tx,
            &[ListenerState::Running, ListenerState::Starting],
            ListenerState::Stopping,
        );
        drop(units);

        let _ = running.shutdown_tx.send(true);

        let state_tx = self.state_tx.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let handles = running.receive_loops.into_iter().chain(running.timers);
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Listener task ended abnormally: {}", e);
                }
            }
            transition(
                &state_tx,
                &event_tx,
                &[ListenerState::Stopping],
                ListenerState::Stopped,
            );
            info!("Listener stopped");
        });
    }

    /// Resolve once the listener is `Stopped`.
    pub async fn wait_until_stopped(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == ListenerState::Stopped).await;
    }

    /// Number of periodic timer tasks owned by the current run.
    pub async fn timer_units(&self) -> usize {
        self.units
            .lock()
            .await
            .as_ref()
            .map_or(0, |running| running.timers.len())
    }
}

impl std::fmt::Debug for ListenerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSupervisor")
            .field("state", &self.state())
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl Drop for ListenerSupervisor {
    fn drop(&mut self) {
        if let Some(running) = self.units.get_mut().take() {
            let _ = running.shutdown_tx.send(true);
            for handle in running.receive_loops.iter().chain(running.timers.iter()) {
                handle.abort();
            }
        }
    }
}

/// Compare-and-set the listener state. Returns whether it changed.
fn transition(
    state_tx: &watch::Sender<ListenerState>,
    event_tx: &EventSender,
    from: &[ListenerState],
    to: ListenerState,
) -> bool {
    let changed = state_tx.send_if_modified(|state| {
        if from.contains(state) {
            *state = to;
            true
        } else {
            false
        }
    });
    if changed {
        debug!(state = %to, "Listener state changed");
        let _ = event_tx.send(ClientEvent::ListenerStateChanged(to));
    }
    changed
}

fn spawn_receive_loop(
    socket: Arc<BroadcastSocket>,
    dispatcher: ProtocolDispatcher,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let local = socket.local_addr();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        debug!(%local, "Receive loop started");

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = socket.recv(&mut buf) => match received {
                    Ok((n, source)) => {
                        dispatcher.dispatch(local, source, &buf[..n]).await;
                    }
                    Err(e) => {
                        warn!(%local, error = %e, "Receive failed");
                        sleep(RECV_ERROR_BACKOFF).await;
                    }
                },
            }
        }
        debug!(%local, "Receive loop exited");
    })
}

fn spawn_timer(
    kind: TimerKind,
    period: Duration,
    broadcaster: Arc<Broadcaster>,
    registry: Arc<DeviceRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(kind.first_tick(period), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => match kind {
                    TimerKind::Refresh => {
                        let devices = registry.snapshot().await;
                        broadcaster
                            .send_ctrl(&Command::GetLedStatus.to_payload(), &devices)
                            .await;
                    }
                    TimerKind::Discover => broadcaster.discover().await,
                },
            }
        }
        debug!(?kind, "Timer exited");
    })
}
