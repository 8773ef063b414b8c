//! Per-server monitoring worker.
//!
//! One worker owns the four periodic loops for a single server: session
//! polling, player evaluation, punishment scanning, and the inactivity
//! check. All loops share one cancellation token and exit promptly when it
//! fires. Per-player tracking lives in concurrent maps with per-key atomic
//! access; no map guard is ever held across an await point.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use tokio::time::{Instant, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::schema::ServerEntry;
use crate::error::RconError;
use crate::fence::{self, Fence, Grid};
use crate::observability::metrics;
use crate::rcon::pool::ConnectionPool;
use crate::rcon::types::{PlayerSnapshot, SessionInfo, TeamSide};
use crate::watch::restart::RestartSignal;

const SESSION_POLL_INTERVAL: Duration = Duration::from_secs(1);
const PLAYER_POLL_INTERVAL: Duration = Duration::from_millis(500);
const PUNISH_SCAN_INTERVAL: Duration = Duration::from_secs(1);
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Width of the punishment eligibility window after the grace period.
/// Entries older than the window are assumed already punished or stale.
const PUNISH_WINDOW: Duration = Duration::from_secs(5);

/// Delay between a successful punish call and removal of the outside
/// entry; roster polls may still report the pre-punish position until the
/// player respawns.
const PUNISH_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Player polls are skipped for this long after startup.
const STARTUP_GRACE: Duration = Duration::from_secs(5);

/// Cap on concurrently evaluated players per roster poll.
const MAX_CONCURRENT_EVALUATIONS: usize = 16;

/// Tracking entry for a player currently outside every applicable fence.
#[derive(Debug, Clone)]
struct OutsidePlayer {
    name: String,
    last_grid: Grid,
    first_outside: Instant,
    punish_pending: bool,
}

/// Applicable fence subsets, replaced wholesale on every session refresh.
#[derive(Clone)]
struct ApplicableFences {
    allies: Arc<[Fence]>,
    axis: Arc<[Fence]>,
}

impl Default for ApplicableFences {
    fn default() -> Self {
        Self {
            allies: Arc::from(Vec::new()),
            axis: Arc::from(Vec::new()),
        }
    }
}

/// Monitoring worker for one configured server.
pub struct Worker {
    server: ServerEntry,
    pool: Arc<ConnectionPool>,
    punish_after: Duration,
    idle_restart: Duration,
    outside: DashMap<String, OutsidePlayer>,
    entered: DashMap<String, ()>,
    session: RwLock<Option<Arc<SessionInfo>>>,
    applicable: RwLock<ApplicableFences>,
    last_map_change: Mutex<Instant>,
    started_at: Instant,
    restart: RestartSignal,
    cancel: CancellationToken,
}

impl Worker {
    /// Creates a worker; no I/O happens until [`Self::run`].
    #[must_use]
    pub fn new(server: ServerEntry, pool: Arc<ConnectionPool>, cancel: CancellationToken) -> Self {
        let punish_after = server.punish_after();
        let idle_restart = server.idle_restart();
        Self {
            server,
            pool,
            punish_after,
            idle_restart,
            outside: DashMap::new(),
            entered: DashMap::new(),
            session: RwLock::new(None),
            applicable: RwLock::new(ApplicableFences::default()),
            last_map_change: Mutex::new(Instant::now()),
            started_at: Instant::now(),
            restart: RestartSignal::new(),
            cancel,
        }
    }

    /// The monitored server's host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.server.host
    }

    /// The worker's restart indication.
    #[must_use]
    pub fn restart_signal(&self) -> &RestartSignal {
        &self.restart
    }

    /// Runs the worker until cancellation.
    ///
    /// The initial session fetch happens before any loop starts; its
    /// failure is fatal to the worker. Afterwards the four periodic loops
    /// run as independent tasks and loop-level errors only delay the next
    /// successful state update.
    ///
    /// # Errors
    ///
    /// Returns the error from the initial session fetch.
    pub async fn run(self: Arc<Self>) -> Result<(), RconError> {
        self.refresh_session().await?;
        info!(host = %self.server.host, "worker started");

        let handles = [
            tokio::spawn(Arc::clone(&self).poll_session()),
            tokio::spawn(Arc::clone(&self).poll_players()),
            tokio::spawn(Arc::clone(&self).punish_outside()),
            tokio::spawn(Arc::clone(&self).check_idle()),
        ];
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(host = %self.server.host, error = %e, "worker loop aborted");
            }
        }
        info!(host = %self.server.host, "worker stopped");
        Ok(())
    }

    // ========================================================================
    // Session polling
    // ========================================================================

    async fn poll_session(self: Arc<Self>) {
        let mut ticker = interval(SESSION_POLL_INTERVAL);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(host = %self.server.host, "session loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_session().await {
                        metrics::record_rcon_error("session");
                        error!(host = %self.server.host, error = %e, "session poll failed");
                    }
                }
            }
        }
    }

    /// Fetches the session and reacts to a map change.
    ///
    /// On a changed map identifier: the last-map-change timestamp is
    /// updated, per-player tracking is cleared, and a restart is requested.
    /// The applicable fence subsets for both sides are recomputed and
    /// replaced in one write so no partial update is visible.
    async fn refresh_session(&self) -> Result<(), RconError> {
        let info = self.pool.session_info().await?;

        let previous = {
            let guard = self.session.read().expect("session lock poisoned");
            guard.as_ref().map(|s| s.map_name.clone())
        };
        if let Some(old_map) = previous.filter(|m| *m != info.map_name) {
            info!(
                host = %self.server.host,
                old_map = %old_map,
                new_map = %info.map_name,
                "map changed"
            );
            *self.last_map_change.lock().expect("map-change lock poisoned") = Instant::now();
            self.clear_tracking();
            self.request_restart("map-change");
        }

        let fences = ApplicableFences {
            allies: fence::applicable(&self.server.allied_fences, &info).into(),
            axis: fence::applicable(&self.server.axis_fences, &info).into(),
        };
        *self.session.write().expect("session lock poisoned") = Some(Arc::new(info));
        *self.applicable.write().expect("fences lock poisoned") = fences;
        Ok(())
    }

    fn clear_tracking(&self) {
        self.outside.clear();
        self.entered.clear();
        metrics::set_players_outside(&self.server.host, 0);
    }

    fn request_restart(&self, reason: &'static str) {
        if self.restart.request() {
            metrics::record_restart_request(reason);
            info!(host = %self.server.host, reason, "restart requested");
        } else {
            warn!(host = %self.server.host, reason, "restart already pending, request dropped");
        }
    }

    // ========================================================================
    // Player evaluation
    // ========================================================================

    async fn poll_players(self: Arc<Self>) {
        let mut ticker = interval(PLAYER_POLL_INTERVAL);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(host = %self.server.host, "player loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if self.started_at.elapsed() < STARTUP_GRACE {
                        continue;
                    }
                    if !self.has_applicable_fences() {
                        continue;
                    }
                    match self.pool.players().await {
                        Ok(roster) => self.evaluate_roster(&roster).await,
                        Err(e) => {
                            metrics::record_rcon_error("players");
                            error!(host = %self.server.host, error = %e, "player poll failed");
                        }
                    }
                }
            }
        }
    }

    fn has_applicable_fences(&self) -> bool {
        let fences = self.applicable.read().expect("fences lock poisoned");
        !(fences.allies.is_empty() && fences.axis.is_empty())
    }

    /// Evaluates every rostered player, then reconciles tracking state
    /// against the roster.
    async fn evaluate_roster(&self, roster: &[PlayerSnapshot]) {
        futures::stream::iter(roster)
            .for_each_concurrent(MAX_CONCURRENT_EVALUATIONS, |player| {
                self.evaluate_player(player)
            })
            .await;

        let present: HashSet<&str> = roster.iter().map(|p| p.id.as_str()).collect();
        self.outside.retain(|id, _| present.contains(id.as_str()));
        self.entered.retain(|id, _| present.contains(id.as_str()));

        metrics::set_players_outside(&self.server.host, self.outside.len());
    }

    /// Advances one player's tracking state.
    ///
    /// A player only becomes eligible for enforcement after having been
    /// inside an applicable fence at least once; players who spawn outside
    /// every fence and never reach one are left alone.
    async fn evaluate_player(&self, player: &PlayerSnapshot) {
        if self.server.is_whitelisted(&player.id) {
            self.outside.remove(&player.id);
            self.entered.remove(&player.id);
            return;
        }

        let Some(position) = player.position.as_ref() else {
            debug!(host = %self.server.host, player = %player.name, "player not spawned");
            return;
        };

        let Some(side) = player.team.side() else {
            return;
        };
        let fences = self.fences_for(side);
        if fences.is_empty() {
            return;
        }

        let session = {
            let guard = self.session.read().expect("session lock poisoned");
            guard.as_ref().map(Arc::clone)
        };
        let Some(session) = session else {
            return;
        };

        let grid = Grid::project(position, &session);
        if fences.iter().any(|f| f.includes(grid)) {
            self.entered.insert(player.id.clone(), ());
            self.outside.remove(&player.id);
            return;
        }

        if !self.entered.contains_key(&player.id) {
            return;
        }

        let newly_outside = match self.outside.entry(player.id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_grid = grid;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(OutsidePlayer {
                    name: player.name.clone(),
                    last_grid: grid,
                    first_outside: Instant::now(),
                    punish_pending: false,
                });
                true
            }
        };
        if newly_outside {
            info!(host = %self.server.host, player = %player.name, grid = %grid, "player outside fence");
            metrics::record_warning();

            let message = self.server.render_warning(&player.name, grid);
            if let Err(e) = self.pool.message_player(&player.name, &message).await {
                metrics::record_rcon_error("message");
                error!(
                    host = %self.server.host,
                    player = %player.name,
                    error = %e,
                    "failed to deliver warning"
                );
            }
        }
    }

    fn fences_for(&self, side: TeamSide) -> Arc<[Fence]> {
        let fences = self.applicable.read().expect("fences lock poisoned");
        match side {
            TeamSide::Allies => Arc::clone(&fences.allies),
            TeamSide::Axis => Arc::clone(&fences.axis),
        }
    }

    // ========================================================================
    // Punishment
    // ========================================================================

    async fn punish_outside(self: Arc<Self>) {
        let mut ticker = interval(PUNISH_SCAN_INTERVAL);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(host = %self.server.host, "punish loop cancelled");
                    return;
                }
                _ = ticker.tick() => Arc::clone(&self).scan_for_punishment(),
            }
        }
    }

    /// Dispatches punishments for entries inside the eligibility window.
    ///
    /// Each outside episode is dispatched at most once: the entry is marked
    /// in-flight before the task spawns and only punish failure clears the
    /// mark. Entries older than the window are left for containment
    /// re-entry or roster reconciliation to clean up.
    fn scan_for_punishment(self: Arc<Self>) {
        for mut entry in self.outside.iter_mut() {
            if entry.punish_pending {
                continue;
            }
            let elapsed = entry.first_outside.elapsed();
            if elapsed >= self.punish_after && elapsed < self.punish_after + PUNISH_WINDOW {
                entry.punish_pending = true;
                let worker = Arc::clone(&self);
                let id = entry.key().clone();
                let target = entry.value().clone();
                tokio::spawn(async move {
                    worker.punish_player(&id, &target).await;
                });
            }
        }
    }

    async fn punish_player(&self, id: &str, target: &OutsidePlayer) {
        let message = self.server.render_punish(&target.name, target.last_grid);
        match self.pool.punish_player(id, &message).await {
            Ok(()) => {
                info!(
                    host = %self.server.host,
                    player = %target.name,
                    grid = %target.last_grid,
                    "player punished"
                );
                metrics::record_punishment();

                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep(PUNISH_SETTLE_DELAY) => {}
                }
                self.outside.remove(id);
            }
            Err(e) => {
                metrics::record_rcon_error("punish");
                error!(
                    host = %self.server.host,
                    player = %target.name,
                    error = %e,
                    "punish failed"
                );
                if let Some(mut entry) = self.outside.get_mut(id) {
                    entry.punish_pending = false;
                }
            }
        }
    }

    // ========================================================================
    // Inactivity
    // ========================================================================

    async fn check_idle(self: Arc<Self>) {
        let mut ticker = interval(IDLE_CHECK_INTERVAL);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(host = %self.server.host, "idle loop cancelled");
                    return;
                }
                _ = ticker.tick() => self.check_idle_once().await,
            }
        }
    }

    /// Requests a restart when the server has sat on one map, empty, for
    /// longer than the idle threshold. The timestamp is reset afterwards so
    /// the signal does not repeat before the process actually restarts.
    async fn check_idle_once(&self) {
        let idle_for = self
            .last_map_change
            .lock()
            .expect("map-change lock poisoned")
            .elapsed();
        if idle_for < self.idle_restart {
            return;
        }
        match self.pool.players().await {
            Ok(players) if players.is_empty() => {
                info!(
                    host = %self.server.host,
                    idle_secs = idle_for.as_secs(),
                    "no players and no map change past idle threshold"
                );
                self.request_restart("idle");
                *self.last_map_change.lock().expect("map-change lock poisoned") = Instant::now();
            }
            Ok(_) => {}
            Err(e) => {
                metrics::record_rcon_error("players");
                error!(host = %self.server.host, error = %e, "idle check failed");
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("host", &self.server.host)
            .field("outside", &self.outside.len())
            .field("entered", &self.entered.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::rcon::types::{PlayerTeam, WorldPosition};
    use crate::rcon::{RconClient, RconConnect};

    // ========================================================================
    // Scripted RCON mock
    // ========================================================================

    #[derive(Default)]
    struct MockState {
        map: String,
        players: Vec<PlayerSnapshot>,
        fail_session: bool,
        fail_punish: bool,
        messages: Vec<(String, String)>,
        punishes: Vec<(String, String)>,
        punish_attempts: u32,
        players_calls: u32,
    }

    type SharedState = Arc<Mutex<MockState>>;

    fn scripted(map: &str) -> SharedState {
        Arc::new(Mutex::new(MockState {
            map: map.to_string(),
            ..MockState::default()
        }))
    }

    struct MockConnect {
        state: SharedState,
    }

    struct MockClient {
        state: SharedState,
    }

    #[async_trait]
    impl RconConnect for MockConnect {
        async fn connect(&self) -> Result<Box<dyn RconClient>, RconError> {
            Ok(Box::new(MockClient {
                state: Arc::clone(&self.state),
            }))
        }
    }

    #[async_trait]
    impl RconClient for MockClient {
        async fn session_info(&mut self) -> Result<SessionInfo, RconError> {
            let state = self.state.lock().unwrap();
            if state.fail_session {
                return Err(RconError::ConnectionClosed("scripted failure".to_string()));
            }
            Ok(SessionInfo {
                map_name: state.map.clone(),
                player_count: u32::try_from(state.players.len()).unwrap_or(u32::MAX),
                world_extent: 2000.0,
            })
        }

        async fn players(&mut self) -> Result<Vec<PlayerSnapshot>, RconError> {
            let mut state = self.state.lock().unwrap();
            state.players_calls += 1;
            Ok(state.players.clone())
        }

        async fn message_player(&mut self, name: &str, message: &str) -> Result<(), RconError> {
            let mut state = self.state.lock().unwrap();
            state.messages.push((name.to_string(), message.to_string()));
            Ok(())
        }

        async fn punish_player(&mut self, id: &str, reason: &str) -> Result<(), RconError> {
            let mut state = self.state.lock().unwrap();
            state.punish_attempts += 1;
            if state.fail_punish {
                return Err(RconError::Command {
                    code: 500,
                    message: "scripted failure".to_string(),
                });
            }
            state.punishes.push((id.to_string(), reason.to_string()));
            Ok(())
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn fence(region: &str, maps: &[&str]) -> Fence {
        Fence {
            region: region.parse().unwrap(),
            maps: maps.iter().map(ToString::to_string).collect(),
        }
    }

    fn entry_with(allied_fences: Vec<Fence>) -> ServerEntry {
        ServerEntry {
            host: "203.0.113.10".to_string(),
            port: 7779,
            password: "pw".to_string(),
            punish_after_seconds: None,
            idle_restart_seconds: None,
            warning_message: None,
            punish_message: None,
            whitelist: vec![],
            axis_fences: vec![],
            allied_fences,
        }
    }

    /// One allied fence covering A1-A4 on map "m1".
    fn default_entry() -> ServerEntry {
        entry_with(vec![fence("A1-A4", &["m1"])])
    }

    fn make_worker(entry: ServerEntry, state: &SharedState) -> Arc<Worker> {
        let pool = Arc::new(ConnectionPool::new(Box::new(MockConnect {
            state: Arc::clone(state),
        })));
        Arc::new(Worker::new(entry, pool, CancellationToken::new()))
    }

    fn allied(id: &str, name: &str, position: Option<WorldPosition>) -> PlayerSnapshot {
        PlayerSnapshot {
            id: id.to_string(),
            name: name.to_string(),
            team: PlayerTeam::Us,
            position,
        }
    }

    // Grid cells on a 2000m world: A2 is inside the A1-A4 fence, B1 and C1
    // are outside it.
    fn inside_pos() -> Option<WorldPosition> {
        Some(WorldPosition { x: -900.0, y: -700.0, z: 0.0 })
    }

    fn outside_pos() -> Option<WorldPosition> {
        Some(WorldPosition { x: -700.0, y: -900.0, z: 0.0 })
    }

    fn far_outside_pos() -> Option<WorldPosition> {
        Some(WorldPosition { x: -500.0, y: -900.0, z: 0.0 })
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn message_count(state: &SharedState) -> usize {
        state.lock().unwrap().messages.len()
    }

    fn punish_attempts(state: &SharedState) -> u32 {
        state.lock().unwrap().punish_attempts
    }

    // ========================================================================
    // Entry gating and warnings
    // ========================================================================

    #[tokio::test]
    async fn player_never_inside_is_not_tracked() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;

        assert!(worker.outside.is_empty());
        assert!(worker.entered.is_empty());
        assert_eq!(message_count(&state), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_sent_once_per_episode() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        worker
            .evaluate_roster(&[allied("1", "alice", inside_pos())])
            .await;
        assert!(worker.entered.contains_key("1"));
        assert_eq!(message_count(&state), 0);

        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;
        assert_eq!(worker.outside.len(), 1);
        assert_eq!(message_count(&state), 1);

        // Same position again: no second warning, no second entry.
        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;
        assert_eq!(worker.outside.len(), 1);
        assert_eq!(message_count(&state), 1);

        // Moved, still outside: only the stored grid changes.
        worker
            .evaluate_roster(&[allied("1", "alice", far_outside_pos())])
            .await;
        assert_eq!(message_count(&state), 1);
        let tracked = worker.outside.get("1").unwrap();
        assert_eq!(tracked.last_grid.to_string(), "C1");
    }

    #[tokio::test]
    async fn returning_inside_clears_outside_state() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        worker
            .evaluate_roster(&[allied("1", "alice", inside_pos())])
            .await;
        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;
        assert_eq!(worker.outside.len(), 1);

        worker
            .evaluate_roster(&[allied("1", "alice", inside_pos())])
            .await;
        assert!(worker.outside.is_empty());
        assert!(worker.entered.contains_key("1"));
    }

    #[tokio::test]
    async fn whitelisted_player_is_purged() {
        let state = scripted("m1");
        let mut entry = default_entry();
        entry.whitelist = vec!["1".to_string()];
        let worker = make_worker(entry, &state);
        worker.refresh_session().await.unwrap();

        worker.entered.insert("1".to_string(), ());
        worker.outside.insert(
            "1".to_string(),
            OutsidePlayer {
                name: "alice".to_string(),
                last_grid: Grid { column: 1, row: 0 },
                first_outside: Instant::now(),
                punish_pending: false,
            },
        );

        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;

        assert!(worker.outside.is_empty());
        assert!(worker.entered.is_empty());
        assert_eq!(message_count(&state), 0);
    }

    #[tokio::test]
    async fn unspawned_player_is_skipped_without_mutation() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        worker
            .evaluate_roster(&[allied("1", "alice", inside_pos())])
            .await;
        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;
        let first_outside = worker.outside.get("1").unwrap().first_outside;

        worker.evaluate_roster(&[allied("1", "alice", None)]).await;

        assert!(worker.entered.contains_key("1"));
        let tracked = worker.outside.get("1").unwrap();
        assert_eq!(tracked.first_outside, first_outside);
        assert_eq!(message_count(&state), 1);
    }

    #[tokio::test]
    async fn departed_players_are_reconciled() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        worker
            .evaluate_roster(&[
                allied("1", "alice", inside_pos()),
                allied("2", "bob", inside_pos()),
            ])
            .await;
        worker
            .evaluate_roster(&[
                allied("1", "alice", outside_pos()),
                allied("2", "bob", outside_pos()),
            ])
            .await;
        assert_eq!(worker.outside.len(), 2);

        // Bob leaves the server.
        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;
        assert!(worker.outside.contains_key("1"));
        assert!(!worker.outside.contains_key("2"));
        assert!(!worker.entered.contains_key("2"));
    }

    #[tokio::test]
    async fn team_without_applicable_fences_is_ignored() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        let mut axis_player = allied("9", "gerd", outside_pos());
        axis_player.team = PlayerTeam::Ger;
        worker.evaluate_roster(&[axis_player]).await;

        assert!(worker.outside.is_empty());
        assert!(worker.entered.is_empty());
    }

    // ========================================================================
    // Punishment window
    // ========================================================================

    async fn outside_since_start(state: &SharedState) -> Arc<Worker> {
        let worker = make_worker(default_entry(), state);
        worker.refresh_session().await.unwrap();
        worker
            .evaluate_roster(&[allied("1", "alice", inside_pos())])
            .await;
        worker
            .evaluate_roster(&[allied("1", "alice", outside_pos())])
            .await;
        assert_eq!(worker.outside.len(), 1);
        worker
    }

    #[tokio::test(start_paused = true)]
    async fn no_punish_before_grace_period() {
        let state = scripted("m1");
        let worker = outside_since_start(&state).await;

        tokio::time::advance(Duration::from_secs(9)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;

        assert_eq!(punish_attempts(&state), 0);
        assert_eq!(worker.outside.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn punished_inside_window_and_removed_after_settle_delay() {
        let state = scripted("m1");
        let worker = outside_since_start(&state).await;

        tokio::time::advance(Duration::from_secs(12)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state), 1);
        assert_eq!(state.lock().unwrap().punishes[0].0, "1");

        // Entry survives until the settle delay elapses.
        assert_eq!(worker.outside.len(), 1);
        tokio::time::advance(PUNISH_SETTLE_DELAY).await;
        settle().await;
        assert!(worker.outside.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn punish_window_boundaries() {
        let state = scripted("m1");
        let worker = outside_since_start(&state).await;

        // Exactly at the grace period: eligible.
        tokio::time::advance(Duration::from_secs(10)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state), 1);

        let state2 = scripted("m1");
        let worker2 = outside_since_start(&state2).await;

        // Exactly at the end of the window: no longer eligible.
        tokio::time::advance(Duration::from_secs(15)).await;
        Arc::clone(&worker2).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state2), 0);
        assert_eq!(worker2.outside.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn punish_dispatched_exactly_once_per_episode() {
        let state = scripted("m1");
        let worker = outside_since_start(&state).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        Arc::clone(&worker).scan_for_punishment();
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;

        assert_eq!(punish_attempts(&state), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_punish_retries_within_window() {
        let state = scripted("m1");
        let worker = outside_since_start(&state).await;
        state.lock().unwrap().fail_punish = true;

        tokio::time::advance(Duration::from_secs(11)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state), 1);
        assert_eq!(worker.outside.len(), 1);

        state.lock().unwrap().fail_punish = false;
        tokio::time::advance(Duration::from_secs(1)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state), 2);

        tokio::time::advance(PUNISH_SETTLE_DELAY).await;
        settle().await;
        assert!(worker.outside.is_empty());
    }

    // ========================================================================
    // Map change and session polling
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn map_change_requests_restart_and_recomputes_fences() {
        let state = scripted("m1");
        let entry = entry_with(vec![
            fence("A1-A4", &["m1"]),
            fence("G1-J10", &["m2"]),
        ]);
        let worker = make_worker(entry, &state);

        // First fetch: fences computed, no restart.
        worker.refresh_session().await.unwrap();
        assert!(!worker.restart_signal().is_pending());
        let allies = worker.fences_for(TeamSide::Allies);
        assert_eq!(allies.len(), 1);
        assert_eq!(allies[0].region.to_string(), "A1-A4");

        worker
            .evaluate_roster(&[allied("1", "alice", inside_pos())])
            .await;
        assert!(worker.entered.contains_key("1"));

        state.lock().unwrap().map = "m2".to_string();
        worker.refresh_session().await.unwrap();

        assert!(worker.restart_signal().is_pending());
        assert!(worker.entered.is_empty());
        assert!(worker.outside.is_empty());
        let allies = worker.fences_for(TeamSide::Allies);
        assert_eq!(allies.len(), 1);
        assert_eq!(allies[0].region.to_string(), "G1-J10");
    }

    #[tokio::test]
    async fn failed_session_poll_keeps_previous_session() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        state.lock().unwrap().fail_session = true;
        assert!(worker.refresh_session().await.is_err());

        let session = worker.session.read().unwrap().as_ref().map(Arc::clone);
        assert_eq!(session.unwrap().map_name, "m1");
        assert!(!worker.restart_signal().is_pending());
    }

    // ========================================================================
    // Inactivity
    // ========================================================================

    fn idle_entry() -> ServerEntry {
        let mut entry = default_entry();
        entry.idle_restart_seconds = Some(120);
        entry
    }

    #[tokio::test(start_paused = true)]
    async fn idle_empty_server_requests_restart_once() {
        let state = scripted("m1");
        let worker = make_worker(idle_entry(), &state);
        worker.refresh_session().await.unwrap();

        // Under the threshold: the roster is not even fetched.
        worker.check_idle_once().await;
        assert_eq!(state.lock().unwrap().players_calls, 0);
        assert!(!worker.restart_signal().is_pending());

        tokio::time::advance(Duration::from_secs(121)).await;
        worker.check_idle_once().await;
        assert_eq!(state.lock().unwrap().players_calls, 1);
        assert!(worker.restart_signal().is_pending());

        // The timestamp was reset, so the next tick is quiet again.
        worker.check_idle_once().await;
        assert_eq!(state.lock().unwrap().players_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_with_players_present_does_not_restart() {
        let state = scripted("m1");
        state.lock().unwrap().players = vec![allied("1", "alice", inside_pos())];
        let worker = make_worker(idle_entry(), &state);
        worker.refresh_session().await.unwrap();

        tokio::time::advance(Duration::from_secs(121)).await;
        worker.check_idle_once().await;
        assert_eq!(state.lock().unwrap().players_calls, 1);
        assert!(!worker.restart_signal().is_pending());

        // Not reset: the next tick checks again.
        worker.check_idle_once().await;
        assert_eq!(state.lock().unwrap().players_calls, 2);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[tokio::test]
    async fn run_fails_when_initial_session_fetch_fails() {
        let state = scripted("m1");
        state.lock().unwrap().fail_session = true;
        let worker = make_worker(default_entry(), &state);

        assert!(Arc::clone(&worker).run().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_promptly_on_cancellation() {
        let state = scripted("m1");
        let cancel = CancellationToken::new();
        let pool = Arc::new(ConnectionPool::new(Box::new(MockConnect {
            state: Arc::clone(&state),
        })));
        let worker = Arc::new(Worker::new(default_entry(), pool, cancel.clone()));

        let handle = tokio::spawn(Arc::clone(&worker).run());
        settle().await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("worker should stop promptly after cancellation")
            .unwrap();
        assert!(result.is_ok());
    }

    // ========================================================================
    // End-to-end scenario
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn enforcement_scenario() {
        let state = scripted("m1");
        let worker = make_worker(default_entry(), &state);
        worker.refresh_session().await.unwrap();

        // Spawns inside A2: no warning.
        worker
            .evaluate_roster(&[allied("p", "punished-soon", inside_pos())])
            .await;
        assert_eq!(message_count(&state), 0);

        // Moves to B1 at t=0: warning sent, episode starts.
        worker
            .evaluate_roster(&[allied("p", "punished-soon", outside_pos())])
            .await;
        assert_eq!(message_count(&state), 1);
        assert!(state.lock().unwrap().messages[0].1.contains("B1"));

        // Punishment tick at t=12: punished, entry removed after settle.
        tokio::time::advance(Duration::from_secs(12)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state), 1);
        tokio::time::advance(PUNISH_SETTLE_DELAY).await;
        settle().await;
        assert!(worker.outside.is_empty());

        // Punishment tick at t=20: nothing left to act on.
        tokio::time::advance(Duration::from_secs(3)).await;
        Arc::clone(&worker).scan_for_punishment();
        settle().await;
        assert_eq!(punish_attempts(&state), 1);
        assert_eq!(message_count(&state), 1);
    }
}
