//! Session actor: one Tokio task per draft.
//!
//! The actor owns the roster, the connected participants, and (once the
//! draft starts) the [`DraftMachine`]. Commands from every connection
//! arrive through one bounded mailbox and are handled one at a time; the
//! resulting broadcasts are queued to every participant before the next
//! mailbox item is taken. Between commands the actor sleeps until the
//! machine's next deadline (timer tick, phase expiry, resume countdown,
//! edit expiry) or its own idle deadline.
//!
//! Outbound delivery never blocks the actor: each participant has a
//! bounded queue written with `try_send`, and a participant whose queue
//! is full or closed is dropped from the session.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use pickban_protocol::{
    DraftSnapshot, DraftStatus, PerSide, ServerMessage, SessionId, Side,
    UserId,
};
use pickban_timer::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::command::DraftCommand;
use crate::config::{SessionConfig, SessionMode};
use crate::machine::{DraftMachine, Effect};
use crate::persistence::{PersistQueue, Persistence};
use crate::roster::{Roster, Seat};
use crate::DraftError;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one live connection. Allocated by the server per socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// A process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Per-connection outbound queue the session writes into.
pub type OutboundSender = mpsc::Sender<ServerMessage>;

/// What a successful join resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAck {
    /// `None` for spectators.
    pub side: Option<Side>,
    pub is_captain: bool,
}

/// Operator view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub status: DraftStatus,
    pub current_phase: usize,
    pub connections: usize,
}

pub(crate) enum SessionCommand {
    Join {
        connection: ConnectionId,
        user: UserId,
        requested: Option<Side>,
        outbound: OutboundSender,
        reply: oneshot::Sender<Result<JoinAck, DraftError>>,
    },
    Leave {
        connection: ConnectionId,
        reply: oneshot::Sender<Result<(), DraftError>>,
    },
    Command {
        connection: ConnectionId,
        command: DraftCommand,
        reply: oneshot::Sender<Result<(), DraftError>>,
    },
    Info {
        reply: oneshot::Sender<SessionInfo>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Cloneable handle to a running session actor.
///
/// Connections hold one of these, never the session itself. Every method
/// fails with [`DraftError::Unavailable`] once the actor has stopped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// `true` once the actor has stopped (retired or shut down).
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Attach a connection. The session first queues `session_joined` on
    /// `outbound`, then tells everyone else with `player_joined`.
    pub async fn join(
        &self,
        connection: ConnectionId,
        user: UserId,
        requested: Option<Side>,
        outbound: OutboundSender,
    ) -> Result<JoinAck, DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Join {
            connection,
            user,
            requested,
            outbound,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn leave(&self, connection: ConnectionId) -> Result<(), DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Leave { connection, reply }).await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    /// Run a draft command on behalf of `connection`.
    ///
    /// A refusal comes back here and is not broadcast.
    pub async fn command(
        &self,
        connection: ConnectionId,
        command: DraftCommand,
    ) -> Result<(), DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Command {
            connection,
            command,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn info(&self) -> Result<SessionInfo, DraftError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Info { reply }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    /// Disconnect everyone and stop the actor.
    pub async fn shutdown(&self) -> Result<(), DraftError> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), DraftError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> DraftError {
        DraftError::Unavailable(self.session_id.clone())
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Participant {
    user: UserId,
    seat: Seat,
    outbound: OutboundSender,
}

struct SessionActor {
    session_id: SessionId,
    config: SessionConfig,
    roster: Roster,
    participants: HashMap<ConnectionId, Participant>,
    /// Lobby ready flags, before `start_draft`.
    ready: PerSide<bool>,
    machine: Option<DraftMachine>,
    persist: PersistQueue,
    /// Set while nobody is connected.
    idle_since: Option<Instant>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "session actor started");

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                _ = pickban_timer::sleep_until(deadline) => {
                    self.on_deadline(Instant::now());
                }
            }

            if let Some(reason) = self.retire_reason(Instant::now()) {
                tracing::info!(
                    session_id = %self.session_id,
                    reason,
                    "session retired"
                );
                break;
            }
        }

        tracing::info!(session_id = %self.session_id, "session actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: SessionCommand) -> bool {
        let now = Instant::now();
        match cmd {
            SessionCommand::Join {
                connection,
                user,
                requested,
                outbound,
                reply,
            } => {
                self.settle(now);
                let result =
                    self.handle_join(connection, user, requested, outbound, now);
                let _ = reply.send(result);
            }
            SessionCommand::Leave { connection, reply } => {
                let result = self.handle_leave(connection, now);
                let _ = reply.send(result);
            }
            SessionCommand::Command {
                connection,
                command,
                reply,
            } => {
                self.settle(now);
                let name = command.name();
                let result = self.handle_command(connection, command, now);
                if let Err(e) = &result {
                    tracing::debug!(
                        session_id = %self.session_id,
                        %connection,
                        command = name,
                        error = %e,
                        "command rejected"
                    );
                }
                let _ = reply.send(result);
            }
            SessionCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Shutdown => {
                tracing::info!(session_id = %self.session_id, "session shutting down");
                self.broadcast(ServerMessage::Disconnect {
                    reason: "session closed".into(),
                });
                self.participants.clear();
                return false;
            }
        }
        true
    }

    /// Apply anything already due so a command sees current state.
    fn settle(&mut self, now: Instant) {
        if let Some(machine) = self.machine.as_mut() {
            let effects = machine.advance_time(now);
            self.apply(effects);
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        self.settle(now);
    }

    fn next_deadline(&self) -> Option<Instant> {
        let machine = self.machine.as_ref().and_then(|m| m.next_deadline());
        let idle = self
            .idle_since
            .map(|since| since + self.config.idle_timeout());
        match (machine, idle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn retire_reason(&self, now: Instant) -> Option<&'static str> {
        if !self.participants.is_empty() {
            return None;
        }
        if self.machine.as_ref().is_some_and(|m| m.is_complete()) {
            return Some("complete");
        }
        match self.idle_since {
            Some(since) if now >= since + self.config.idle_timeout() => {
                Some("idle")
            }
            _ => None,
        }
    }

    // -- membership ---------------------------------------------------------

    fn handle_join(
        &mut self,
        connection: ConnectionId,
        user: UserId,
        requested: Option<Side>,
        outbound: OutboundSender,
        now: Instant,
    ) -> Result<JoinAck, DraftError> {
        // A connection re-joining replaces its old registration.
        self.participants.remove(&connection);

        let seat = self.roster.assign(user, requested);
        let ack = JoinAck {
            side: seat.side(),
            is_captain: seat.is_captain(),
        };

        let joined = ServerMessage::SessionJoined {
            session_id: self.session_id.clone(),
            side: ack.side,
            is_captain: ack.is_captain,
            snapshot: self.snapshot(now),
        };
        if outbound.try_send(joined).is_err() {
            return Err(DraftError::Unavailable(self.session_id.clone()));
        }

        self.broadcast(ServerMessage::PlayerJoined {
            user_id: user,
            side: ack.side,
            is_captain: ack.is_captain,
        });
        self.participants.insert(
            connection,
            Participant {
                user,
                seat,
                outbound,
            },
        );
        self.idle_since = None;

        tracing::info!(
            session_id = %self.session_id,
            %connection,
            %user,
            side = ?ack.side,
            connections = self.participants.len(),
            "player joined"
        );
        Ok(ack)
    }

    fn handle_leave(
        &mut self,
        connection: ConnectionId,
        now: Instant,
    ) -> Result<(), DraftError> {
        let participant = self
            .participants
            .remove(&connection)
            .ok_or(DraftError::NotInSession)?;

        tracing::info!(
            session_id = %self.session_id,
            %connection,
            user = %participant.user,
            connections = self.participants.len(),
            "player left"
        );
        self.broadcast(ServerMessage::PlayerLeft {
            user_id: participant.user,
            side: participant.seat.side(),
        });
        self.mark_idle(now);
        Ok(())
    }

    fn mark_idle(&mut self, now: Instant) {
        if self.participants.is_empty() && self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    // -- commands -----------------------------------------------------------

    fn handle_command(
        &mut self,
        connection: ConnectionId,
        command: DraftCommand,
        now: Instant,
    ) -> Result<(), DraftError> {
        let participant = self
            .participants
            .get(&connection)
            .ok_or(DraftError::NotInSession)?;
        let user = participant.user;
        let side = participant.seat.authority()?;

        let effects = if let Some(machine) = self.machine.as_mut() {
            dispatch(machine, command, side, user, now)?
        } else {
            match command {
                DraftCommand::SetReady(ready) => self.set_ready(side, ready),
                DraftCommand::Start => self.start_draft(now)?,
                _ => return Err(DraftError::NotStarted),
            }
        };
        self.apply(effects);
        Ok(())
    }

    fn set_ready(&mut self, side: Side, ready: bool) -> Vec<Effect> {
        *self.ready.get_mut(side) = ready;
        vec![Effect::Broadcast(ServerMessage::ReadyChanged {
            blue: self.ready.blue,
            red: self.ready.red,
        })]
    }

    fn start_draft(&mut self, now: Instant) -> Result<Vec<Effect>, DraftError> {
        let captain_present = |side: Side| {
            self.participants.values().any(|p| {
                p.seat
                    == Seat::Player {
                        side,
                        is_captain: true,
                    }
            })
        };
        if !Side::ALL.into_iter().all(captain_present) || !self.ready.both() {
            return Err(DraftError::SidesNotReady);
        }

        let (machine, effects) = DraftMachine::start(
            self.session_id.clone(),
            self.config.phases.clone(),
            self.config.draft.clone(),
            now,
        );
        self.machine = Some(machine);
        tracing::info!(
            session_id = %self.session_id,
            phases = self.config.phases.len(),
            "draft started"
        );
        Ok(effects)
    }

    /// Carry out machine effects in order.
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast(msg) => {
                    if matches!(msg, ServerMessage::DraftCompleted { .. }) {
                        tracing::info!(
                            session_id = %self.session_id,
                            "draft completed"
                        );
                    }
                    self.broadcast(msg);
                }
                Effect::Persist(request) => self.persist.submit(request),
            }
        }
    }

    // -- fan-out ------------------------------------------------------------

    /// Queue `msg` for every participant. Anyone whose queue is full or
    /// closed is dropped, and the rest are told with `player_left`.
    fn broadcast(&mut self, msg: ServerMessage) {
        let mut pending = VecDeque::from([msg]);
        while let Some(msg) = pending.pop_front() {
            let mut dropped = Vec::new();
            for (connection, participant) in &self.participants {
                match participant.outbound.try_send(msg.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            session_id = %self.session_id,
                            %connection,
                            user = %participant.user,
                            "outbound queue full, dropping slow connection"
                        );
                        dropped.push(*connection);
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(
                            session_id = %self.session_id,
                            %connection,
                            "outbound queue closed"
                        );
                        dropped.push(*connection);
                    }
                }
            }
            for connection in dropped {
                if let Some(p) = self.participants.remove(&connection) {
                    pending.push_back(ServerMessage::PlayerLeft {
                        user_id: p.user,
                        side: p.seat.side(),
                    });
                }
            }
        }
        self.mark_idle(Instant::now());
    }

    // -- views --------------------------------------------------------------

    fn snapshot(&self, now: Instant) -> DraftSnapshot {
        if let Some(machine) = &self.machine {
            return machine.snapshot(self.ready.clone(), now);
        }
        let draft = &self.config.draft;
        DraftSnapshot {
            session_id: self.session_id.clone(),
            status: DraftStatus::Waiting,
            phases: self.config.phases.clone(),
            current_phase: 0,
            timer_duration_ms: draft.timer_duration_ms,
            timer_remaining_ms: draft.timer_duration_ms,
            picks: PerSide::default(),
            bans: PerSide::default(),
            hovered: PerSide::default(),
            ready: self.ready.clone(),
            pause: None,
            resume_ready: None,
            pending_edit: None,
        }
    }

    fn info(&self) -> SessionInfo {
        let (status, current_phase) = match &self.machine {
            Some(m) => (m.status(), m.current_index()),
            None => (DraftStatus::Waiting, 0),
        };
        SessionInfo {
            session_id: self.session_id.clone(),
            status,
            current_phase,
            connections: self.participants.len(),
        }
    }
}

fn dispatch(
    machine: &mut DraftMachine,
    command: DraftCommand,
    side: Side,
    user: UserId,
    now: Instant,
) -> Result<Vec<Effect>, DraftError> {
    match command {
        DraftCommand::Select(champion_id) => machine.select(side, champion_id),
        DraftCommand::Hover(champion_id) => machine.hover(side, champion_id),
        DraftCommand::LockIn(champion_id) => {
            machine.lock_in(side, champion_id, now)
        }
        DraftCommand::Pause => machine.pause(side, user, now),
        DraftCommand::ResumeReady(ready) => {
            machine.resume_ready(side, ready, now)
        }
        DraftCommand::ProposeEdit {
            slot_type,
            side: target_side,
            slot_index,
            champion_id,
        } => machine.propose_edit(
            side,
            user,
            slot_type,
            target_side,
            slot_index,
            champion_id,
            now,
        ),
        DraftCommand::RespondEdit(accept) => machine.respond_edit(side, accept),
        DraftCommand::SetReady(_) | DraftCommand::Start => {
            Err(DraftError::AlreadyStarted)
        }
    }
}

/// Spawns a session actor and returns its handle.
pub(crate) fn spawn_session(
    session_id: SessionId,
    config: SessionConfig,
    persistence: &Persistence,
) -> Result<SessionHandle, DraftError> {
    config.validate()?;
    let roster = match &config.mode {
        SessionMode::OneVsOne => Roster::one_vs_one(),
        SessionMode::Team(team) => Roster::team(team.clone())?,
    };
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);

    let actor = SessionActor {
        session_id: session_id.clone(),
        roster,
        participants: HashMap::new(),
        ready: PerSide::default(),
        machine: None,
        persist: persistence.start(session_id.clone()),
        idle_since: Some(Instant::now()),
        receiver: rx,
        config,
    };
    tokio::spawn(actor.run());

    Ok(SessionHandle {
        session_id,
        sender: tx,
    })
}
