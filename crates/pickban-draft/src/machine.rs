//! The per-session draft state machine.
//!
//! [`DraftMachine`] is plain data plus a [`PhaseTimer`]. Every operation
//! takes the current [`Instant`], validates, mutates, and returns the
//! [`Effect`]s the owning session must carry out, in order. It never
//! touches a channel or reads the clock itself, so the whole draft can be
//! driven step by step in tests.
//!
//! ```text
//!            pause_draft                 both resume_ready
//!   Active ───────────────▶ Paused ───────────────────────▶ (countdown)
//!     ▲                                                         │
//!     └──────────────── draft_resumed (full duration) ◀─────────┘
//!     │
//!     └── last phase resolved ──▶ Complete
//! ```
//!
//! Authorization (who speaks for which side) is the session's job; the
//! machine receives the already-resolved [`Side`] of the sender.

use std::time::Duration;

use pickban_protocol::{
    ActionKind, ChampionId, DraftSnapshot, DraftStatus, EditProposal,
    PauseInfo, PerSide, Phase, ServerMessage, SessionId, Side, UserId,
    now_millis,
};
use pickban_timer::{Instant, PhaseTimer, TimerSignal};
use rand::Rng;

use crate::config::DraftConfig;
use crate::persistence::{DraftResult, PersistRequest, RecordedAction};
use crate::{DraftError, phase};

/// Spacing of `resume_countdown` steps.
const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// Something the session must do on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send to every participant, spectators included.
    Broadcast(ServerMessage),
    /// Hand to the persistence worker.
    Persist(PersistRequest),
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Countdown {
    seconds: u32,
    next_step: Instant,
}

#[derive(Debug, Clone, Default)]
struct ResumeState {
    ready: PerSide<bool>,
    countdown: Option<Countdown>,
}

#[derive(Debug, Clone)]
enum Status {
    Active,
    Paused {
        info: PauseInfo,
        resume: ResumeState,
    },
    Complete,
}

#[derive(Debug, Clone)]
struct PendingEdit {
    proposal: EditProposal,
    deadline: Instant,
}

// ---------------------------------------------------------------------------
// DraftMachine
// ---------------------------------------------------------------------------

/// One running draft.
#[derive(Debug)]
pub struct DraftMachine {
    session_id: SessionId,
    phases: Vec<Phase>,
    config: DraftConfig,
    timer: PhaseTimer,
    current: usize,
    picks: PerSide<Vec<ChampionId>>,
    bans: PerSide<Vec<ChampionId>>,
    hovered: PerSide<Option<ChampionId>>,
    status: Status,
    pending_edit: Option<PendingEdit>,
}

impl DraftMachine {
    /// Start a draft at phase 0 with the timer running.
    ///
    /// Emits `draft_started` followed by `phase_changed`.
    pub fn start(
        session_id: SessionId,
        phases: Vec<Phase>,
        config: DraftConfig,
        now: Instant,
    ) -> (Self, Vec<Effect>) {
        let timer =
            PhaseTimer::new(config.timer_duration(), config.timer_config());
        let mut machine = Self {
            session_id,
            phases,
            config,
            timer,
            current: 0,
            picks: PerSide::default(),
            bans: PerSide::default(),
            hovered: PerSide::default(),
            status: Status::Active,
            pending_edit: None,
        };
        let mut effects = vec![broadcast(ServerMessage::DraftStarted {
            phase_count: machine.phases.len(),
            timer_duration_ms: machine.config.timer_duration_ms,
        })];
        machine.enter_phase(now, &mut effects);
        (machine, effects)
    }

    // -- commands -----------------------------------------------------------

    /// Record `side`'s tentative choice for the current phase.
    pub fn select(
        &mut self,
        side: Side,
        champion_id: ChampionId,
    ) -> Result<Vec<Effect>, DraftError> {
        self.ensure_turn(side)?;
        self.ensure_available(&champion_id)?;
        *self.hovered.get_mut(side) = Some(champion_id.clone());
        Ok(vec![broadcast(ServerMessage::ChampionHovered {
            side,
            champion_id: Some(champion_id),
        })])
    }

    /// Like [`select`](Self::select), but `None` clears the choice.
    pub fn hover(
        &mut self,
        side: Side,
        champion_id: Option<ChampionId>,
    ) -> Result<Vec<Effect>, DraftError> {
        match champion_id {
            Some(id) => self.select(side, id),
            None => {
                self.ensure_turn(side)?;
                *self.hovered.get_mut(side) = None;
                Ok(vec![broadcast(ServerMessage::ChampionHovered {
                    side,
                    champion_id: None,
                })])
            }
        }
    }

    /// Commit a champion to the current phase and advance.
    ///
    /// Uses `champion_id` when given, otherwise the side's selection.
    pub fn lock_in(
        &mut self,
        side: Side,
        champion_id: Option<ChampionId>,
        now: Instant,
    ) -> Result<Vec<Effect>, DraftError> {
        let phase = self.ensure_turn(side)?;
        let champion_id = champion_id
            .or_else(|| self.hovered.get(side).clone())
            .ok_or(DraftError::NoSelection)?;
        self.ensure_available(&champion_id)?;

        let mut effects = Vec::new();
        self.resolve(phase, champion_id, false, now, &mut effects);
        Ok(effects)
    }

    /// Freeze the draft. Either side's captain may pause.
    ///
    /// A pending edit is withdrawn (`edit_rejected{cancelled}`).
    pub fn pause(
        &mut self,
        side: Side,
        user: UserId,
        now: Instant,
    ) -> Result<Vec<Effect>, DraftError> {
        self.ensure_active()?;

        let frozen = self.timer.pause(now);
        let info = PauseInfo {
            paused_by: user,
            side,
            timer_frozen: millis(frozen),
            max_pause_time: self.config.max_pause_ms,
        };
        let mut effects = vec![broadcast(ServerMessage::DraftPaused {
            paused_by: info.paused_by,
            side: info.side,
            timer_frozen: info.timer_frozen,
            max_pause_time: info.max_pause_time,
        })];
        if let Some(edit) = self.pending_edit.take() {
            effects.push(broadcast(edit_rejected(&edit.proposal, false, true)));
        }
        self.status = Status::Paused {
            info,
            resume: ResumeState::default(),
        };
        Ok(effects)
    }

    /// Mark `side` ready (or not) to resume.
    ///
    /// Both sides ready starts the countdown; un-readying cancels it.
    pub fn resume_ready(
        &mut self,
        side: Side,
        ready: bool,
        now: Instant,
    ) -> Result<Vec<Effect>, DraftError> {
        let countdown_secs = self.config.resume_countdown_secs;
        let resume = match &mut self.status {
            Status::Paused { resume, .. } => resume,
            Status::Active => return Err(DraftError::NotPaused),
            Status::Complete => return Err(DraftError::DraftComplete),
        };

        *resume.ready.get_mut(side) = ready;
        let mut effects = vec![broadcast(ServerMessage::ResumeReadyChanged {
            blue: resume.ready.blue,
            red: resume.ready.red,
        })];

        let mut resume_now = false;
        if resume.ready.both() {
            if resume.countdown.is_none() {
                if countdown_secs == 0 {
                    resume_now = true;
                } else {
                    resume.countdown = Some(Countdown {
                        seconds: countdown_secs,
                        next_step: now + COUNTDOWN_STEP,
                    });
                    effects.push(broadcast(ServerMessage::ResumeCountdown {
                        seconds: countdown_secs,
                        cancelled: false,
                    }));
                }
            }
        } else if let Some(countdown) = resume.countdown.take() {
            effects.push(broadcast(ServerMessage::ResumeCountdown {
                seconds: countdown.seconds,
                cancelled: true,
            }));
        }

        if resume_now {
            self.finish_resume(now, &mut effects);
        }
        Ok(effects)
    }

    /// Propose replacing an already-filled slot.
    #[allow(clippy::too_many_arguments)]
    pub fn propose_edit(
        &mut self,
        side: Side,
        user: UserId,
        slot_type: ActionKind,
        target_side: Side,
        slot_index: usize,
        champion_id: ChampionId,
        now: Instant,
    ) -> Result<Vec<Effect>, DraftError> {
        self.ensure_active()?;
        if self.pending_edit.is_some() {
            return Err(DraftError::EditPending);
        }
        let old = self
            .slots(slot_type, target_side)
            .get(slot_index)
            .cloned()
            .ok_or_else(|| {
                DraftError::InvalidSlot(format!(
                    "{target_side} {slot_type} slot {slot_index} is not filled"
                ))
            })?;
        if old == champion_id {
            return Err(DraftError::EditUnchanged);
        }
        self.ensure_available(&champion_id)?;

        let ttl = self.config.edit_ttl();
        let proposal = EditProposal {
            proposed_by: user,
            proposed_side: side,
            slot_type,
            side: target_side,
            slot_index,
            old_champion_id: old,
            new_champion_id: champion_id,
            expires_at: now_millis() + millis(ttl),
        };
        self.pending_edit = Some(PendingEdit {
            proposal: proposal.clone(),
            deadline: now + ttl,
        });
        Ok(vec![broadcast(ServerMessage::EditProposed(proposal))])
    }

    /// The opposing captain accepts or rejects the pending edit.
    pub fn respond_edit(
        &mut self,
        side: Side,
        accept: bool,
    ) -> Result<Vec<Effect>, DraftError> {
        if matches!(self.status, Status::Complete) {
            return Err(DraftError::DraftComplete);
        }
        let Some(edit) = self.pending_edit.take() else {
            return Err(DraftError::NoPendingEdit);
        };
        let proposal = &edit.proposal;
        if proposal.proposed_side == side {
            let other = side.opponent();
            self.pending_edit = Some(edit);
            return Err(DraftError::NotCaptain(other));
        }

        if !accept {
            return Ok(vec![broadcast(edit_rejected(proposal, false, false))]);
        }
        // The champion may have been locked since the proposal.
        if !self.is_available(&proposal.new_champion_id) {
            let taken = proposal.new_champion_id.clone();
            self.pending_edit = Some(edit);
            return Err(DraftError::ChampionUnavailable(taken));
        }

        let slot = self
            .slots_mut(proposal.slot_type, proposal.side)
            .get_mut(proposal.slot_index)
            .ok_or_else(|| {
                DraftError::InvalidSlot(format!(
                    "slot {} vanished",
                    proposal.slot_index
                ))
            })?;
        *slot = proposal.new_champion_id.clone();

        let mut effects = vec![broadcast(ServerMessage::EditApplied {
            slot_type: proposal.slot_type,
            side: proposal.side,
            slot_index: proposal.slot_index,
            old_champion_id: proposal.old_champion_id.clone(),
            new_champion_id: proposal.new_champion_id.clone(),
        })];
        if let Some(phase) = phase::phase_for_slot(
            &self.phases,
            proposal.side,
            proposal.slot_type,
            proposal.slot_index,
        ) {
            effects.push(Effect::Persist(PersistRequest::Action(
                RecordedAction {
                    phase,
                    side: proposal.side,
                    kind: proposal.slot_type,
                    champion_id: proposal.new_champion_id.clone(),
                    auto_selected: false,
                },
            )));
        }
        Ok(effects)
    }

    // -- time ---------------------------------------------------------------

    /// Process everything due at `now`: edit expiry, countdown steps,
    /// timer ticks, and phase expiry with auto-resolution.
    pub fn advance_time(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self
            .pending_edit
            .as_ref()
            .is_some_and(|edit| edit.deadline <= now)
        {
            if let Some(edit) = self.pending_edit.take() {
                effects
                    .push(broadcast(edit_rejected(&edit.proposal, true, false)));
            }
        }

        self.step_countdown(now, &mut effects);

        while let Some(signal) = self.timer.poll(now) {
            match signal {
                TimerSignal::Tick {
                    remaining,
                    is_buffer_period,
                } => effects.push(broadcast(ServerMessage::Tick {
                    remaining: millis(remaining),
                    is_buffer_period,
                })),
                TimerSignal::Expired => self.auto_resolve(now, &mut effects),
            }
        }
        effects
    }

    /// Earliest instant at which [`advance_time`](Self::advance_time) has
    /// work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let countdown = match &self.status {
            Status::Paused { resume, .. } => {
                resume.countdown.as_ref().map(|c| c.next_step)
            }
            _ => None,
        };
        [
            self.timer.next_wakeup(),
            countdown,
            self.pending_edit.as_ref().map(|e| e.deadline),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // -- queries ------------------------------------------------------------

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn status(&self) -> DraftStatus {
        match self.status {
            Status::Active => DraftStatus::Active,
            Status::Paused { .. } => DraftStatus::Paused,
            Status::Complete => DraftStatus::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, Status::Complete)
    }

    /// Index of the phase being played; equals the phase count once
    /// complete.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.phases.get(self.current).copied()
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn picks(&self) -> &PerSide<Vec<ChampionId>> {
        &self.picks
    }

    pub fn bans(&self) -> &PerSide<Vec<ChampionId>> {
        &self.bans
    }

    pub fn hovered(&self, side: Side) -> Option<&ChampionId> {
        self.hovered.get(side).as_ref()
    }

    pub fn pause_info(&self) -> Option<&PauseInfo> {
        match &self.status {
            Status::Paused { info, .. } => Some(info),
            _ => None,
        }
    }

    pub fn pending_edit(&self) -> Option<&EditProposal> {
        self.pending_edit.as_ref().map(|e| &e.proposal)
    }

    /// Time left in the current phase (frozen value while paused).
    pub fn remaining(&self, now: Instant) -> Duration {
        self.timer.remaining(now)
    }

    /// Full view for a joining client. `ready` is the lobby's ready state.
    pub fn snapshot(&self, ready: PerSide<bool>, now: Instant) -> DraftSnapshot {
        let (pause, resume_ready) = match &self.status {
            Status::Paused { info, resume } => {
                (Some(info.clone()), Some(resume.ready.clone()))
            }
            _ => (None, None),
        };
        DraftSnapshot {
            session_id: self.session_id.clone(),
            status: self.status(),
            phases: self.phases.clone(),
            current_phase: self.current,
            timer_duration_ms: self.config.timer_duration_ms,
            timer_remaining_ms: millis(self.timer.remaining(now)),
            picks: self.picks.clone(),
            bans: self.bans.clone(),
            hovered: self.hovered.clone(),
            ready,
            pause,
            resume_ready,
            pending_edit: self.pending_edit().cloned(),
        }
    }

    // -- internals ----------------------------------------------------------

    fn ensure_active(&self) -> Result<(), DraftError> {
        match self.status {
            Status::Active => Ok(()),
            Status::Paused { .. } => Err(DraftError::DraftPaused),
            Status::Complete => Err(DraftError::DraftComplete),
        }
    }

    /// The current phase, if it is `side`'s turn and the draft is active.
    fn ensure_turn(&self, side: Side) -> Result<Phase, DraftError> {
        self.ensure_active()?;
        let phase = self.current_phase().ok_or(DraftError::DraftComplete)?;
        if phase.side != side {
            return Err(DraftError::NotYourTurn {
                phase: phase.index,
                side: phase.side,
            });
        }
        Ok(phase)
    }

    /// Unused anywhere in picks or bans. The placeholder is never
    /// available to choose.
    fn is_available(&self, champion_id: &ChampionId) -> bool {
        if champion_id.is_placeholder() {
            return false;
        }
        !Side::ALL.into_iter().any(|side| {
            self.picks.get(side).contains(champion_id)
                || self.bans.get(side).contains(champion_id)
        })
    }

    fn ensure_available(&self, champion_id: &ChampionId) -> Result<(), DraftError> {
        if self.is_available(champion_id) {
            Ok(())
        } else {
            Err(DraftError::ChampionUnavailable(champion_id.clone()))
        }
    }

    fn slots(&self, kind: ActionKind, side: Side) -> &Vec<ChampionId> {
        match kind {
            ActionKind::Ban => self.bans.get(side),
            ActionKind::Pick => self.picks.get(side),
        }
    }

    fn slots_mut(&mut self, kind: ActionKind, side: Side) -> &mut Vec<ChampionId> {
        match kind {
            ActionKind::Ban => self.bans.get_mut(side),
            ActionKind::Pick => self.picks.get_mut(side),
        }
    }

    /// Write `champion_id` into the slot implied by `phase` and advance.
    fn resolve(
        &mut self,
        phase: Phase,
        champion_id: ChampionId,
        auto_selected: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        self.slots_mut(phase.action_kind, phase.side)
            .push(champion_id.clone());
        *self.hovered.get_mut(phase.side) = None;

        effects.push(broadcast(ServerMessage::ChampionSelected {
            phase: phase.index,
            side: phase.side,
            action_kind: phase.action_kind,
            champion_id: champion_id.clone(),
            auto_selected,
        }));
        effects.push(Effect::Persist(PersistRequest::Action(RecordedAction {
            phase: phase.index,
            side: phase.side,
            kind: phase.action_kind,
            champion_id,
            auto_selected,
        })));

        self.current += 1;
        self.enter_phase(now, effects);
    }

    /// Start the timer for the current phase, or complete the draft.
    fn enter_phase(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let Some(phase) = self.current_phase() else {
            self.complete(effects);
            return;
        };
        // set_duration before start: a pause must never shorten a phase.
        self.timer.set_duration(self.config.timer_duration());
        self.timer.start(now);
        effects.push(broadcast(ServerMessage::PhaseChanged {
            current_phase: phase.index,
            current_side: phase.side,
            action_kind: phase.action_kind,
            timer_remaining_ms: self.config.timer_duration_ms,
        }));
    }

    fn complete(&mut self, effects: &mut Vec<Effect>) {
        self.status = Status::Complete;
        self.timer.reset();
        self.hovered = PerSide::default();
        if let Some(edit) = self.pending_edit.take() {
            effects.push(broadcast(edit_rejected(&edit.proposal, false, true)));
        }
        effects.push(broadcast(ServerMessage::DraftCompleted {
            picks: self.picks.clone(),
            bans: self.bans.clone(),
        }));
        effects.push(Effect::Persist(PersistRequest::Completion(DraftResult {
            picks: self.picks.clone(),
            bans: self.bans.clone(),
        })));
    }

    /// Expiry: lock the side's still-available selection, else a random
    /// pool champion for picks, else the placeholder.
    fn auto_resolve(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let Some(phase) = self.current_phase() else {
            return;
        };
        let choice = self
            .hovered
            .get(phase.side)
            .clone()
            .filter(|c| self.is_available(c))
            .or_else(|| match phase.action_kind {
                ActionKind::Pick => self.random_pool_pick(),
                ActionKind::Ban => None,
            });

        tracing::debug!(
            session_id = %self.session_id,
            phase = phase.index,
            auto_selected = ?choice,
            "phase expired"
        );
        effects.push(broadcast(ServerMessage::Expired {
            phase: phase.index,
            auto_selected: choice.clone(),
        }));
        let champion_id = choice.unwrap_or_else(ChampionId::placeholder);
        self.resolve(phase, champion_id, true, now, effects);
    }

    fn random_pool_pick(&self) -> Option<ChampionId> {
        let candidates: Vec<&ChampionId> = self
            .config
            .auto_pick_pool
            .iter()
            .filter(|c| self.is_available(c))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let i = rand::rng().random_range(0..candidates.len());
        Some(candidates[i].clone())
    }

    fn step_countdown(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let Status::Paused { resume, .. } = &mut self.status else {
            return;
        };
        let Some(countdown) = resume.countdown.as_mut() else {
            return;
        };

        let mut finished = false;
        while !finished && now >= countdown.next_step {
            countdown.seconds = countdown.seconds.saturating_sub(1);
            countdown.next_step += COUNTDOWN_STEP;
            if countdown.seconds == 0 {
                finished = true;
            } else {
                effects.push(broadcast(ServerMessage::ResumeCountdown {
                    seconds: countdown.seconds,
                    cancelled: false,
                }));
            }
        }
        if finished {
            self.finish_resume(now, effects);
        }
    }

    /// Back to Active with a fresh full-length phase timer.
    fn finish_resume(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        self.status = Status::Active;
        self.timer.set_duration(self.config.timer_duration());
        self.timer.start(now);
        effects.push(broadcast(ServerMessage::DraftResumed {
            timer_remaining: self.config.timer_duration_ms,
        }));
    }
}

fn broadcast(msg: ServerMessage) -> Effect {
    Effect::Broadcast(msg)
}

fn edit_rejected(
    proposal: &EditProposal,
    expired: bool,
    cancelled: bool,
) -> ServerMessage {
    ServerMessage::EditRejected {
        proposed_by: proposal.proposed_by,
        slot_type: proposal.slot_type,
        side: proposal.side,
        slot_index: proposal.slot_index,
        expired,
        cancelled,
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::tournament_phases;

    const BLUE_CAPTAIN: UserId = UserId(1);
    const RED_CAPTAIN: UserId = UserId(2);

    fn champ(id: &str) -> ChampionId {
        ChampionId::new(id)
    }

    fn start_with(config: DraftConfig) -> (DraftMachine, Instant) {
        let t0 = Instant::now();
        let (machine, _) = DraftMachine::start(
            SessionId::new("test"),
            tournament_phases(),
            config,
            t0,
        );
        (machine, t0)
    }

    fn start() -> (DraftMachine, Instant) {
        start_with(DraftConfig::default())
    }

    fn messages(effects: &[Effect]) -> Vec<&ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Broadcast(msg) => Some(msg),
                Effect::Persist(_) => None,
            })
            .collect()
    }

    fn kinds(effects: &[Effect]) -> Vec<&'static str> {
        messages(effects).iter().map(|m| m.kind()).collect()
    }

    /// Lock a distinct champion for each of the first `n` phases.
    fn play(machine: &mut DraftMachine, n: usize, now: Instant) {
        for _ in 0..n {
            let phase = machine.current_phase().unwrap();
            machine
                .lock_in(phase.side, Some(champ(&format!("c{}", phase.index))), now)
                .unwrap();
        }
    }

    // -----------------------------------------------------------------------
    // Start and turn order
    // -----------------------------------------------------------------------

    #[test]
    fn test_start_emits_draft_started_then_phase_changed() {
        let t0 = Instant::now();
        let (machine, effects) = DraftMachine::start(
            SessionId::new("s"),
            tournament_phases(),
            DraftConfig::default(),
            t0,
        );
        assert_eq!(
            messages(&effects),
            vec![
                &ServerMessage::DraftStarted {
                    phase_count: 20,
                    timer_duration_ms: 30_000
                },
                &ServerMessage::PhaseChanged {
                    current_phase: 0,
                    current_side: Side::Blue,
                    action_kind: ActionKind::Ban,
                    timer_remaining_ms: 30_000
                },
            ]
        );
        assert_eq!(machine.status(), DraftStatus::Active);
        assert_eq!(machine.remaining(t0), Duration::from_secs(30));
    }

    #[test]
    fn test_lock_in_blue_ban_advances_to_red() {
        let (mut machine, t0) = start();
        let effects = machine.lock_in(Side::Blue, Some(champ("A")), t0).unwrap();

        assert_eq!(
            messages(&effects),
            vec![
                &ServerMessage::ChampionSelected {
                    phase: 0,
                    side: Side::Blue,
                    action_kind: ActionKind::Ban,
                    champion_id: champ("A"),
                    auto_selected: false
                },
                &ServerMessage::PhaseChanged {
                    current_phase: 1,
                    current_side: Side::Red,
                    action_kind: ActionKind::Ban,
                    timer_remaining_ms: 30_000
                },
            ]
        );
        assert_eq!(machine.bans().blue, vec![champ("A")]);
        assert_eq!(machine.current_index(), 1);
        assert!(effects.contains(&Effect::Persist(PersistRequest::Action(
            RecordedAction {
                phase: 0,
                side: Side::Blue,
                kind: ActionKind::Ban,
                champion_id: champ("A"),
                auto_selected: false,
            }
        ))));
    }

    #[test]
    fn test_second_lock_in_same_phase_rejected() {
        let (mut machine, t0) = start();
        machine.lock_in(Side::Blue, Some(champ("A")), t0).unwrap();

        let err = machine
            .lock_in(Side::Blue, Some(champ("B")), t0)
            .unwrap_err();
        assert_eq!(
            err,
            DraftError::NotYourTurn {
                phase: 1,
                side: Side::Red
            }
        );
        assert_eq!(err.code(), 403);
        assert_eq!(machine.bans().blue.len(), 1);
        assert_eq!(machine.current_index(), 1);
    }

    #[test]
    fn test_repeated_lock_in_when_side_keeps_the_turn() {
        let (mut machine, t0) = start();
        play(&mut machine, 7, t0);
        assert_eq!(machine.current_index(), 7);
        machine.select(Side::Red, champ("A")).unwrap();
        machine.lock_in(Side::Red, None, t0).unwrap();

        // Phase 8 is red too, so the repeat reaches the selection checks.
        let err = machine.lock_in(Side::Red, None, t0).unwrap_err();
        assert_eq!(err, DraftError::NoSelection);
        assert_eq!(err.code(), 400);

        let err = machine
            .lock_in(Side::Red, Some(champ("A")), t0)
            .unwrap_err();
        assert_eq!(err, DraftError::ChampionUnavailable(champ("A")));
        assert_eq!(err.code(), 409);

        assert_eq!(machine.picks().red, vec![champ("A")]);
        assert_eq!(machine.current_index(), 8);
    }

    #[test]
    fn test_wrong_side_cannot_select_or_lock() {
        let (mut machine, t0) = start();
        assert!(matches!(
            machine.select(Side::Red, champ("A")),
            Err(DraftError::NotYourTurn { .. })
        ));
        assert!(matches!(
            machine.lock_in(Side::Red, Some(champ("A")), t0),
            Err(DraftError::NotYourTurn { .. })
        ));
        assert!(machine.hovered(Side::Red).is_none());
        assert_eq!(machine.current_index(), 0);
    }

    #[test]
    fn test_champion_unique_across_picks_and_bans() {
        let (mut machine, t0) = start();
        machine.lock_in(Side::Blue, Some(champ("A")), t0).unwrap();

        let err = machine
            .lock_in(Side::Red, Some(champ("A")), t0)
            .unwrap_err();
        assert_eq!(err, DraftError::ChampionUnavailable(champ("A")));
        assert!(machine.bans().red.is_empty());

        // Still rejected once picks begin.
        play(&mut machine, 5, t0);
        assert_eq!(machine.current_phase().unwrap().action_kind, ActionKind::Pick);
        assert!(matches!(
            machine.lock_in(Side::Blue, Some(champ("A")), t0),
            Err(DraftError::ChampionUnavailable(_))
        ));
    }

    #[test]
    fn test_placeholder_cannot_be_chosen() {
        let (mut machine, t0) = start();
        assert!(matches!(
            machine.lock_in(Side::Blue, Some(ChampionId::placeholder()), t0),
            Err(DraftError::ChampionUnavailable(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    #[test]
    fn test_select_then_lock_in_uses_selection() {
        let (mut machine, t0) = start();
        let effects = machine.select(Side::Blue, champ("ahri")).unwrap();
        assert_eq!(
            messages(&effects),
            vec![&ServerMessage::ChampionHovered {
                side: Side::Blue,
                champion_id: Some(champ("ahri"))
            }]
        );
        // Hover never writes into picks or bans.
        assert!(machine.bans().blue.is_empty());

        machine.lock_in(Side::Blue, None, t0).unwrap();
        assert_eq!(machine.bans().blue, vec![champ("ahri")]);
        assert!(machine.hovered(Side::Blue).is_none());
    }

    #[test]
    fn test_lock_in_without_selection_is_rejected() {
        let (mut machine, t0) = start();
        assert_eq!(
            machine.lock_in(Side::Blue, None, t0),
            Err(DraftError::NoSelection)
        );
    }

    #[test]
    fn test_hover_none_clears_selection() {
        let (mut machine, _) = start();
        machine.hover(Side::Blue, Some(champ("lux"))).unwrap();
        assert_eq!(machine.hovered(Side::Blue), Some(&champ("lux")));
        let effects = machine.hover(Side::Blue, None).unwrap();
        assert_eq!(kinds(&effects), vec!["champion_hovered"]);
        assert!(machine.hovered(Side::Blue).is_none());
    }

    // -----------------------------------------------------------------------
    // Timer and expiry
    // -----------------------------------------------------------------------

    #[test]
    fn test_advance_time_emits_ticks() {
        let (mut machine, t0) = start();
        let effects = machine.advance_time(t0 + Duration::from_secs(1));
        assert_eq!(
            messages(&effects),
            vec![&ServerMessage::Tick {
                remaining: 29_000,
                is_buffer_period: false
            }]
        );
        assert!(machine.advance_time(t0 + Duration::from_millis(1_500)).is_empty());
    }

    #[test]
    fn test_expiry_locks_current_selection() {
        let (mut machine, t0) = start();
        machine.select(Side::Blue, champ("zed")).unwrap();

        let effects = machine.advance_time(t0 + Duration::from_secs(30));
        assert_eq!(
            kinds(&effects),
            vec!["expired", "champion_selected", "phase_changed"]
        );
        assert_eq!(
            messages(&effects)[0],
            &ServerMessage::Expired {
                phase: 0,
                auto_selected: Some(champ("zed"))
            }
        );
        assert!(matches!(
            messages(&effects)[1],
            ServerMessage::ChampionSelected {
                auto_selected: true,
                ..
            }
        ));
        assert_eq!(machine.bans().blue, vec![champ("zed")]);
        assert_eq!(machine.current_index(), 1);
    }

    #[test]
    fn test_expired_ban_without_selection_records_placeholder() {
        let (mut machine, t0) = start();
        machine.advance_time(t0 + Duration::from_secs(30));
        assert_eq!(machine.bans().blue, vec![ChampionId::placeholder()]);

        // A second empty ban is allowed to repeat the placeholder.
        machine.advance_time(t0 + Duration::from_secs(60));
        assert_eq!(machine.bans().red, vec![ChampionId::placeholder()]);
        assert_eq!(machine.current_index(), 2);
    }

    #[test]
    fn test_expired_pick_draws_from_pool() {
        let (mut machine, t0) = start_with(DraftConfig {
            auto_pick_pool: vec![champ("c0"), champ("garen")],
            ..DraftConfig::default()
        });
        play(&mut machine, 6, t0); // c0..c5 banned
        assert_eq!(machine.current_phase().unwrap().action_kind, ActionKind::Pick);

        machine.advance_time(t0 + Duration::from_secs(30));
        // c0 is banned, so garen is the only candidate.
        assert_eq!(machine.picks().blue, vec![champ("garen")]);
    }

    #[test]
    fn test_every_phase_starts_at_full_duration() {
        let (mut machine, t0) = start();
        let later = t0 + Duration::from_secs(25);
        machine.lock_in(Side::Blue, Some(champ("A")), later).unwrap();
        assert_eq!(machine.remaining(later), Duration::from_secs(30));
    }

    // -----------------------------------------------------------------------
    // Pause / resume
    // -----------------------------------------------------------------------

    #[test]
    fn test_pause_freezes_and_resume_restarts_full_duration() {
        let (mut machine, t0) = start();
        let paused_at = t0 + Duration::from_secs(18);
        let effects = machine.pause(Side::Blue, BLUE_CAPTAIN, paused_at).unwrap();
        assert_eq!(
            messages(&effects),
            vec![&ServerMessage::DraftPaused {
                paused_by: BLUE_CAPTAIN,
                side: Side::Blue,
                timer_frozen: 12_000,
                max_pause_time: None
            }]
        );
        assert_eq!(machine.status(), DraftStatus::Paused);

        // Frozen: no ticks, no expiry while paused.
        let t1 = t0 + Duration::from_secs(100);
        assert!(machine.advance_time(t1).is_empty());
        assert_eq!(machine.current_index(), 0);

        machine.resume_ready(Side::Blue, true, t1).unwrap();
        let effects = machine.resume_ready(Side::Red, true, t1).unwrap();
        assert_eq!(
            messages(&effects),
            vec![
                &ServerMessage::ResumeReadyChanged {
                    blue: true,
                    red: true
                },
                &ServerMessage::ResumeCountdown {
                    seconds: 3,
                    cancelled: false
                },
            ]
        );
        assert_eq!(machine.next_deadline(), Some(t1 + Duration::from_secs(1)));

        let effects = machine.advance_time(t1 + Duration::from_secs(1));
        assert_eq!(
            messages(&effects),
            vec![&ServerMessage::ResumeCountdown {
                seconds: 2,
                cancelled: false
            }]
        );
        machine.advance_time(t1 + Duration::from_secs(2));
        let t2 = t1 + Duration::from_secs(3);
        let effects = machine.advance_time(t2);
        assert_eq!(
            messages(&effects),
            vec![&ServerMessage::DraftResumed {
                timer_remaining: 30_000
            }]
        );
        assert_eq!(machine.status(), DraftStatus::Active);
        assert_eq!(machine.remaining(t2), Duration::from_secs(30));

        // The next phase starts at the full duration too.
        let effects = machine.lock_in(Side::Blue, Some(champ("A")), t2).unwrap();
        assert!(messages(&effects).contains(&&ServerMessage::PhaseChanged {
            current_phase: 1,
            current_side: Side::Red,
            action_kind: ActionKind::Ban,
            timer_remaining_ms: 30_000
        }));
    }

    #[test]
    fn test_commands_rejected_while_paused() {
        let (mut machine, t0) = start();
        machine.pause(Side::Red, RED_CAPTAIN, t0).unwrap();
        assert_eq!(
            machine.lock_in(Side::Blue, Some(champ("A")), t0),
            Err(DraftError::DraftPaused)
        );
        assert_eq!(
            machine.pause(Side::Blue, BLUE_CAPTAIN, t0),
            Err(DraftError::DraftPaused)
        );
        assert!(machine.bans().blue.is_empty());
    }

    #[test]
    fn test_resume_ready_requires_pause() {
        let (mut machine, t0) = start();
        assert_eq!(
            machine.resume_ready(Side::Blue, true, t0),
            Err(DraftError::NotPaused)
        );
    }

    #[test]
    fn test_unready_cancels_countdown() {
        let (mut machine, t0) = start();
        machine.pause(Side::Blue, BLUE_CAPTAIN, t0).unwrap();
        machine.resume_ready(Side::Blue, true, t0).unwrap();
        machine.resume_ready(Side::Red, true, t0).unwrap();
        machine.advance_time(t0 + Duration::from_secs(1));

        let effects = machine
            .resume_ready(Side::Red, false, t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            messages(&effects)[1],
            &ServerMessage::ResumeCountdown {
                seconds: 2,
                cancelled: true
            }
        );
        assert!(machine.next_deadline().is_none());
        assert!(machine.advance_time(t0 + Duration::from_secs(10)).is_empty());
        assert_eq!(machine.status(), DraftStatus::Paused);
    }

    #[test]
    fn test_zero_countdown_resumes_immediately() {
        let (mut machine, t0) = start_with(DraftConfig {
            resume_countdown_secs: 0,
            ..DraftConfig::default()
        });
        machine.pause(Side::Blue, BLUE_CAPTAIN, t0).unwrap();
        machine.resume_ready(Side::Blue, true, t0).unwrap();
        let effects = machine.resume_ready(Side::Red, true, t0).unwrap();
        assert_eq!(kinds(&effects), vec!["resume_ready_changed", "draft_resumed"]);
        assert_eq!(machine.status(), DraftStatus::Active);
    }

    #[test]
    fn test_max_pause_is_advisory() {
        let (mut machine, t0) = start_with(DraftConfig {
            max_pause_ms: Some(5_000),
            ..DraftConfig::default()
        });
        machine.pause(Side::Blue, BLUE_CAPTAIN, t0).unwrap();
        assert_eq!(machine.pause_info().unwrap().max_pause_time, Some(5_000));
        machine.advance_time(t0 + Duration::from_secs(60));
        assert_eq!(machine.status(), DraftStatus::Paused);
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    #[test]
    fn test_edit_accepted_mutates_slot_in_place() {
        let (mut machine, t0) = start();
        play(&mut machine, 3, t0); // blue bans c0, c2; red bans c1

        let effects = machine
            .propose_edit(
                Side::Blue,
                BLUE_CAPTAIN,
                ActionKind::Ban,
                Side::Blue,
                1,
                champ("yasuo"),
                t0,
            )
            .unwrap();
        assert_eq!(kinds(&effects), vec!["edit_proposed"]);
        assert_eq!(machine.pending_edit().unwrap().old_champion_id, champ("c2"));

        let effects = machine.respond_edit(Side::Red, true).unwrap();
        assert_eq!(
            messages(&effects),
            vec![&ServerMessage::EditApplied {
                slot_type: ActionKind::Ban,
                side: Side::Blue,
                slot_index: 1,
                old_champion_id: champ("c2"),
                new_champion_id: champ("yasuo")
            }]
        );
        assert_eq!(machine.bans().blue, vec![champ("c0"), champ("yasuo")]);
        assert_eq!(machine.current_index(), 3);
        assert!(machine.pending_edit().is_none());
        // Recorded under the phase that filled the slot.
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Persist(PersistRequest::Action(RecordedAction { phase: 2, .. }))
        )));
    }

    #[test]
    fn test_edit_rejected_by_opponent() {
        let (mut machine, t0) = start();
        play(&mut machine, 1, t0);
        machine
            .propose_edit(Side::Red, RED_CAPTAIN, ActionKind::Ban, Side::Blue, 0, champ("x"), t0)
            .unwrap();
        let effects = machine.respond_edit(Side::Blue, false).unwrap();
        assert!(matches!(
            messages(&effects)[0],
            ServerMessage::EditRejected {
                expired: false,
                cancelled: false,
                ..
            }
        ));
        assert_eq!(machine.bans().blue, vec![champ("c0")]);
    }

    #[test]
    fn test_proposer_cannot_answer_own_edit() {
        let (mut machine, t0) = start();
        play(&mut machine, 1, t0);
        machine
            .propose_edit(Side::Blue, BLUE_CAPTAIN, ActionKind::Ban, Side::Blue, 0, champ("x"), t0)
            .unwrap();
        assert_eq!(
            machine.respond_edit(Side::Blue, true),
            Err(DraftError::NotCaptain(Side::Red))
        );
        assert!(machine.pending_edit().is_some());
    }

    #[test]
    fn test_propose_edit_validation() {
        let (mut machine, t0) = start();
        play(&mut machine, 2, t0);
        let propose = |m: &mut DraftMachine, slot: usize, id: &str| {
            m.propose_edit(Side::Blue, BLUE_CAPTAIN, ActionKind::Ban, Side::Blue, slot, champ(id), t0)
        };

        assert!(matches!(propose(&mut machine, 1, "x"), Err(DraftError::InvalidSlot(_))));
        assert_eq!(propose(&mut machine, 0, "c0"), Err(DraftError::EditUnchanged));
        assert_eq!(
            propose(&mut machine, 0, "c1"),
            Err(DraftError::ChampionUnavailable(champ("c1")))
        );
        propose(&mut machine, 0, "x").unwrap();
        assert_eq!(propose(&mut machine, 0, "y"), Err(DraftError::EditPending));
        assert_eq!(
            machine.respond_edit(Side::Red, true).map(|_| ()),
            Ok(())
        );
        assert_eq!(
            machine.respond_edit(Side::Red, true),
            Err(DraftError::NoPendingEdit)
        );
    }

    #[test]
    fn test_edit_expires() {
        let (mut machine, t0) = start_with(DraftConfig {
            edit_ttl_ms: 5_000,
            ..DraftConfig::default()
        });
        play(&mut machine, 1, t0);
        machine
            .propose_edit(Side::Red, RED_CAPTAIN, ActionKind::Ban, Side::Blue, 0, champ("x"), t0)
            .unwrap();
        assert_eq!(machine.next_deadline(), Some(t0 + Duration::from_secs(1)));

        let effects = machine.advance_time(t0 + Duration::from_secs(5));
        assert!(messages(&effects).iter().any(|m| matches!(
            m,
            ServerMessage::EditRejected {
                expired: true,
                cancelled: false,
                ..
            }
        )));
        assert!(machine.pending_edit().is_none());
        assert_eq!(machine.bans().blue, vec![champ("c0")]);
    }

    #[test]
    fn test_pause_cancels_pending_edit() {
        let (mut machine, t0) = start();
        play(&mut machine, 1, t0);
        machine
            .propose_edit(Side::Red, RED_CAPTAIN, ActionKind::Ban, Side::Blue, 0, champ("x"), t0)
            .unwrap();
        let effects = machine.pause(Side::Blue, BLUE_CAPTAIN, t0).unwrap();
        assert_eq!(kinds(&effects), vec!["draft_paused", "edit_rejected"]);
        assert!(matches!(
            messages(&effects)[1],
            ServerMessage::EditRejected {
                cancelled: true,
                ..
            }
        ));
        assert!(machine.pending_edit().is_none());
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    #[test]
    fn test_full_draft_completes_after_twenty_phases() {
        let (mut machine, t0) = start();
        play(&mut machine, 19, t0);
        assert!(!machine.is_complete());

        let effects = machine.lock_in(Side::Red, Some(champ("c19")), t0).unwrap();
        assert_eq!(
            kinds(&effects),
            vec!["champion_selected", "draft_completed"]
        );
        assert!(machine.is_complete());
        assert_eq!(machine.current_index(), 20);
        for side in Side::ALL {
            assert_eq!(machine.picks().get(side).len(), 5);
            assert_eq!(machine.bans().get(side).len(), 5);
        }
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Persist(PersistRequest::Completion(_))
        )));

        // Terminal: nothing else is accepted and the timer is gone.
        assert_eq!(
            machine.lock_in(Side::Red, Some(champ("zz")), t0),
            Err(DraftError::DraftComplete)
        );
        assert_eq!(
            machine.pause(Side::Blue, BLUE_CAPTAIN, t0),
            Err(DraftError::DraftComplete)
        );
        assert!(machine.next_deadline().is_none());
        assert!(machine.advance_time(t0 + Duration::from_secs(600)).is_empty());
    }

    #[test]
    fn test_phase_index_only_moves_forward_by_one() {
        let (mut machine, t0) = start();
        let mut last = machine.current_index();
        for step in 1..=20u64 {
            let phase = machine.current_phase().unwrap();
            // Alternate between explicit lock-ins and expiry.
            if step % 2 == 0 {
                machine
                    .lock_in(phase.side, Some(champ(&format!("c{step}"))), t0)
                    .unwrap();
            } else {
                let deadline = machine.next_deadline().unwrap();
                // Drain ticks until the phase expires.
                let mut now = deadline;
                while machine.current_index() == last {
                    machine.advance_time(now);
                    now = machine.next_deadline().unwrap_or(now);
                }
            }
            assert_eq!(machine.current_index(), last + 1);
            last = machine.current_index();
        }
        assert!(machine.is_complete());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let (mut machine, t0) = start();
        play(&mut machine, 2, t0);
        machine.select(Side::Blue, champ("ahri")).unwrap();
        machine.pause(Side::Red, RED_CAPTAIN, t0 + Duration::from_secs(10)).unwrap();

        let snap = machine.snapshot(PerSide::new(true, true), t0 + Duration::from_secs(50));
        assert_eq!(snap.status, DraftStatus::Paused);
        assert_eq!(snap.current_phase, 2);
        assert_eq!(snap.phases.len(), 20);
        assert_eq!(snap.timer_remaining_ms, 20_000);
        assert_eq!(snap.bans.blue, vec![champ("c0")]);
        assert_eq!(snap.hovered.blue, Some(champ("ahri")));
        assert_eq!(snap.pause.unwrap().paused_by, RED_CAPTAIN);
        assert_eq!(snap.resume_ready, Some(PerSide::new(false, false)));
    }
}
