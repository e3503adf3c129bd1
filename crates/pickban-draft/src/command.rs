//! Draft commands: the subset of client messages a session acts on.

use pickban_protocol::{ActionKind, ChampionId, ClientMessage, Side};

use crate::DraftError;

/// A command addressed to one session.
///
/// Connection-level messages (`hello`, `heartbeat`, `join_session`,
/// `leave_session`) are handled by the server and never become commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftCommand {
    Select(ChampionId),
    Hover(Option<ChampionId>),
    LockIn(Option<ChampionId>),
    SetReady(bool),
    Start,
    Pause,
    ResumeReady(bool),
    ProposeEdit {
        slot_type: ActionKind,
        side: Side,
        slot_index: usize,
        champion_id: ChampionId,
    },
    RespondEdit(bool),
}

impl DraftCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select_champion",
            Self::Hover(_) => "hover_champion",
            Self::LockIn(_) => "lock_in",
            Self::SetReady(_) => "set_ready",
            Self::Start => "start_draft",
            Self::Pause => "pause_draft",
            Self::ResumeReady(_) => "resume_ready",
            Self::ProposeEdit { .. } => "propose_edit",
            Self::RespondEdit(_) => "respond_edit",
        }
    }
}

impl TryFrom<ClientMessage> for DraftCommand {
    type Error = DraftError;

    fn try_from(msg: ClientMessage) -> Result<Self, Self::Error> {
        Ok(match msg {
            ClientMessage::SelectChampion { champion_id } => {
                Self::Select(champion_id)
            }
            ClientMessage::HoverChampion { champion_id } => {
                Self::Hover(champion_id)
            }
            ClientMessage::LockIn { champion_id } => Self::LockIn(champion_id),
            ClientMessage::SetReady { ready } => Self::SetReady(ready),
            ClientMessage::StartDraft {} => Self::Start,
            ClientMessage::PauseDraft {} => Self::Pause,
            ClientMessage::ResumeReady { ready } => Self::ResumeReady(ready),
            ClientMessage::ProposeEdit {
                slot_type,
                side,
                slot_index,
                champion_id,
            } => Self::ProposeEdit {
                slot_type,
                side,
                slot_index,
                champion_id,
            },
            ClientMessage::RespondEdit { accept } => Self::RespondEdit(accept),
            other @ (ClientMessage::Hello { .. }
            | ClientMessage::Heartbeat { .. }
            | ClientMessage::JoinSession { .. }
            | ClientMessage::LeaveSession {}) => {
                return Err(DraftError::Malformed(format!(
                    "{} is not a draft command",
                    other.kind()
                )));
            }
        })
    }
}
