//! The phase table: who acts, and whether they ban or pick, at each index.
//!
//! The tournament order used by default:
//!
//! ```text
//!  0- 5  ban   B R B R B R
//!  6-11  pick  B R R B B R
//! 12-15  ban   R B R B
//! 16-19  pick  R B B R
//! ```
//!
//! A phase fills slot `n` of its side's pick or ban list, where `n` is the
//! number of earlier phases with the same side and kind.

use pickban_protocol::{ActionKind, Phase, Side};

use crate::DraftError;

use ActionKind::{Ban, Pick};
use Side::{Blue, Red};

/// Side and action for each index of the tournament order.
pub const TOURNAMENT_ORDER: [(Side, ActionKind); 20] = [
    (Blue, Ban),
    (Red, Ban),
    (Blue, Ban),
    (Red, Ban),
    (Blue, Ban),
    (Red, Ban),
    (Blue, Pick),
    (Red, Pick),
    (Red, Pick),
    (Blue, Pick),
    (Blue, Pick),
    (Red, Pick),
    (Red, Ban),
    (Blue, Ban),
    (Red, Ban),
    (Blue, Ban),
    (Red, Pick),
    (Blue, Pick),
    (Blue, Pick),
    (Red, Pick),
];

/// The 20-phase tournament table.
pub fn tournament_phases() -> Vec<Phase> {
    TOURNAMENT_ORDER
        .iter()
        .enumerate()
        .map(|(index, &(side, action_kind))| Phase {
            index,
            side,
            action_kind,
        })
        .collect()
}

/// Slot filled by the phase at `index`.
pub fn slot_index(phases: &[Phase], index: usize) -> usize {
    let Some(target) = phases.get(index) else {
        return 0;
    };
    phases[..index]
        .iter()
        .filter(|p| p.side == target.side && p.action_kind == target.action_kind)
        .count()
}

/// Index of the phase that fills `slot` of `side`'s `kind` list.
pub fn phase_for_slot(
    phases: &[Phase],
    side: Side,
    kind: ActionKind,
    slot: usize,
) -> Option<usize> {
    phases
        .iter()
        .filter(|p| p.side == side && p.action_kind == kind)
        .nth(slot)
        .map(|p| p.index)
}

/// Checks that a table is usable: non-empty and indexed `0..len` in order.
pub fn validate(phases: &[Phase]) -> Result<(), DraftError> {
    if phases.is_empty() {
        return Err(DraftError::Malformed("phase table is empty".into()));
    }
    if let Some(bad) = phases.iter().enumerate().find(|(i, p)| p.index != *i) {
        return Err(DraftError::Malformed(format!(
            "phase at position {} has index {}",
            bad.0, bad.1.index
        )));
    }
    Ok(())
}
