//! Who sits on which side, and who speaks for it.
//!
//! In 1v1 mode the first two distinct users to join take the two sides and
//! are their own captains. In team mode the sides come from a precomputed
//! [`TeamRoster`]; only each side's captain is authoritative. Everyone else
//! watches as a spectator.

use std::collections::HashSet;

use pickban_protocol::{PerSide, Side, UserId};
use serde::{Deserialize, Serialize};

use crate::DraftError;

/// Largest team a side may field, captain included.
pub const MAX_TEAM_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// TeamRoster
// ---------------------------------------------------------------------------

/// One side of a team-mode roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSide {
    pub captain: UserId,
    /// Other members. Listing the captain here too is allowed.
    #[serde(default)]
    pub members: Vec<UserId>,
}

impl TeamSide {
    fn contains(&self, user: UserId) -> bool {
        self.captain == user || self.members.contains(&user)
    }

    fn distinct_members(&self) -> HashSet<UserId> {
        let mut all: HashSet<UserId> = self.members.iter().copied().collect();
        all.insert(self.captain);
        all
    }
}

/// Immutable team assignment supplied by the team-balancing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub blue: TeamSide,
    pub red: TeamSide,
}

impl TeamRoster {
    /// Checks team sizes and that nobody plays for both sides.
    pub fn validate(&self) -> Result<(), DraftError> {
        let blue = self.blue.distinct_members();
        let red = self.red.distinct_members();
        for (side, members) in [(Side::Blue, &blue), (Side::Red, &red)] {
            if members.len() > MAX_TEAM_SIZE {
                return Err(DraftError::InvalidRoster(format!(
                    "{side} has {} members, limit is {MAX_TEAM_SIZE}",
                    members.len()
                )));
            }
        }
        if let Some(user) = blue.intersection(&red).next() {
            return Err(DraftError::InvalidRoster(format!(
                "user {user} is on both sides"
            )));
        }
        Ok(())
    }

    fn side(&self, side: Side) -> &TeamSide {
        match side {
            Side::Blue => &self.blue,
            Side::Red => &self.red,
        }
    }
}

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// Where a user sits in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Player { side: Side, is_captain: bool },
    Spectator,
}

impl Seat {
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Player { side, .. } => Some(*side),
            Self::Spectator => None,
        }
    }

    pub fn is_captain(&self) -> bool {
        matches!(self, Self::Player { is_captain: true, .. })
    }

    /// The side this seat may act for.
    pub fn authority(&self) -> Result<Side, DraftError> {
        match *self {
            Self::Player {
                side,
                is_captain: true,
            } => Ok(side),
            Self::Player {
                side,
                is_captain: false,
            } => Err(DraftError::NotCaptain(side)),
            Self::Spectator => Err(DraftError::Spectator),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Runtime seating for one session.
#[derive(Debug, Clone)]
pub enum Roster {
    /// Seats are claimed on first join and kept for the session's life.
    OneVsOne { claimed: PerSide<Option<UserId>> },
    Team(TeamRoster),
}

impl Roster {
    pub fn one_vs_one() -> Self {
        Self::OneVsOne {
            claimed: PerSide::default(),
        }
    }

    pub fn team(roster: TeamRoster) -> Result<Self, DraftError> {
        roster.validate()?;
        Ok(Self::Team(roster))
    }

    /// Seats `user`, claiming a free side in 1v1 mode if needed.
    ///
    /// `requested` is honored in 1v1 mode when that side is free; otherwise
    /// blue is tried before red. A user who already holds a side gets it
    /// back regardless of the request.
    pub fn assign(&mut self, user: UserId, requested: Option<Side>) -> Seat {
        if let Some(seat) = self.existing(user) {
            return seat;
        }
        let Self::OneVsOne { claimed } = self else {
            return Seat::Spectator;
        };
        let order = match requested {
            Some(side) => [side, side.opponent()],
            None => Side::ALL,
        };
        for side in order {
            let slot = claimed.get_mut(side);
            if slot.is_none() {
                *slot = Some(user);
                return Seat::Player {
                    side,
                    is_captain: true,
                };
            }
        }
        Seat::Spectator
    }

    /// Seat of `user` without claiming anything.
    pub fn seat(&self, user: UserId) -> Seat {
        self.existing(user).unwrap_or(Seat::Spectator)
    }

    fn existing(&self, user: UserId) -> Option<Seat> {
        match self {
            Self::OneVsOne { claimed } => Side::ALL
                .into_iter()
                .find(|&side| *claimed.get(side) == Some(user))
                .map(|side| Seat::Player {
                    side,
                    is_captain: true,
                }),
            Self::Team(roster) => Side::ALL
                .into_iter()
                .find(|&side| roster.side(side).contains(user))
                .map(|side| Seat::Player {
                    side,
                    is_captain: roster.side(side).captain == user,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(blue: (u64, &[u64]), red: (u64, &[u64])) -> TeamRoster {
        TeamRoster {
            blue: TeamSide {
                captain: UserId(blue.0),
                members: blue.1.iter().map(|&u| UserId(u)).collect(),
            },
            red: TeamSide {
                captain: UserId(red.0),
                members: red.1.iter().map(|&u| UserId(u)).collect(),
            },
        }
    }

    #[test]
    fn test_one_vs_one_first_two_users_take_sides() {
        let mut roster = Roster::one_vs_one();
        assert_eq!(
            roster.assign(UserId(1), None),
            Seat::Player {
                side: Side::Blue,
                is_captain: true
            }
        );
        assert_eq!(roster.assign(UserId(2), None).side(), Some(Side::Red));
        assert_eq!(roster.assign(UserId(3), None), Seat::Spectator);
    }

    #[test]
    fn test_one_vs_one_requested_side_honored_when_free() {
        let mut roster = Roster::one_vs_one();
        assert_eq!(
            roster.assign(UserId(1), Some(Side::Red)).side(),
            Some(Side::Red)
        );
        // Red is taken, so the second user falls back to blue.
        assert_eq!(
            roster.assign(UserId(2), Some(Side::Red)).side(),
            Some(Side::Blue)
        );
    }

    #[test]
    fn test_one_vs_one_returning_user_keeps_side() {
        let mut roster = Roster::one_vs_one();
        roster.assign(UserId(1), None);
        roster.assign(UserId(2), None);
        assert_eq!(
            roster.assign(UserId(2), Some(Side::Blue)).side(),
            Some(Side::Red)
        );
        assert_eq!(roster.seat(UserId(1)).side(), Some(Side::Blue));
    }

    #[test]
    fn test_team_captain_and_member_authority() {
        let roster = Roster::team(team((1, &[2, 3]), (10, &[11]))).unwrap();
        assert_eq!(roster.seat(UserId(1)).authority(), Ok(Side::Blue));
        assert_eq!(
            roster.seat(UserId(2)).authority(),
            Err(DraftError::NotCaptain(Side::Blue))
        );
        assert_eq!(roster.seat(UserId(10)).authority(), Ok(Side::Red));
        assert_eq!(
            roster.seat(UserId(99)).authority(),
            Err(DraftError::Spectator)
        );
    }

    #[test]
    fn test_team_roster_rejects_oversized_side() {
        let result = Roster::team(team((1, &[2, 3, 4, 5, 6]), (10, &[])));
        assert!(matches!(result, Err(DraftError::InvalidRoster(_))));
    }

    #[test]
    fn test_team_roster_captain_listed_in_members_counts_once() {
        let roster = team((1, &[1, 2, 3, 4, 5]), (10, &[]));
        assert!(roster.validate().is_ok());
    }

    #[test]
    fn test_team_roster_rejects_user_on_both_sides() {
        let result = Roster::team(team((1, &[7]), (10, &[7])));
        assert!(matches!(result, Err(DraftError::InvalidRoster(_))));
    }

    #[test]
    fn test_team_roster_deserializes() {
        let roster: TeamRoster = serde_json::from_value(serde_json::json!({
            "blue": {"captain": 1, "members": [2]},
            "red": {"captain": 3}
        }))
        .unwrap();
        assert_eq!(roster.red.captain, UserId(3));
        assert!(roster.red.members.is_empty());
    }
}
