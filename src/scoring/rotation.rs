//! Bowling Rotation
//!
//! Which opposing team bowls each over of an innings.
//!
//! Innings `i` is bowled by the three teams that follow the batting team in
//! batting order, wrapping around. Over the four innings this is a Latin
//! square: every team bowls exactly once at every other team, and bowls
//! each over slot (0, 1, 2) exactly once across the match.

use crate::TEAMS_PER_MATCH;

/// Bowling teams for overs 0, 1 and 2 of innings `innings_index`.
///
/// `innings_index` wraps modulo four.
pub fn rotation_for_innings<T: Copy>(batting_order: &[T; TEAMS_PER_MATCH], innings_index: usize) -> [T; 3] {
    let batting = innings_index % TEAMS_PER_MATCH;
    [
        batting_order[(batting + 1) % TEAMS_PER_MATCH],
        batting_order[(batting + 2) % TEAMS_PER_MATCH],
        batting_order[(batting + 3) % TEAMS_PER_MATCH],
    ]
}

/// Rotation for all four innings of a match.
pub fn match_rotation<T: Copy>(batting_order: &[T; TEAMS_PER_MATCH]) -> [[T; 3]; TEAMS_PER_MATCH] {
    [
        rotation_for_innings(batting_order, 0),
        rotation_for_innings(batting_order, 1),
        rotation_for_innings(batting_order, 2),
        rotation_for_innings(batting_order, 3),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_batting_team() {
        let order = ['A', 'B', 'C', 'D'];
        assert_eq!(rotation_for_innings(&order, 0), ['B', 'C', 'D']);
        assert_eq!(rotation_for_innings(&order, 1), ['C', 'D', 'A']);
        assert_eq!(rotation_for_innings(&order, 2), ['D', 'A', 'B']);
        assert_eq!(rotation_for_innings(&order, 3), ['A', 'B', 'C']);
    }

    #[test]
    fn test_each_team_bowls_each_slot_once() {
        let order = [0usize, 1, 2, 3];
        let rotation = match_rotation(&order);

        for team in order {
            let mut slots: Vec<usize> = rotation
                .iter()
                .filter_map(|overs| overs.iter().position(|t| *t == team))
                .collect();
            slots.sort();
            assert_eq!(slots, vec![0, 1, 2], "team {team} slots");
        }
    }

    #[test]
    fn test_index_wraps() {
        let order = [1, 2, 3, 4];
        assert_eq!(rotation_for_innings(&order, 4), rotation_for_innings(&order, 0));
    }
}
