use shared::domain::{Square, BOARD_SIZE};

use crate::codec::OccupancySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredMove {
    /// No cell changed; the player has not moved yet.
    None,
    Move {
        from: Square,
        to: Square,
    },
    /// Two cells vacated and one occupied: the signature of a capture
    /// (captured piece lifted, captor lifted, captor placed). Presence data
    /// alone cannot tell which vacated cell held the captor, so this is
    /// surfaced for an operator path instead of guessed.
    MultiChange,
    /// Any other transition pattern: sensor noise, a hovering hand, two
    /// simultaneous lifts. Never forwarded to the rules engine.
    Ambiguous,
}

/// Diffs two occupancy snapshots into a candidate move.
pub fn infer(prev: &OccupancySnapshot, curr: &OccupancySnapshot) -> InferredMove {
    let mut vacated = Vec::new();
    let mut occupied = Vec::new();

    for rank in 0..BOARD_SIZE {
        for file in 0..BOARD_SIZE {
            let Some(square) = Square::new(rank, file) else {
                continue;
            };
            match (prev.occupied(rank, file), curr.occupied(rank, file)) {
                (true, false) => vacated.push(square),
                (false, true) => occupied.push(square),
                _ => {}
            }
        }
    }

    match (vacated.as_slice(), occupied.as_slice()) {
        ([], []) => InferredMove::None,
        ([from], [to]) => InferredMove::Move {
            from: *from,
            to: *to,
        },
        ([_, _], [_]) => InferredMove::MultiChange,
        _ => InferredMove::Ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OccupancySnapshot;

    fn snapshot(occupied: &[(usize, usize)]) -> OccupancySnapshot {
        let mut cells = [[false; BOARD_SIZE]; BOARD_SIZE];
        for &(rank, file) in occupied {
            cells[rank][file] = true;
        }
        OccupancySnapshot::from_grid(cells)
    }

    fn square(rank: usize, file: usize) -> Square {
        Square::new(rank, file).expect("square")
    }

    #[test]
    fn single_cell_migration_is_a_concrete_move() {
        let prev = snapshot(&[(2, 1)]);
        let curr = snapshot(&[(3, 1)]);
        assert_eq!(
            infer(&prev, &curr),
            InferredMove::Move {
                from: square(2, 1),
                to: square(3, 1),
            }
        );
    }

    #[test]
    fn identical_snapshots_mean_no_move_yet() {
        let prev = snapshot(&[(2, 1), (0, 0)]);
        let curr = snapshot(&[(2, 1), (0, 0)]);
        assert_eq!(infer(&prev, &curr), InferredMove::None);
    }

    #[test]
    fn capture_signature_is_classified_not_resolved() {
        // Two lifts and one placement between the snapshots.
        let prev = snapshot(&[(4, 2), (3, 2)]);
        let curr = snapshot(&[(2, 2)]);
        assert_eq!(infer(&prev, &curr), InferredMove::MultiChange);
    }

    #[test]
    fn completed_capture_reads_as_one_vacancy_and_stays_unforwarded() {
        // Captor left (4,1) and now sits on the victim's cell (3,2), which
        // was already occupied in the baseline: one vacancy, no occupation.
        let prev = snapshot(&[(4, 1), (3, 2)]);
        let curr = snapshot(&[(3, 2)]);
        assert_eq!(infer(&prev, &curr), InferredMove::Ambiguous);
    }

    #[test]
    fn other_multi_cell_diffs_are_ambiguous() {
        // Two cells appeared out of nowhere.
        let prev = snapshot(&[(1, 1)]);
        let curr = snapshot(&[(1, 1), (2, 2), (3, 3)]);
        assert_eq!(infer(&prev, &curr), InferredMove::Ambiguous);

        // Two lifted, nothing placed.
        let prev = snapshot(&[(1, 1), (2, 2)]);
        let curr = snapshot(&[]);
        assert_eq!(infer(&prev, &curr), InferredMove::Ambiguous);

        // One lifted, two placed.
        let prev = snapshot(&[(1, 1)]);
        let curr = snapshot(&[(2, 2), (3, 3)]);
        assert_eq!(infer(&prev, &curr), InferredMove::Ambiguous);
    }
}
