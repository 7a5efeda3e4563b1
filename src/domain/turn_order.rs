use crate::domain::game::PlayerScore;

/// Rotation of `0..count` starting at `first`.
pub fn ordered_seats(first: usize, count: usize) -> Vec<usize> {
    (0..count).map(|offset| (first + offset) % count).collect()
}

/// First seat in `order` that is neither blind nor committed, if any.
pub fn next_bidder(order: &[usize], scores: &[PlayerScore], blind: &[bool]) -> Option<usize> {
    order.iter().copied().find(|&seat| {
        let is_blind = blind.get(seat).copied().unwrap_or(false);
        let pending = scores.get(seat).is_some_and(|player| player.bid.is_none());
        !is_blind && pending
    })
}

/// Whether a seat's bid input is usable during regular bidding.
///
/// Committed and blind seats stay editable; otherwise only the active seat is.
pub fn seat_enabled(seat: usize, active: Option<usize>, scores: &[PlayerScore]) -> bool {
    let Some(player) = scores.get(seat) else {
        return false;
    };
    player.blind_bid || player.has_bid() || active == Some(seat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores_with(bids: &[Option<u32>]) -> Vec<PlayerScore> {
        bids.iter()
            .enumerate()
            .map(|(seat, bid)| {
                let mut player = PlayerScore::new(format!("P{seat}"), seat);
                player.bid = *bid;
                player
            })
            .collect()
    }

    #[test]
    fn rotation_wraps() {
        assert_eq!(ordered_seats(2, 4), vec![2, 3, 0, 1]);
        assert_eq!(ordered_seats(0, 3), vec![0, 1, 2]);
        assert_eq!(ordered_seats(4, 5), vec![4, 0, 1, 2, 3]);
        assert!(ordered_seats(0, 0).is_empty());
    }

    #[test]
    fn skips_committed_and_blind_seats() {
        let scores = scores_with(&[Some(2), None, Some(3)]);
        let blind = [false, true, false];
        assert_eq!(next_bidder(&[0, 1, 2], &scores, &blind), None);
    }

    #[test]
    fn follows_rotation_order() {
        let scores = scores_with(&[None, None, None, None]);
        let blind = [false, false, true, false];
        assert_eq!(next_bidder(&ordered_seats(2, 4), &scores, &blind), Some(3));

        let scores = scores_with(&[None, None, None, Some(1)]);
        assert_eq!(next_bidder(&ordered_seats(2, 4), &scores, &blind), Some(0));
    }

    #[test]
    fn enablement_during_regular_bidding() {
        let mut scores = scores_with(&[Some(1), None, None]);
        scores[2].blind_bid = true;
        assert!(seat_enabled(0, Some(1), &scores));
        assert!(seat_enabled(1, Some(1), &scores));
        assert!(seat_enabled(2, Some(1), &scores));

        let scores = scores_with(&[None, None, None]);
        assert!(!seat_enabled(2, Some(1), &scores));
        assert!(!seat_enabled(7, Some(1), &scores));
    }
}
