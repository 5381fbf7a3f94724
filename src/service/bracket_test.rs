#[cfg(test)]
mod tests {
    use crate::models::tournament::TournamentFormat;
    use crate::service::bracket::*;
    use std::collections::{HashMap, HashSet};
    use uuid::Uuid;

    fn players(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_bracket_size() {
        assert_eq!(bracket_size(0), 2);
        assert_eq!(bracket_size(2), 2);
        assert_eq!(bracket_size(3), 4);
        assert_eq!(bracket_size(8), 8);
        assert_eq!(bracket_size(9), 16);
    }

    #[test]
    fn test_seed_order() {
        assert_eq!(seed_order(2), vec![1, 2]);
        assert_eq!(seed_order(4), vec![1, 4, 2, 3]);
        assert_eq!(seed_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_seed_pairs_sum_to_size_plus_one() {
        for size in [2, 4, 8, 16, 32, 64] {
            let order = seed_order(size);
            assert_eq!(order.len(), size);
            for pair in order.chunks(2) {
                assert_eq!(pair[0] + pair[1], size + 1);
            }
        }
    }

    #[test]
    fn test_top_seeds_in_opposite_halves() {
        let order = seed_order(16);
        let (top, bottom) = order.split_at(8);
        assert!(top.contains(&1));
        assert!(bottom.contains(&2));
    }

    #[test]
    fn test_not_enough_participants() {
        let result = generate(TournamentFormat::SingleElimination, &players(1));
        assert_eq!(result.unwrap_err(), BracketError::NotEnoughParticipants(1));
        assert!(generate(TournamentFormat::RoundRobin, &[]).is_err());
    }

    #[test]
    fn test_single_elimination_full_bracket() {
        let field = players(8);
        let bracket = generate(TournamentFormat::SingleElimination, &field).unwrap();

        assert_eq!(bracket.size, 8);
        assert_eq!(bracket.byes, 0);
        assert_eq!(bracket.total_rounds, 3);
        assert_eq!(bracket.matches.len(), 7);

        let first = &bracket.matches[0];
        assert_eq!(first.player1, Some(field[0]));
        assert_eq!(first.player2, Some(field[7]));
        assert!(!first.is_bye);
        assert!(bracket
            .matches
            .iter()
            .filter(|m| m.round > 1)
            .all(|m| m.player1.is_none() && m.player2.is_none()));
    }

    #[test]
    fn test_single_elimination_byes_advance() {
        let field = players(5);
        let bracket = generate(TournamentFormat::SingleElimination, &field).unwrap();

        assert_eq!(bracket.size, 8);
        assert_eq!(bracket.byes, 3);

        let byes: Vec<_> = bracket.matches.iter().filter(|m| m.is_bye).collect();
        assert_eq!(byes.len(), 3);
        let bye_winners: HashSet<Uuid> = byes.iter().filter_map(|m| m.winner).collect();
        assert_eq!(bye_winners, HashSet::from([field[0], field[1], field[2]]));

        // Seed 1 (match 1) waits in round 2 match 1 as player 1.
        let r2m1 = bracket
            .matches
            .iter()
            .find(|m| m.round == 2 && m.match_number == 1)
            .unwrap();
        assert_eq!(r2m1.player1, Some(field[0]));
        assert_eq!(r2m1.player2, None);

        // Seeds 2 and 3 (matches 3 and 4) meet in round 2 match 2.
        let r2m2 = bracket
            .matches
            .iter()
            .find(|m| m.round == 2 && m.match_number == 2)
            .unwrap();
        assert_eq!(r2m2.player1, Some(field[1]));
        assert_eq!(r2m2.player2, Some(field[2]));
    }

    #[test]
    fn test_two_player_bracket_is_a_final() {
        let bracket = generate(TournamentFormat::SingleElimination, &players(2)).unwrap();
        assert_eq!(bracket.total_rounds, 1);
        assert_eq!(bracket.matches.len(), 1);
    }

    #[test]
    fn test_next_slot() {
        assert_eq!(next_slot(1, 1), (2, 1, Slot::Player1));
        assert_eq!(next_slot(1, 2), (2, 1, Slot::Player2));
        assert_eq!(next_slot(1, 3), (2, 2, Slot::Player1));
        assert_eq!(next_slot(2, 4), (3, 2, Slot::Player2));
    }

    #[test]
    fn test_double_elimination_round_counts() {
        let bracket = generate(TournamentFormat::DoubleElimination, &players(8)).unwrap();
        assert_eq!(bracket.winners_rounds, 3);
        assert_eq!(bracket.losers_rounds, 4);
        assert_eq!(bracket.grand_final_rounds, 1);
        assert_eq!(bracket.total_rounds, 8);
        // The winners bracket is laid out in full so results can advance through it.
        assert_eq!(bracket.matches.len(), 7);
        assert!(bracket.matches.iter().all(|m| m.round <= 3));

        let small = generate(TournamentFormat::DoubleElimination, &players(2)).unwrap();
        assert_eq!(small.losers_rounds, 0);
        assert_eq!(small.total_rounds, 2);
    }

    #[test]
    fn test_double_elimination_byes_advance_in_winners_bracket() {
        let field = players(3);
        let bracket = generate(TournamentFormat::DoubleElimination, &field).unwrap();
        assert_eq!(bracket.byes, 1);

        let final_match = bracket
            .matches
            .iter()
            .find(|m| m.round == 2 && m.match_number == 1)
            .unwrap();
        assert_eq!(final_match.player1, Some(field[0]));
        assert_eq!(final_match.player2, None);
    }

    #[test]
    fn test_round_robin_even_field() {
        let field = players(6);
        let bracket = generate(TournamentFormat::RoundRobin, &field).unwrap();
        assert_eq!(bracket.total_rounds, 5);
        assert_eq!(bracket.matches.len(), 15);
        assert_eq!(bracket.byes, 0);
        assert_every_pair_once(&field, &bracket);
    }

    #[test]
    fn test_round_robin_odd_field() {
        let field = players(5);
        let bracket = generate(TournamentFormat::RoundRobin, &field).unwrap();
        assert_eq!(bracket.total_rounds, 5);
        assert_eq!(bracket.matches.len(), 10);
        assert_eq!(bracket.byes, 1);

        // One player sits out each round.
        for round in 1..=5 {
            let in_round = bracket.matches.iter().filter(|m| m.round == round).count();
            assert_eq!(in_round, 2);
        }
        assert_every_pair_once(&field, &bracket);
    }

    fn assert_every_pair_once(field: &[Uuid], bracket: &Bracket) {
        let mut seen = HashSet::new();
        for m in &bracket.matches {
            let (a, b) = (m.player1.unwrap(), m.player2.unwrap());
            let key = if a < b { (a, b) } else { (b, a) };
            assert!(seen.insert(key), "pair played twice");
        }
        assert_eq!(seen.len(), field.len() * (field.len() - 1) / 2);
    }

    #[test]
    fn test_round_robin_winner_by_wins() {
        let field = players(3);
        let seeds: HashMap<Uuid, i32> = field.iter().enumerate().map(|(i, id)| (*id, i as i32 + 1)).collect();
        let outcomes = [
            MatchOutcome { player1: field[0], player2: field[1], player1_score: 1, player2_score: 2, winner: field[1] },
            MatchOutcome { player1: field[1], player2: field[2], player1_score: 3, player2_score: 0, winner: field[1] },
            MatchOutcome { player1: field[0], player2: field[2], player1_score: 5, player2_score: 0, winner: field[0] },
        ];
        assert_eq!(round_robin_winner(&outcomes, &seeds), Some(field[1]));
    }

    #[test]
    fn test_round_robin_tiebreakers() {
        let field = players(3);
        let seeds: HashMap<Uuid, i32> = field.iter().enumerate().map(|(i, id)| (*id, i as i32 + 1)).collect();

        // Everyone wins once; player 3 scored the most.
        let by_score = [
            MatchOutcome { player1: field[0], player2: field[1], player1_score: 2, player2_score: 1, winner: field[0] },
            MatchOutcome { player1: field[1], player2: field[2], player1_score: 2, player2_score: 1, winner: field[1] },
            MatchOutcome { player1: field[2], player2: field[0], player1_score: 9, player2_score: 0, winner: field[2] },
        ];
        assert_eq!(round_robin_winner(&by_score, &seeds), Some(field[2]));

        // Identical records fall back to the lower seed.
        let by_seed = [
            MatchOutcome { player1: field[0], player2: field[1], player1_score: 1, player2_score: 0, winner: field[0] },
            MatchOutcome { player1: field[1], player2: field[2], player1_score: 1, player2_score: 0, winner: field[1] },
            MatchOutcome { player1: field[2], player2: field[0], player1_score: 1, player2_score: 0, winner: field[2] },
        ];
        assert_eq!(round_robin_winner(&by_seed, &seeds), Some(field[0]));
    }
}
