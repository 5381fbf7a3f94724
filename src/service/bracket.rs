//! Bracket generation for tournaments.
//!
//! Everything here is pure: callers pass participants in seed order and persist
//! the resulting matches themselves.

use crate::models::tournament::TournamentFormat;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum BracketError {
    #[error("At least 2 participants are required, got {0}")]
    NotEnoughParticipants(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracketMatch {
    pub round: i32,
    pub match_number: i32,
    pub player1: Option<Uuid>,
    pub player2: Option<Uuid>,
    /// Set only for byes, which are complete as soon as they are created.
    pub winner: Option<Uuid>,
    pub is_bye: bool,
}

impl BracketMatch {
    fn empty(round: i32, match_number: i32) -> Self {
        Self {
            round,
            match_number,
            player1: None,
            player2: None,
            winner: None,
            is_bye: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bracket {
    pub size: usize,
    pub byes: usize,
    pub total_rounds: u32,
    pub winners_rounds: u32,
    pub losers_rounds: u32,
    pub grand_final_rounds: u32,
    pub matches: Vec<BracketMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Player1,
    Player2,
}

pub fn bracket_size(participants: usize) -> usize {
    participants.max(2).next_power_of_two()
}

/// Seeds (1-based) in bracket order. Consecutive pairs form the first round,
/// each pair is `(s, size + 1 - s)`, and seeds 1 and 2 can only meet in the final.
pub fn seed_order(size: usize) -> Vec<usize> {
    let mut order = vec![1];
    let mut current = 1;
    while current < size {
        current *= 2;
        order = order
            .iter()
            .flat_map(|&seed| [seed, current + 1 - seed])
            .collect();
    }
    order
}

/// Where the winner of `(round, match_number)` plays next in a single-elimination bracket.
pub fn next_slot(round: i32, match_number: i32) -> (i32, i32, Slot) {
    let slot = if match_number % 2 == 1 {
        Slot::Player1
    } else {
        Slot::Player2
    };
    (round + 1, (match_number + 1) / 2, slot)
}

pub fn elimination_rounds(size: usize) -> u32 {
    size.trailing_zeros()
}

/// Build the bracket for `participants`, which must already be in seed order.
pub fn generate(format: TournamentFormat, participants: &[Uuid]) -> Result<Bracket, BracketError> {
    if participants.len() < 2 {
        return Err(BracketError::NotEnoughParticipants(participants.len()));
    }

    let bracket = match format {
        TournamentFormat::SingleElimination => single_elimination(participants),
        TournamentFormat::DoubleElimination => double_elimination(participants),
        TournamentFormat::RoundRobin => round_robin(participants),
    };
    Ok(bracket)
}

fn first_round(participants: &[Uuid], size: usize) -> Vec<BracketMatch> {
    let seeded = |seed: usize| participants.get(seed - 1).copied();

    seed_order(size)
        .chunks(2)
        .enumerate()
        .map(|(idx, pair)| {
            let player1 = seeded(pair[0]);
            let player2 = seeded(pair[1]);
            let is_bye = player1.is_none() || player2.is_none();
            BracketMatch {
                round: 1,
                match_number: idx as i32 + 1,
                player1,
                player2,
                winner: if is_bye { player1.or(player2) } else { None },
                is_bye,
            }
        })
        .collect()
}

/// Every elimination round, with bye winners already placed in round 2.
fn elimination_matches(participants: &[Uuid], size: usize) -> Vec<BracketMatch> {
    let mut matches = first_round(participants, size);

    for round in 2..=elimination_rounds(size) as i32 {
        let count = size >> round;
        matches.extend((1..=count as i32).map(|m| BracketMatch::empty(round, m)));
    }

    let advanced: Vec<(i32, i32, Slot, Uuid)> = matches
        .iter()
        .filter(|m| m.round == 1)
        .filter_map(|m| {
            m.winner.map(|winner| {
                let (round, number, slot) = next_slot(m.round, m.match_number);
                (round, number, slot, winner)
            })
        })
        .collect();

    for (round, number, slot, winner) in advanced {
        if let Some(target) = matches
            .iter_mut()
            .find(|m| m.round == round && m.match_number == number)
        {
            match slot {
                Slot::Player1 => target.player1 = Some(winner),
                Slot::Player2 => target.player2 = Some(winner),
            }
        }
    }

    matches
}

fn single_elimination(participants: &[Uuid]) -> Bracket {
    let size = bracket_size(participants.len());
    let rounds = elimination_rounds(size);

    Bracket {
        size,
        byes: size - participants.len(),
        total_rounds: rounds,
        winners_rounds: rounds,
        losers_rounds: 0,
        grand_final_rounds: 0,
        matches: elimination_matches(participants, size),
    }
}

/// Only the winners bracket is materialized; the losers bracket and grand
/// final are counted in `total_rounds` but played off the record.
fn double_elimination(participants: &[Uuid]) -> Bracket {
    let size = bracket_size(participants.len());
    let winners_rounds = elimination_rounds(size);
    let losers_rounds = 2 * (winners_rounds - 1);
    let grand_final_rounds = 1;

    Bracket {
        size,
        byes: size - participants.len(),
        total_rounds: winners_rounds + losers_rounds + grand_final_rounds,
        winners_rounds,
        losers_rounds,
        grand_final_rounds,
        matches: elimination_matches(participants, size),
    }
}

/// Circle method: the first slot stays fixed while the rest rotate.
fn round_robin(participants: &[Uuid]) -> Bracket {
    let mut slots: Vec<Option<Uuid>> = participants.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let count = slots.len();
    let rounds = count - 1;
    let mut matches = Vec::with_capacity(participants.len() * (participants.len() - 1) / 2);

    for round in 0..rounds {
        let mut match_number = 0;
        for i in 0..count / 2 {
            if let (Some(player1), Some(player2)) = (slots[i], slots[count - 1 - i]) {
                match_number += 1;
                matches.push(BracketMatch {
                    round: round as i32 + 1,
                    match_number,
                    player1: Some(player1),
                    player2: Some(player2),
                    winner: None,
                    is_bye: false,
                });
            }
        }
        slots[1..].rotate_right(1);
    }

    Bracket {
        size: participants.len(),
        byes: count - participants.len(),
        total_rounds: rounds as u32,
        winners_rounds: 0,
        losers_rounds: 0,
        grand_final_rounds: 0,
        matches,
    }
}

/// A completed round-robin match as seen by the standings calculation.
#[derive(Debug, Clone, Copy)]
pub struct MatchOutcome {
    pub player1: Uuid,
    pub player2: Uuid,
    pub player1_score: i32,
    pub player2_score: i32,
    pub winner: Uuid,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub wins: u32,
    pub total_score: i64,
}

/// Round-robin winner: most wins, then highest total score, then lowest seed.
pub fn round_robin_winner(outcomes: &[MatchOutcome], seeds: &HashMap<Uuid, i32>) -> Option<Uuid> {
    let mut table: HashMap<Uuid, Standing> = seeds.keys().map(|id| (*id, Standing::default())).collect();

    for outcome in outcomes {
        table.entry(outcome.player1).or_default().total_score += i64::from(outcome.player1_score);
        table.entry(outcome.player2).or_default().total_score += i64::from(outcome.player2_score);
        table.entry(outcome.winner).or_default().wins += 1;
    }

    table
        .into_iter()
        .max_by(|(a_id, a), (b_id, b)| {
            let a_seed = seeds.get(a_id).copied().unwrap_or(i32::MAX);
            let b_seed = seeds.get(b_id).copied().unwrap_or(i32::MAX);
            a.wins
                .cmp(&b.wins)
                .then(a.total_score.cmp(&b.total_score))
                .then(b_seed.cmp(&a_seed))
        })
        .map(|(id, _)| id)
}
