use crate::error::RecordsError;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Format {
  #[default]
  Single,
  Double,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Seeding {
  #[default]
  Input,
  Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
  #[serde(alias = "a")]
  A,
  #[serde(alias = "b")]
  B,
}

impl Side {
  /// Which feed of the parent a child in `slot_idx` fills.
  pub fn for_slot(slot_idx: usize) -> Self {
    if slot_idx % 2 == 0 { Side::A } else { Side::B }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
  pub id: u64,
  pub round_idx: usize,
  pub slot_idx: usize,
  pub team_a: Option<String>,
  pub team_b: Option<String>,
  pub score_a: Option<f64>,
  pub score_b: Option<f64>,
  pub winner: Option<String>,
  pub parent_id: Option<u64>,
  pub is_bye: bool,
  pub match_number: Option<u32>,
}

impl Match {
  fn empty(id: u64, round_idx: usize, slot_idx: usize, parent_id: Option<u64>) -> Self {
    Match {
      id,
      round_idx,
      slot_idx,
      team_a: None,
      team_b: None,
      score_a: None,
      score_b: None,
      winner: None,
      parent_id,
      is_bye: false,
      match_number: None,
    }
  }

  pub fn team(&self, side: Side) -> Option<&str> {
    match side {
      Side::A => self.team_a.as_deref(),
      Side::B => self.team_b.as_deref(),
    }
  }

  pub fn score(&self, side: Side) -> Option<f64> {
    match side {
      Side::A => self.score_a,
      Side::B => self.score_b,
    }
  }

  pub fn set_score(&mut self, side: Side, value: Option<f64>) {
    match side {
      Side::A => self.score_a = value,
      Side::B => self.score_b = value,
    }
  }

  fn set_team(&mut self, side: Side, team: Option<String>) {
    match side {
      Side::A => self.team_a = team,
      Side::B => self.team_b = team,
    }
  }

  /// The side that did not win. `None` while unresolved and for byes.
  pub fn loser(&self) -> Option<&str> {
    if self.is_bye {
      return None;
    }
    let winner = self.winner.as_deref()?;
    if self.team_a.as_deref() == Some(winner) {
      self.team_b.as_deref()
    } else {
      self.team_a.as_deref()
    }
  }
}

pub type Round = Vec<Match>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placements {
  pub gold: Option<String>,
  pub silver: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamState {
  Active,
  Eliminated,
  Champion,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
  pub team: String,
  pub state: TeamState,
  pub eliminated_in_round: Option<usize>,
}

/// Builds a fresh single-elimination bracket. Byes are already advanced and
/// match numbers assigned when this returns.
pub fn build_rounds<R: Rng + ?Sized>(
  teams: &[String],
  seeding: Seeding,
  rng: &mut R,
) -> Result<Vec<Round>, RecordsError> {
  if teams.len() < 2 {
    return Err(RecordsError::InsufficientTeams { count: teams.len() });
  }

  let mut ordered = teams.to_vec();
  if seeding == Seeding::Random {
    ordered.shuffle(rng);
  }

  let size = bracket_size(ordered.len());
  let round_count = size.trailing_zeros() as usize;
  let seeds = seed_positions(size);

  // Ids run round by round, so the first id of every round is known up front.
  let mut round_bases = Vec::with_capacity(round_count);
  let mut next_base = 1u64;
  for round_idx in 0..round_count {
    round_bases.push(next_base);
    next_base += (size >> (round_idx + 1)) as u64;
  }

  let mut rounds: Vec<Round> = Vec::with_capacity(round_count);
  for round_idx in 0..round_count {
    let match_count = size >> (round_idx + 1);
    let mut round = Vec::with_capacity(match_count);
    for slot_idx in 0..match_count {
      let id = round_bases[round_idx] + slot_idx as u64;
      let parent_id = round_bases
        .get(round_idx + 1)
        .map(|base| base + (slot_idx / 2) as u64);
      let mut game = Match::empty(id, round_idx, slot_idx, parent_id);
      if round_idx == 0 {
        game.team_a = seeded_team(&ordered, seeds[slot_idx * 2]);
        game.team_b = seeded_team(&ordered, seeds[slot_idx * 2 + 1]);
        let bye_winner = match (&game.team_a, &game.team_b) {
          (Some(team), None) | (None, Some(team)) => Some(team.clone()),
          _ => None,
        };
        if bye_winner.is_some() {
          game.is_bye = true;
          game.winner = bye_winner;
        }
      }
      round.push(game);
    }
    rounds.push(round);
  }

  propagate(&mut rounds);

  debug!(
    teams = ordered.len(),
    bracket_size = size,
    rounds = round_count,
    byes = size - ordered.len(),
    "built elimination bracket"
  );
  Ok(rounds)
}

/// Recomputes every winner from the recorded scores, top-down. Sides of
/// rounds after the first are derived only from their children, so they are
/// cleared first and refilled by the sweep. Match numbers are refreshed last.
pub fn propagate(rounds: &mut [Round]) {
  for round in rounds.iter_mut().skip(1) {
    for game in round.iter_mut() {
      game.team_a = None;
      game.team_b = None;
    }
  }

  for round_idx in 0..rounds.len() {
    let (current, later) = rounds.split_at_mut(round_idx + 1);
    let mut next_round = later.first_mut();
    for game in current[round_idx].iter_mut() {
      game.winner = resolve_winner(game);
      let (Some(winner), Some(parent_id)) = (game.winner.clone(), game.parent_id) else {
        continue;
      };
      let Some(parent) = next_round
        .as_deref_mut()
        .and_then(|round| round.iter_mut().find(|candidate| candidate.id == parent_id))
      else {
        continue;
      };
      parent.set_team(Side::for_slot(game.slot_idx), Some(winner));
    }
  }

  refresh_match_numbers(rounds);
}

fn resolve_winner(game: &Match) -> Option<String> {
  if game.is_bye {
    return game.winner.clone();
  }
  let team_a = game.team_a.as_ref()?;
  let team_b = game.team_b.as_ref()?;
  let (score_a, score_b) = (game.score_a?, game.score_b?);
  if score_a > score_b {
    Some(team_a.clone())
  } else if score_b > score_a {
    Some(team_b.clone())
  } else {
    None
  }
}

/// Numbers follow build order (round 0 first), so they equal the match id and
/// stay fixed until the next build. A later-round slot shows its number only
/// once a team has advanced into it.
fn refresh_match_numbers(rounds: &mut [Round]) {
  for game in rounds.iter_mut().flat_map(|round| round.iter_mut()) {
    let reachable = game.round_idx == 0 || game.team_a.is_some() || game.team_b.is_some();
    game.match_number = if reachable { u32::try_from(game.id).ok() } else { None };
  }
}

pub fn round_label(matches_in_round: usize) -> String {
  match matches_in_round {
    1 => "Final".to_string(),
    2 => "Semifinal".to_string(),
    4 => "Quarterfinal".to_string(),
    count => format!("Round of {}", count * 2),
  }
}

pub fn placements(rounds: &[Round]) -> Placements {
  let Some(final_match) = rounds.last().and_then(|round| round.first()) else {
    return Placements::default();
  };
  match final_match.winner.as_ref() {
    Some(winner) => Placements {
      gold: Some(winner.clone()),
      silver: final_match.loser().map(|team| team.to_string()),
    },
    None => Placements::default(),
  }
}

pub fn team_states(teams: &[String], rounds: &[Round]) -> Vec<TeamStanding> {
  let champion = placements(rounds).gold;
  teams
    .iter()
    .map(|team| {
      if champion.as_deref() == Some(team.as_str()) {
        return TeamStanding {
          team: team.clone(),
          state: TeamState::Champion,
          eliminated_in_round: None,
        };
      }
      let lost_in = rounds
        .iter()
        .flat_map(|round| round.iter())
        .find(|game| game.loser() == Some(team.as_str()))
        .map(|game| game.round_idx);
      TeamStanding {
        team: team.clone(),
        state: if lost_in.is_some() { TeamState::Eliminated } else { TeamState::Active },
        eliminated_in_round: lost_in,
      }
    })
    .collect()
}

pub fn find_match(rounds: &[Round], match_id: u64) -> Option<&Match> {
  rounds.iter().flat_map(|round| round.iter()).find(|game| game.id == match_id)
}

pub fn find_match_mut(rounds: &mut [Round], match_id: u64) -> Option<&mut Match> {
  rounds
    .iter_mut()
    .flat_map(|round| round.iter_mut())
    .find(|game| game.id == match_id)
}

pub fn bracket_size(team_count: usize) -> usize {
  team_count.max(2).next_power_of_two()
}

fn seeded_team(ordered: &[String], seed: u32) -> Option<String> {
  let index = usize::try_from(seed).ok()?.checked_sub(1)?;
  ordered.get(index).cloned()
}

/// Leaf order for a seeded bracket: `[1]`, `[1, 2]`, `[1, 4, 2, 3]`, ...
/// Adjacent pairs meet in the first round; seed 1 and 2 land in opposite halves.
fn seed_positions(size: usize) -> Vec<u32> {
  let mut seeds = vec![1u32];
  while seeds.len() < size {
    let n = seeds.len() as u32;
    let mut next = Vec::with_capacity(seeds.len() * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}
