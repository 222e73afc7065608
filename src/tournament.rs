use crate::bracket::{
  self, find_match_mut, Format, Match, Placements, Round, Seeding, Side, TeamStanding,
};
use crate::error::RecordsError;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub teams: Vec<String>,
  #[serde(default)]
  pub rounds: Vec<Round>,
  #[serde(default)]
  pub format: Format,
  #[serde(default)]
  pub seeding: Seeding,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

impl Tournament {
  pub fn new(id: impl Into<String>, name: &str, format: Format, seeding: Seeding) -> Result<Self, RecordsError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(RecordsError::BlankTournamentName);
    }
    let now = timestamp();
    Ok(Tournament {
      id: id.into(),
      name: name.to_string(),
      teams: Vec::new(),
      rounds: Vec::new(),
      format,
      seeding,
      created_at: now.clone(),
      updated_at: now,
    })
  }

  // ── Team list ──────────────────────────────────────────────────────────

  /// Membership is fixed once a bracket exists; `clear_bracket` unlocks it.
  pub fn add_team(&mut self, raw: &str) -> Result<(), RecordsError> {
    self.ensure_no_bracket()?;
    let name = normalize_team_name(raw)?;
    if self.teams.contains(&name) {
      return Err(RecordsError::DuplicateTeam(name));
    }
    self.teams.push(name);
    self.touch();
    Ok(())
  }

  pub fn remove_team(&mut self, raw: &str) -> Result<(), RecordsError> {
    self.ensure_no_bracket()?;
    let name = raw.trim();
    let index = self
      .teams
      .iter()
      .position(|team| team == name)
      .ok_or_else(|| RecordsError::TeamNotFound(name.to_string()))?;
    self.teams.remove(index);
    self.touch();
    Ok(())
  }

  /// Renames in place, keeping the team's seed position. A built bracket is
  /// renamed along with the list, so results carry over.
  pub fn rename_team(&mut self, current: &str, raw_new: &str) -> Result<(), RecordsError> {
    let current = current.trim();
    let new_name = normalize_team_name(raw_new)?;
    let index = self
      .teams
      .iter()
      .position(|team| team == current)
      .ok_or_else(|| RecordsError::TeamNotFound(current.to_string()))?;
    if new_name != current && self.teams.contains(&new_name) {
      return Err(RecordsError::DuplicateTeam(new_name));
    }
    for game in self.rounds.iter_mut().flat_map(|round| round.iter_mut()) {
      for slot in [&mut game.team_a, &mut game.team_b, &mut game.winner] {
        if slot.as_deref() == Some(current) {
          *slot = Some(new_name.clone());
        }
      }
    }
    self.teams[index] = new_name;
    self.touch();
    Ok(())
  }

  fn ensure_no_bracket(&self) -> Result<(), RecordsError> {
    if self.rounds.is_empty() {
      Ok(())
    } else {
      Err(RecordsError::BracketBuilt)
    }
  }

  // ── Bracket ────────────────────────────────────────────────────────────

  pub fn build_bracket(&mut self) -> Result<(), RecordsError> {
    self.build_bracket_with_rng(&mut rand::thread_rng())
  }

  /// Replaces every round with a freshly built bracket. Previously entered
  /// scores are discarded; on error the current rounds are left untouched.
  pub fn build_bracket_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), RecordsError> {
    if self.format == Format::Double {
      warn!(
        tournament = %self.id,
        "double elimination has no losers bracket yet; building the winners bracket only"
      );
    }
    let rounds = bracket::build_rounds(&self.teams, self.seeding, rng)?;
    self.rounds = rounds;
    self.touch();
    debug!(tournament = %self.id, rounds = self.rounds.len(), "bracket rebuilt");
    Ok(())
  }

  /// Drops the bracket and every score so the team list can change again.
  pub fn clear_bracket(&mut self) {
    self.rounds.clear();
    self.touch();
  }

  pub fn record_score(&mut self, match_id: u64, side: Side, value: Option<f64>) -> Result<(), RecordsError> {
    let game = find_match_mut(&mut self.rounds, match_id).ok_or(RecordsError::MatchNotFound(match_id))?;
    game.set_score(side, value.filter(|score| score.is_finite()));
    bracket::propagate(&mut self.rounds);
    self.touch();
    Ok(())
  }

  /// Same as `record_score` for raw form input; anything that is not a
  /// number counts as no score.
  pub fn record_score_input(&mut self, match_id: u64, side: Side, raw: &str) -> Result<(), RecordsError> {
    self.record_score(match_id, side, parse_score(raw))
  }

  pub fn find_match(&self, match_id: u64) -> Option<&Match> {
    bracket::find_match(&self.rounds, match_id)
  }

  pub fn round_label(&self, round_idx: usize) -> Option<String> {
    self.rounds.get(round_idx).map(|round| bracket::round_label(round.len()))
  }

  pub fn round_labels(&self) -> Vec<String> {
    self.rounds.iter().map(|round| bracket::round_label(round.len())).collect()
  }

  pub fn placements(&self) -> Placements {
    bracket::placements(&self.rounds)
  }

  pub fn team_states(&self) -> Vec<TeamStanding> {
    bracket::team_states(&self.teams, &self.rounds)
  }

  pub(crate) fn touch(&mut self) {
    self.updated_at = timestamp();
  }
}

pub fn normalize_team_name(raw: &str) -> Result<String, RecordsError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(RecordsError::BlankTeamName);
  }
  Ok(trimmed.to_string())
}

pub fn parse_score(raw: &str) -> Option<f64> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn timestamp() -> String {
  Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bracket::TeamState;
  use rand::{rngs::StdRng, SeedableRng};

  fn tournament_with(teams: &[&str]) -> Tournament {
    let mut tournament = Tournament::new("t-1", "Spring Dodgeball", Format::Single, Seeding::Input).unwrap();
    for team in teams {
      tournament.add_team(team).unwrap();
    }
    tournament
  }

  #[test]
  fn test_new_rejects_blank_name() {
    assert_eq!(
      Tournament::new("t-1", "   ", Format::Single, Seeding::Input),
      Err(RecordsError::BlankTournamentName)
    );
    let tournament = Tournament::new("t-1", " Class 3-2 ", Format::Single, Seeding::Input).unwrap();
    assert_eq!(tournament.name, "Class 3-2");
    assert!(tournament.teams.is_empty());
    assert!(tournament.rounds.is_empty());
  }

  #[test]
  fn test_team_list_rules() {
    let mut tournament = tournament_with(&["Red", "Blue"]);
    assert_eq!(tournament.add_team("  "), Err(RecordsError::BlankTeamName));
    assert_eq!(tournament.add_team(" Red "), Err(RecordsError::DuplicateTeam("Red".to_string())));
    assert_eq!(tournament.teams, vec!["Red".to_string(), "Blue".to_string()]);

    tournament.rename_team("Blue", "Green").unwrap();
    assert_eq!(tournament.rename_team("Green", "Red"), Err(RecordsError::DuplicateTeam("Red".to_string())));
    assert_eq!(tournament.rename_team("Green", ""), Err(RecordsError::BlankTeamName));
    tournament.rename_team("Green", "Green").unwrap();
    assert_eq!(tournament.teams, vec!["Red".to_string(), "Green".to_string()]);

    assert_eq!(tournament.remove_team("Yellow"), Err(RecordsError::TeamNotFound("Yellow".to_string())));
    tournament.remove_team("Red").unwrap();
    assert_eq!(tournament.teams, vec!["Green".to_string()]);
  }

  #[test]
  fn test_rename_after_build_carries_results() {
    let mut tournament = tournament_with(&["A", "B", "C", "D"]);
    tournament.build_bracket().unwrap();
    tournament.record_score(1, Side::A, Some(2.0)).unwrap();
    tournament.record_score(1, Side::B, Some(1.0)).unwrap();

    tournament.rename_team("D", "Dogs").unwrap();
    tournament.rename_team("A", "Aces").unwrap();
    let first = tournament.find_match(1).unwrap();
    assert_eq!(first.team_a.as_deref(), Some("Aces"));
    assert_eq!(first.team_b.as_deref(), Some("Dogs"));
    assert_eq!(first.winner.as_deref(), Some("Aces"));
    assert_eq!(tournament.find_match(3).unwrap().team_a.as_deref(), Some("Aces"));

    let dogs = tournament.team_states().into_iter().find(|s| s.team == "Dogs").unwrap();
    assert_eq!(dogs.state, TeamState::Eliminated);
    assert_eq!(dogs.eliminated_in_round, Some(0));

    tournament.record_score(1, Side::A, Some(0.0)).unwrap();
    assert_eq!(tournament.find_match(3).unwrap().team_a.as_deref(), Some("Dogs"));
  }

  #[test]
  fn test_membership_locked_while_bracket_exists() {
    let mut tournament = tournament_with(&["A", "B", "C"]);
    tournament.build_bracket().unwrap();
    assert_eq!(tournament.add_team("D"), Err(RecordsError::BracketBuilt));
    assert_eq!(tournament.remove_team("A"), Err(RecordsError::BracketBuilt));
    assert_eq!(tournament.teams.len(), 3);

    tournament.clear_bracket();
    assert!(tournament.rounds.is_empty());
    tournament.add_team("D").unwrap();
    tournament.remove_team("A").unwrap();
    tournament.build_bracket().unwrap();
    assert!(tournament.team_states().iter().all(|s| s.team != "A"));
  }

  #[test]
  fn test_failed_build_keeps_rounds() {
    let mut tournament = tournament_with(&["A", "B", "C", "D"]);
    tournament.build_bracket_with_rng(&mut StdRng::seed_from_u64(3)).unwrap();
    let before = tournament.rounds.clone();
    tournament.teams.truncate(1);
    assert_eq!(
      tournament.build_bracket_with_rng(&mut StdRng::seed_from_u64(3)),
      Err(RecordsError::InsufficientTeams { count: 1 })
    );
    assert_eq!(tournament.rounds, before);
  }

  #[test]
  fn test_rebuild_discards_scores() {
    let mut tournament = tournament_with(&["A", "B", "C", "D"]);
    tournament.build_bracket().unwrap();
    tournament.record_score(1, Side::A, Some(2.0)).unwrap();
    tournament.record_score(1, Side::B, Some(1.0)).unwrap();
    let played = tournament.rounds.clone();
    assert_eq!(tournament.rounds[1][0].team_a.as_deref(), Some("A"));

    tournament.build_bracket().unwrap();
    assert_ne!(tournament.rounds, played);
    assert!(tournament.rounds.iter().flatten().all(|game| game.score_a.is_none() && game.score_b.is_none()));
    assert_eq!(tournament.rounds[1][0].team_a, None);
  }

  #[test]
  fn test_record_score_input_flow() {
    let mut tournament = tournament_with(&["A", "B", "C", "D"]);
    tournament.build_bracket().unwrap();
    tournament.record_score_input(1, Side::A, "2").unwrap();
    tournament.record_score_input(1, Side::B, "1").unwrap();
    tournament.record_score_input(2, Side::A, "0").unwrap();
    tournament.record_score_input(2, Side::B, "3").unwrap();
    let final_match = tournament.find_match(3).unwrap();
    assert_eq!(final_match.team_a.as_deref(), Some("A"));
    assert_eq!(final_match.team_b.as_deref(), Some("C"));

    tournament.record_score_input(3, Side::A, "1").unwrap();
    tournament.record_score_input(3, Side::B, "4").unwrap();
    assert_eq!(tournament.placements().gold.as_deref(), Some("C"));
    assert_eq!(tournament.placements().silver.as_deref(), Some("A"));

    tournament.record_score_input(3, Side::B, "abc").unwrap();
    assert_eq!(tournament.find_match(3).unwrap().score_b, None);
    assert_eq!(tournament.placements(), Placements::default());

    assert_eq!(
      tournament.record_score_input(99, Side::A, "1"),
      Err(RecordsError::MatchNotFound(99))
    );
  }

  #[test]
  fn test_round_labels_follow_match_count() {
    let mut tournament = tournament_with(&["A", "B", "C", "D", "E", "F", "G", "H", "I"]);
    tournament.build_bracket().unwrap();
    assert_eq!(
      tournament.round_labels(),
      vec!["Round of 16", "Quarterfinal", "Semifinal", "Final"]
    );
    assert_eq!(tournament.round_label(3).as_deref(), Some("Final"));
    assert_eq!(tournament.round_label(4), None);
  }

  #[test]
  fn test_double_format_builds_winners_bracket() {
    let mut tournament = Tournament::new("t-2", "Relay", Format::Double, Seeding::Input).unwrap();
    for team in ["A", "B", "C"] {
      tournament.add_team(team).unwrap();
    }
    tournament.build_bracket().unwrap();
    assert_eq!(tournament.rounds.len(), 2);
    assert_eq!(tournament.format, Format::Double);
  }

  #[test]
  fn test_parse_score() {
    assert_eq!(parse_score(" 3 "), Some(3.0));
    assert_eq!(parse_score("2.5"), Some(2.5));
    assert_eq!(parse_score(""), None);
    assert_eq!(parse_score("two"), None);
    assert_eq!(parse_score("NaN"), None);
    assert_eq!(parse_score("inf"), None);
  }

  #[test]
  fn test_serializes_camel_case() {
    let mut tournament = tournament_with(&["A", "B"]);
    tournament.build_bracket().unwrap();
    let value = serde_json::to_value(&tournament).unwrap();
    assert_eq!(value["seeding"], "input");
    assert_eq!(value["rounds"][0][0]["teamA"], "A");
    assert_eq!(value["rounds"][0][0]["isBye"], false);
    let restored: Tournament = serde_json::from_value(value).unwrap();
    assert_eq!(restored, tournament);
  }
}
