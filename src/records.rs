use std::collections::HashMap;
use chrono::Local;
use tracing::info;
use crate::bracket::Side;
use crate::error::RecordsError;
use crate::tournament::Tournament;
use crate::types::{BracketView, CreateTournamentRequest, TournamentSummary, UpdateSettingsRequest};

/// RecordBook owns every tournament the service knows about.
/// Each mutating call returns a snapshot of the affected tournament so the
/// caller can hand it to the store without holding the lock.
#[derive(Default)]
pub struct RecordBook {
    /// Tournaments indexed by id
    tournaments: HashMap<String, Tournament>,
    /// Suffix for the next generated id
    next_seq: u64,
}

impl RecordBook {
    pub fn new() -> Self {
        RecordBook::default()
    }

    /// Seed the book with tournaments loaded from a store
    pub fn from_tournaments(list: Vec<Tournament>) -> Self {
        let mut book = RecordBook::new();
        for tournament in list {
            book.tournaments.insert(tournament.id.clone(), tournament);
        }
        book
    }

    /// Create a tournament, optionally with its initial team list.
    /// Nothing is added to the book if any team is rejected.
    pub fn create(&mut self, request: CreateTournamentRequest) -> Result<Tournament, RecordsError> {
        let id = self.generate_id();
        let mut tournament = Tournament::new(id, &request.name, request.format, request.seeding)?;
        for team in &request.teams {
            tournament.add_team(team)?;
        }
        info!(tournament = %tournament.id, name = %tournament.name, "tournament created");
        self.tournaments.insert(tournament.id.clone(), tournament.clone());
        Ok(tournament)
    }

    /// Summaries sorted oldest first
    pub fn list(&self) -> Vec<TournamentSummary> {
        let mut tournaments: Vec<&Tournament> = self.tournaments.values().collect();
        tournaments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tournaments.into_iter().map(TournamentSummary::from).collect()
    }

    pub fn get(&self, id: &str) -> Result<&Tournament, RecordsError> {
        self.tournaments
            .get(id)
            .ok_or_else(|| RecordsError::TournamentNotFound(id.to_string()))
    }

    /// Everything a renderer needs for one bracket
    pub fn view(&self, id: &str) -> Result<BracketView, RecordsError> {
        self.get(id).map(BracketView::from)
    }

    pub fn delete(&mut self, id: &str) -> Result<Tournament, RecordsError> {
        let removed = self
            .tournaments
            .remove(id)
            .ok_or_else(|| RecordsError::TournamentNotFound(id.to_string()))?;
        info!(tournament = %id, "tournament deleted");
        Ok(removed)
    }

    pub fn add_team(&mut self, id: &str, name: &str) -> Result<Tournament, RecordsError> {
        self.with_tournament(id, |tournament| tournament.add_team(name))
    }

    pub fn remove_team(&mut self, id: &str, name: &str) -> Result<Tournament, RecordsError> {
        self.with_tournament(id, |tournament| tournament.remove_team(name))
    }

    pub fn rename_team(&mut self, id: &str, current: &str, new_name: &str) -> Result<Tournament, RecordsError> {
        self.with_tournament(id, |tournament| tournament.rename_team(current, new_name))
    }

    /// Update name, format or seeding. The bracket is not rebuilt; a new
    /// format or seeding applies from the next build.
    pub fn update_settings(&mut self, id: &str, request: UpdateSettingsRequest) -> Result<Tournament, RecordsError> {
        self.with_tournament(id, |tournament| {
            let name = match request.name.as_deref() {
                Some(raw) if raw.trim().is_empty() => return Err(RecordsError::BlankTournamentName),
                Some(raw) => Some(raw.trim().to_string()),
                None => None,
            };
            let mut updated = tournament.clone();
            if let Some(name) = name {
                updated.name = name;
            }
            if let Some(format) = request.format {
                updated.format = format;
            }
            if let Some(seeding) = request.seeding {
                updated.seeding = seeding;
            }
            *tournament = updated;
            tournament.touch();
            Ok(())
        })
    }

    /// Destructive rebuild of the bracket from the current team list
    pub fn build_bracket(&mut self, id: &str) -> Result<Tournament, RecordsError> {
        let snapshot = self.with_tournament(id, |tournament| tournament.build_bracket())?;
        info!(
            tournament = %id,
            teams = snapshot.teams.len(),
            rounds = snapshot.rounds.len(),
            "bracket built"
        );
        Ok(snapshot)
    }

    /// Drop the built bracket so teams can be added or removed again
    pub fn clear_bracket(&mut self, id: &str) -> Result<Tournament, RecordsError> {
        let snapshot = self.with_tournament(id, |tournament| {
            tournament.clear_bracket();
            Ok(())
        })?;
        info!(tournament = %id, "bracket cleared");
        Ok(snapshot)
    }

    pub fn record_score(
        &mut self,
        id: &str,
        match_id: u64,
        side: Side,
        value: Option<f64>,
    ) -> Result<Tournament, RecordsError> {
        self.with_tournament(id, |tournament| tournament.record_score(match_id, side, value))
    }

    fn with_tournament<F>(&mut self, id: &str, f: F) -> Result<Tournament, RecordsError>
    where
        F: FnOnce(&mut Tournament) -> Result<(), RecordsError>,
    {
        let tournament = self
            .tournaments
            .get_mut(id)
            .ok_or_else(|| RecordsError::TournamentNotFound(id.to_string()))?;
        f(tournament)?;
        Ok(tournament.clone())
    }

    fn generate_id(&mut self) -> String {
        let stamp = Local::now().format("%Y%m%d%H%M%S");
        loop {
            self.next_seq += 1;
            let id = format!("t{stamp}-{}", self.next_seq);
            if !self.tournaments.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::{Format, Seeding};

    fn create_request(name: &str, teams: &[&str]) -> CreateTournamentRequest {
        CreateTournamentRequest {
            name: name.to_string(),
            format: Format::Single,
            seeding: Seeding::Input,
            teams: teams.iter().map(|team| team.to_string()).collect(),
        }
    }

    #[test]
    fn test_create_and_list() {
        let mut book = RecordBook::new();
        let first = book.create(create_request("Dodgeball", &["A", "B"])).unwrap();
        let second = book.create(create_request("Relay", &[])).unwrap();
        assert_ne!(first.id, second.id);

        let summaries = book.list();
        assert_eq!(summaries.len(), 2);
        let dodgeball = summaries.iter().find(|s| s.id == first.id).unwrap();
        assert_eq!(dodgeball.team_count, 2);
        assert_eq!(dodgeball.round_count, 0);
        assert_eq!(dodgeball.champion, None);
    }

    #[test]
    fn test_create_rejects_bad_team_list() {
        let mut book = RecordBook::new();
        assert_eq!(
            book.create(create_request("Dodgeball", &["A", "A"])).unwrap_err(),
            RecordsError::DuplicateTeam("A".to_string())
        );
        assert_eq!(
            book.create(create_request(" ", &["A"])).unwrap_err(),
            RecordsError::BlankTournamentName
        );
        assert!(book.list().is_empty());
    }

    #[test]
    fn test_bracket_flow() {
        let mut book = RecordBook::new();
        let id = book.create(create_request("Futsal", &["A", "B", "C", "D"])).unwrap().id;
        let built = book.build_bracket(&id).unwrap();
        assert_eq!(built.rounds.len(), 2);

        book.record_score(&id, 1, Side::A, Some(2.0)).unwrap();
        book.record_score(&id, 1, Side::B, Some(1.0)).unwrap();
        book.record_score(&id, 2, Side::A, Some(0.0)).unwrap();
        book.record_score(&id, 2, Side::B, Some(3.0)).unwrap();
        book.record_score(&id, 3, Side::A, Some(1.0)).unwrap();
        let snapshot = book.record_score(&id, 3, Side::B, Some(4.0)).unwrap();
        assert_eq!(snapshot.placements().gold.as_deref(), Some("C"));

        let view = book.view(&id).unwrap();
        assert_eq!(view.round_labels, vec!["Semifinal", "Final"]);
        assert_eq!(view.placements.silver.as_deref(), Some("A"));
        assert_eq!(book.list()[0].champion.as_deref(), Some("C"));
    }

    #[test]
    fn test_unknown_ids() {
        let mut book = RecordBook::new();
        assert_eq!(
            book.build_bracket("missing").unwrap_err(),
            RecordsError::TournamentNotFound("missing".to_string())
        );
        let id = book.create(create_request("Futsal", &["A"])).unwrap().id;
        assert_eq!(
            book.build_bracket(&id).unwrap_err(),
            RecordsError::InsufficientTeams { count: 1 }
        );
        assert_eq!(
            book.record_score(&id, 1, Side::A, Some(1.0)).unwrap_err(),
            RecordsError::MatchNotFound(1)
        );
    }

    #[test]
    fn test_update_settings() {
        let mut book = RecordBook::new();
        let id = book.create(create_request("Futsal", &["A", "B"])).unwrap().id;
        let updated = book
            .update_settings(
                &id,
                UpdateSettingsRequest {
                    name: Some(" Futsal Cup ".to_string()),
                    format: Some(Format::Double),
                    seeding: Some(Seeding::Random),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Futsal Cup");
        assert_eq!(updated.format, Format::Double);
        assert_eq!(updated.seeding, Seeding::Random);

        let err = book
            .update_settings(
                &id,
                UpdateSettingsRequest {
                    name: Some("".to_string()),
                    format: Some(Format::Single),
                    seeding: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, RecordsError::BlankTournamentName);
        assert_eq!(book.get(&id).unwrap().format, Format::Double);
    }

    #[test]
    fn test_update_settings_touches_timestamp() {
        let mut book = RecordBook::new();
        let id = book.create(create_request("Futsal", &["A", "B"])).unwrap().id;
        let stale = "2000-01-01T00:00:00+00:00".to_string();
        if let Some(tournament) = book.tournaments.get_mut(&id) {
            tournament.updated_at = stale.clone();
        }
        let updated = book
            .update_settings(
                &id,
                UpdateSettingsRequest {
                    seeding: Some(Seeding::Random),
                    ..UpdateSettingsRequest::default()
                },
            )
            .unwrap();
        assert_ne!(updated.updated_at, stale);
        assert_eq!(book.get(&id).unwrap().updated_at, updated.updated_at);
    }

    #[test]
    fn test_clear_bracket_unlocks_team_list() {
        let mut book = RecordBook::new();
        let id = book.create(create_request("Futsal", &["A", "B"])).unwrap().id;
        book.build_bracket(&id).unwrap();
        assert_eq!(book.add_team(&id, "C").unwrap_err(), RecordsError::BracketBuilt);

        let cleared = book.clear_bracket(&id).unwrap();
        assert!(cleared.rounds.is_empty());
        assert_eq!(book.add_team(&id, "C").unwrap().teams.len(), 3);
        assert!(book.clear_bracket("missing").is_err());
    }

    #[test]
    fn test_team_edits_and_delete() {
        let mut book = RecordBook::from_tournaments(Vec::new());
        let id = book.create(create_request("Futsal", &["A"])).unwrap().id;
        book.add_team(&id, "B").unwrap();
        book.rename_team(&id, "B", "Blue").unwrap();
        let snapshot = book.remove_team(&id, "A").unwrap();
        assert_eq!(snapshot.teams, vec!["Blue".to_string()]);

        let removed = book.delete(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(book.get(&id).is_err());

        let restored = RecordBook::from_tournaments(vec![removed]);
        assert_eq!(restored.list().len(), 1);
    }
}
