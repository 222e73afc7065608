use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordsError {
  #[error("A bracket needs at least two teams (got {count}).")]
  InsufficientTeams { count: usize },

  #[error("Team \"{0}\" is already in the list.")]
  DuplicateTeam(String),

  #[error("Team name cannot be blank.")]
  BlankTeamName,

  #[error("Tournament name cannot be blank.")]
  BlankTournamentName,

  #[error("The bracket is already built; clear it before adding or removing teams.")]
  BracketBuilt,

  #[error("Team \"{0}\" not found.")]
  TeamNotFound(String),

  #[error("Match {0} not found.")]
  MatchNotFound(u64),

  #[error("Tournament {0} not found.")]
  TournamentNotFound(String),

  #[error("{0}")]
  Store(String),
}

impl RecordsError {
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      RecordsError::TeamNotFound(_) | RecordsError::MatchNotFound(_) | RecordsError::TournamentNotFound(_)
    )
  }
}
