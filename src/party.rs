//! Party membership lookups used when a combat starts.

use crate::character::read_json_map;
use crate::errors::PersistenceResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub leader: String,
    pub members: Vec<String>,
}

pub trait PartyDirectory: Send + Sync {
    /// Every party, keyed by party name.
    fn parties(&self) -> PersistenceResult<BTreeMap<String, Party>>;

    /// The members who fight alongside `requester`: the party they lead, or
    /// just themselves.
    fn combat_group(&self, requester: &str) -> PersistenceResult<Vec<String>> {
        let led = self
            .parties()?
            .into_values()
            .find(|party| party.leader == requester);
        Ok(match led {
            Some(party) => party.members,
            None => vec![requester.to_string()],
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticParties {
    parties: BTreeMap<String, Party>,
}

impl StaticParties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_party(mut self, name: &str, leader: &str, members: &[&str]) -> Self {
        self.parties.insert(
            name.to_string(),
            Party {
                leader: leader.to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }
}

impl PartyDirectory for StaticParties {
    fn parties(&self) -> PersistenceResult<BTreeMap<String, Party>> {
        Ok(self.parties.clone())
    }
}

/// Parties read from a JSON object keyed by party name.
#[derive(Debug, Clone)]
pub struct JsonPartyDirectory {
    path: PathBuf,
}

impl JsonPartyDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PartyDirectory for JsonPartyDirectory {
    fn parties(&self) -> PersistenceResult<BTreeMap<String, Party>> {
        read_json_map(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_brings_whole_party() {
        let parties = StaticParties::new().with_party("Ashen", "10", &["10", "11", "12"]);
        assert_eq!(parties.combat_group("10").unwrap(), vec!["10", "11", "12"]);
    }

    #[test]
    fn test_non_leader_fights_alone() {
        let parties = StaticParties::new().with_party("Ashen", "10", &["10", "11"]);
        assert_eq!(parties.combat_group("11").unwrap(), vec!["11"]);
        assert_eq!(parties.combat_group("99").unwrap(), vec!["99"]);
    }

    #[test]
    fn test_json_directory_reads_parties() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("parties.json");
        std::fs::write(
            &path,
            r#"{ "Ashen": { "leader": "10", "members": ["10", "11"] } }"#,
        )
        .expect("write");

        let directory = JsonPartyDirectory::new(&path);
        assert_eq!(directory.combat_group("10").unwrap(), vec!["10", "11"]);
    }
}
