//! Competition fixtures.

use regatta_sync_protocol::ReferenceGraph;
use regatta_sync_server::HubServer;
use regatta_types::{
    Athlete, CaseDecision, Competition, DeviceId, Entry, IncidentCase, IncidentReport, Location,
    Race, Stage, SyncId,
};

/// A small but complete competition: one stage, one race, two judging
/// locations ("L1", "L2") and three entries (bibs 41, 42, 43).
pub struct EventFixture {
    /// The competition.
    pub competition: Competition,
    /// Its single stage.
    pub stage: Stage,
    /// The race under test.
    pub race: Race,
    /// Judging locations, codes "L1" and "L2".
    pub locations: Vec<Location>,
    /// Registered athletes.
    pub athletes: Vec<Athlete>,
    /// Entries, bibs 41..=43.
    pub entries: Vec<Entry>,
    /// The replica the reference data is attributed to.
    pub hub_device: DeviceId,
}

impl EventFixture {
    /// Builds the fixture with fresh identifiers.
    #[must_use]
    pub fn new() -> Self {
        let hub_device = DeviceId::new();
        let competition = Competition {
            sync_id: SyncId::new(),
            name: "Spring Regatta".into(),
            venue: "Lakeside".into(),
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
            created_by: hub_device,
        };
        let stage = Stage {
            sync_id: SyncId::new(),
            competition: competition.sync_id,
            name: "Finals".into(),
            ordinal: 1,
            created_at_ms: 1_001,
            updated_at_ms: 1_001,
            created_by: hub_device,
        };
        let race = Race {
            sync_id: SyncId::new(),
            stage: stage.sync_id,
            name: "K1 Final".into(),
            scheduled_at_ms: 37_800_000,
            created_at_ms: 1_002,
            updated_at_ms: 1_002,
            created_by: hub_device,
        };
        let locations = ["L1", "L2"]
            .iter()
            .enumerate()
            .map(|(i, code)| Location {
                sync_id: SyncId::new(),
                competition: competition.sync_id,
                code: (*code).into(),
                name: format!("Gate {}", 14 + i),
                created_at_ms: 1_003,
                updated_at_ms: 1_003,
                created_by: hub_device,
            })
            .collect::<Vec<_>>();
        let athletes: Vec<Athlete> = [("Mira", "Kovacs"), ("Jon", "Aalto"), ("Lena", "Barth")]
            .iter()
            .map(|(given, family)| Athlete {
                sync_id: SyncId::new(),
                competition: competition.sync_id,
                given_name: (*given).into(),
                family_name: (*family).into(),
                club: "RC Lakeside".into(),
                created_at_ms: 1_004,
                updated_at_ms: 1_004,
                created_by: hub_device,
            })
            .collect();
        let entries: Vec<Entry> = athletes
            .iter()
            .enumerate()
            .map(|(i, athlete)| Entry {
                sync_id: SyncId::new(),
                race: race.sync_id,
                athlete: athlete.sync_id,
                bib_number: 41 + i as u32,
                created_at_ms: 1_005,
                updated_at_ms: 1_005,
                created_by: hub_device,
            })
            .collect();

        Self {
            competition,
            stage,
            race,
            locations,
            athletes,
            entries,
            hub_device,
        }
    }

    /// The fixture as a reference graph.
    #[must_use]
    pub fn graph(&self) -> ReferenceGraph {
        ReferenceGraph {
            competition: Some(self.competition.clone()),
            stages: vec![self.stage.clone()],
            races: vec![self.race.clone()],
            locations: self.locations.clone(),
            athletes: self.athletes.clone(),
            entries: self.entries.clone(),
        }
    }

    /// Commits the whole fixture on the hub, in dependency order.
    pub fn seed(&self, hub: &HubServer) {
        for payload in self.graph().payloads() {
            let outcome = hub.commit_local(&payload);
            assert!(
                outcome.is_committed(),
                "fixture record failed to commit: {outcome:?}"
            );
        }
    }

    /// Looks up a location by code ("L1", "L2").
    ///
    /// # Panics
    ///
    /// Panics if the code is not part of the fixture.
    #[must_use]
    pub fn location(&self, code: &str) -> SyncId {
        self.locations
            .iter()
            .find(|l| l.code == code)
            .map(|l| l.sync_id)
            .unwrap_or_else(|| panic!("fixture has no location {code}"))
    }

    /// Builds an open case observed in this fixture's race.
    #[must_use]
    pub fn case(
        &self,
        location_code: &str,
        bib_number: u32,
        created_at_ms: u64,
        device: DeviceId,
    ) -> IncidentCase {
        IncidentCase {
            sync_id: SyncId::new(),
            race: self.race.sync_id,
            location: self.location(location_code),
            bib_number,
            decision: CaseDecision::Open,
            notes: String::new(),
            created_at_ms,
            updated_at_ms: created_at_ms,
            created_by: device,
        }
    }

    /// Builds a report for a case.
    #[must_use]
    pub fn report(
        case: SyncId,
        observed_at_ms: u64,
        description: &str,
        device: DeviceId,
    ) -> IncidentReport {
        IncidentReport {
            sync_id: SyncId::new(),
            case,
            observed_at_ms,
            description: description.into(),
            created_at_ms: observed_at_ms,
            updated_at_ms: observed_at_ms,
            created_by: device,
        }
    }
}

impl Default for EventFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regatta_sync_server::HubConfig;

    #[test]
    fn fixture_seeds_cleanly() {
        let fixture = EventFixture::new();
        let hub = HubServer::new(HubConfig::new());
        fixture.seed(&hub);
        // competition + stage + race + 2 locations + 3 athletes + 3 entries
        assert_eq!(hub.record_count(), 11);
    }

    #[test]
    fn graph_is_in_dependency_order() {
        let fixture = EventFixture::new();
        let payloads = fixture.graph().payloads();
        for window in payloads.windows(2) {
            assert!(window[0].kind().dependency_rank() <= window[1].kind().dependency_rank());
        }
    }

    #[test]
    fn case_builder_uses_fixture_references() {
        let fixture = EventFixture::new();
        let device = DeviceId::new();
        let case = fixture.case("L1", 42, 38_330_000, device);
        assert_eq!(case.race, fixture.race.sync_id);
        assert_eq!(case.location, fixture.location("L1"));
        assert_eq!(
            regatta_types::RecordPayload::Case(case).references(),
            vec![fixture.race.sync_id, fixture.location("L1")]
        );
    }
}
