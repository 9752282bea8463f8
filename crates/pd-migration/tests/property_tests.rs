use pd_catalog::DefinitionCatalog;
use pd_migration::stages::trash_placement;
use pd_migration::validate::{check, sentinel_occurrences};
use pd_migration::{IdStrategy, MigrationConfig, MigrationDriver, ProtocolDocument, SchemaVersion};
use pd_schema::step_form::references;
use pd_schema::{CommandBody, EntityId, RobotType};
use pd_test_utils::definitions::{COMBINED_PCR, TIPRACK_300};
use pd_test_utils::{entity, fixture_catalog, slot, DocumentBuilder};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

const OT2_SLOTS: [&str; 11] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11"];
const FLEX_SLOTS: [&str; 11] = ["A1", "A2", "B1", "B2", "B3", "C1", "C2", "C3", "D1", "D2", "D3"];

fn driver(prefix: &str) -> MigrationDriver {
    let catalog: Arc<dyn DefinitionCatalog> = Arc::new(fixture_catalog());
    MigrationDriver::new(catalog).with_config(MigrationConfig::new().with_id_strategy(
        IdStrategy::Sequential {
            prefix: prefix.to_string(),
        },
    ))
}

/// Schema 6 document with one labware per entry of `combined`, each in its
/// own slot; `true` entries use the combined adapter+plate definition
fn generated(robot: RobotType, version: &str, combined: &[bool]) -> ProtocolDocument {
    let slots = match robot {
        RobotType::Ot2 => OT2_SLOTS,
        RobotType::Flex => FLEX_SLOTS,
    };
    let mut builder = DocumentBuilder::new(version, robot).pipette("p1", "left", "p300_single_gen2");
    for (i, is_combined) in combined.iter().enumerate() {
        let uri = if *is_combined { COMBINED_PCR } else { TIPRACK_300 };
        let id = entity(&format!("l{i}"), uri);
        builder = builder
            .labware(&id, uri, slot(slots[i]), &format!("Labware {i}"))
            .command(
                "aspirate",
                json!({"pipetteId": "p1", "labwareId": id, "wellName": "A1", "volume": 10}),
            )
            .command(
                "dropTip",
                json!({"pipetteId": "p1", "labwareId": "fixedTrash", "wellName": "A1"}),
            )
            .step(
                &format!("s{i}"),
                json!({"stepType": "mix", "pipette": "p1", "labware": id, "wells": ["A1"]}),
            )
            .deck_setup(&id, slots[i])
            .ingred(&id, json!({"A1": {"0": {"volume": 10}}}));
    }
    builder.build()
}

fn robot() -> impl Strategy<Value = RobotType> {
    prop_oneof![Just(RobotType::Ot2), Just(RobotType::Flex)]
}

fn count(doc: &ProtocolDocument, f: impl Fn(&CommandBody) -> bool) -> usize {
    doc.commands.iter().filter(|c| f(&c.body)).count()
}

proptest! {
    #[test]
    fn prop_split_conservation(
        robot in robot(),
        combined in proptest::collection::vec(any::<bool>(), 0..10)
    ) {
        let doc = generated(robot, "6.0.0", &combined);
        let before_simple = combined.iter().filter(|c| !**c).count();
        let before_combined = combined.len() - before_simple;

        let out = driver("s")
            .migrate_to(doc, SchemaVersion::new(7, 0, 0))
            .unwrap()
            .document;

        let labware = count(&out, |b| matches!(b, CommandBody::LoadLabware(_)));
        let adapters = count(&out, |b| matches!(b, CommandBody::LoadAdapter(_)));
        prop_assert_eq!(labware, before_simple + before_combined);
        prop_assert_eq!(adapters, before_combined);
    }

    #[test]
    fn prop_referential_integrity(
        robot in robot(),
        combined in proptest::collection::vec(any::<bool>(), 0..10)
    ) {
        let out = driver("r")
            .migrate(generated(robot, "6.1.0", &combined))
            .unwrap()
            .document;

        let loaded: HashSet<&EntityId> = out.loaded_ids().collect();
        for command in &out.commands {
            if let Some(target) = command.location().and_then(|l| l.referenced_entity()) {
                prop_assert!(loaded.contains(target), "dangling location {}", target);
            }
        }
        for (step, form) in &out.designer_data().saved_step_forms {
            for (field, reference) in references(form) {
                let id = reference.entity();
                prop_assert!(id.is_some(), "sentinel in {}.{}", step, field);
                prop_assert!(id.is_some_and(|id| loaded.contains(id)), "dangling {}.{}", step, field);
            }
        }
        prop_assert!(check(&out).is_empty());
    }

    #[test]
    fn prop_version_monotonicity(
        robot in robot(),
        version in prop_oneof![Just("6.0.0"), Just("6.1.0"), Just("6.2.0"), Just("6.3.1")],
        target in prop_oneof![
            Just(SchemaVersion::new(7, 0, 0)),
            Just(SchemaVersion::new(7, 1, 0)),
            Just(SchemaVersion::new(8, 0, 0)),
        ],
        combined in proptest::collection::vec(any::<bool>(), 0..4)
    ) {
        let outcome = driver("m")
            .migrate_to(generated(robot, version, &combined), target)
            .unwrap();
        prop_assert_eq!(outcome.document.declared_version(), target);
        let versions: Vec<SchemaVersion> = outcome.report.stages.iter().map(|s| s.to).collect();
        prop_assert!(versions.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(versions.last().copied(), Some(target));
    }

    #[test]
    fn prop_idempotence(
        robot in robot(),
        version in prop_oneof![Just("6.0.0"), Just("6.2.0")],
        target in prop_oneof![
            Just(SchemaVersion::new(7, 0, 0)),
            Just(SchemaVersion::new(7, 1, 0)),
            Just(SchemaVersion::new(8, 0, 0)),
        ],
        combined in proptest::collection::vec(any::<bool>(), 0..6)
    ) {
        let first = driver("i")
            .migrate_to(generated(robot, version, &combined), target)
            .unwrap()
            .document;
        let again = driver("j").migrate_to(first.clone(), target).unwrap();

        prop_assert!(again.report.is_identity());
        prop_assert_eq!(again.document, first);
    }

    #[test]
    fn prop_trash_determinism(
        robot in robot(),
        combined in proptest::collection::vec(any::<bool>(), 0..6)
    ) {
        let target = SchemaVersion::new(7, 1, 0);
        let placement = trash_placement(robot);
        let mut seen = Vec::new();

        for prefix in ["a", "b"] {
            let out = driver(prefix)
                .migrate_to(generated(robot, "6.2.0", &combined), target)
                .unwrap()
                .document;
            prop_assert!(sentinel_occurrences(&out).is_empty());

            let trash: Vec<_> = out
                .commands
                .iter()
                .filter_map(|c| match &c.body {
                    CommandBody::LoadLabware(p)
                        if p.labware_id.definition_uri().is_some_and(|u| u.as_str() == placement.definition_uri) =>
                    {
                        Some((p.location.clone(), p.labware_id.definition_uri()))
                    }
                    _ => None,
                })
                .collect();
            prop_assert_eq!(trash.len(), 1);
            seen.push(trash[0].clone());
        }
        prop_assert_eq!(&seen[0], &seen[1]);
        prop_assert_eq!(seen[0].0.to_deck_setup_value(), placement.slot);
    }
}
