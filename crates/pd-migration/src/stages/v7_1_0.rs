//! 7.0.0 → 7.1.0
//!
//! The fixed trash stops being an implicit fixture and becomes a labware
//! with its own `loadLabware` command. Every reference to the sentinel is
//! renamed to the trash entity, and tip-dropping steps get an explicit
//! drop-tip location.

use super::{embedded_catalog, labware_params, loaded_uri, resolve};
use crate::assembler::DocumentAssembler;
use crate::error::MigrationError;
use crate::identity::{rewrite_references, IdMinter, RenameMap};
use crate::migrator::{MigrationContext, Migrator};
use pd_catalog::{LabwareDefinition, LayeredCatalog};
use pd_schema::step_form::{self, DROP_TIP_LOCATION, TIP_DROPPING_STEP_TYPES};
use pd_schema::{
    Command, CommandBody, DesignerData, EntityId, EntityRef, LoadLabwareParams,
    LocationReference, ProtocolDocument, RobotType, SchemaVersion, FIXED_TRASH_SENTINEL,
};
use serde_json::Value;

const FROM: SchemaVersion = SchemaVersion::new(7, 0, 0);
const TO: SchemaVersion = SchemaVersion::new(7, 1, 0);

/// Where the fixed trash lives for a robot type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrashPlacement {
    /// Deck slot
    pub slot: &'static str,
    /// Trash labware definition
    pub definition_uri: &'static str,
}

/// Trash slot and definition for `robot`
#[must_use]
pub fn trash_placement(robot: RobotType) -> TrashPlacement {
    match robot {
        RobotType::Ot2 => TrashPlacement {
            slot: "12",
            definition_uri: "opentrons/opentrons_1_trash_1100ml_fixed/1",
        },
        RobotType::Flex => TrashPlacement {
            slot: "A3",
            definition_uri: "opentrons/opentrons_1_trash_3200ml_fixed/1",
        },
    }
}

/// Stage `7.1.0`
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedTrashPromotion;

impl Migrator for FixedTrashPromotion {
    fn name(&self) -> &'static str {
        "7.1.0"
    }

    fn from_version(&self) -> SchemaVersion {
        FROM
    }

    fn to_version(&self) -> SchemaVersion {
        TO
    }

    fn migrate(
        &self,
        mut doc: ProtocolDocument,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<ProtocolDocument, MigrationError> {
        let placement = trash_placement(doc.robot.model);
        let embedded = embedded_catalog(&doc);
        let catalog = LayeredCatalog::new(ctx.catalog, &embedded);
        let def = resolve(&catalog, placement.definition_uri, FIXED_TRASH_SENTINEL)?;
        ctx.minter.reserve_document(&doc);

        let mut renames = RenameMap::new();
        let slot = LocationReference::slot(placement.slot);
        let trash_id = place_trash(&mut doc, slot, def, &mut *ctx.minter, &mut renames);
        doc.labware_definitions
            .entry(def.uri.to_string())
            .or_insert_with(|| def.body.clone());

        renames.insert(EntityRef::FixedTrash, trash_id.clone());
        let mut doc = rewrite_references(doc, &renames);

        let mut data = std::mem::take(&mut doc.designer_application.data);
        let explicit = make_drop_tip_explicit(&mut data, &trash_id);
        tracing::debug!("Set explicit drop-tip location on {} step(s)", explicit);

        Ok(DocumentAssembler::new(doc)
            .with_designer_data(data)
            .with_version(TO)
            .assemble())
    }
}

/// Settle the one `loadLabware` that is the trash and return its id
///
/// A load of `def` already in `slot` is kept as is. Otherwise the first load
/// that sits in `slot` or carries the sentinel id is rewritten in place to
/// `def`, and a new load is appended only when there is none. Any further
/// occupant is dropped and its id renamed to the trash.
fn place_trash(
    doc: &mut ProtocolDocument,
    slot: LocationReference,
    def: &LabwareDefinition,
    minter: &mut IdMinter,
    renames: &mut RenameMap,
) -> EntityId {
    let occupies = |p: &LoadLabwareParams| {
        p.location == slot || p.labware_id.as_str() == FIXED_TRASH_SENTINEL
    };
    let reusable = doc.commands.iter().find_map(|c| match &c.body {
        CommandBody::LoadLabware(p)
            if p.location == slot
                && p.labware_id.as_str() != FIXED_TRASH_SENTINEL
                && loaded_uri(p).as_ref() == Some(&def.uri) =>
        {
            Some(p.labware_id.clone())
        }
        _ => None,
    });
    let trash_id = match reusable {
        Some(ref id) => {
            tracing::info!("Reusing loaded trash: {}", id);
            id.clone()
        }
        None => minter.mint_entity(&def.uri),
    };

    let mut placed = reusable.is_some();
    let mut replaced = Vec::new();
    let mut commands = Vec::with_capacity(doc.commands.len() + 1);
    for Command { key, body } in std::mem::take(&mut doc.commands) {
        match body {
            CommandBody::LoadLabware(p) if occupies(&p) && p.labware_id != trash_id => {
                if p.labware_id.as_str() != FIXED_TRASH_SENTINEL {
                    renames.insert(p.labware_id.clone(), trash_id.clone());
                }
                replaced.extend(loaded_uri(&p));
                if placed {
                    tracing::info!("Dropping second trash load {}", p.labware_id);
                    continue;
                }
                tracing::info!("Rewriting {} in place as trash {}", p.labware_id, trash_id);
                let mut params = labware_params(trash_id.clone(), slot.clone(), def, None);
                params.extra = p.extra;
                commands.push(Command {
                    key,
                    body: CommandBody::LoadLabware(params),
                });
                placed = true;
            }
            body => commands.push(Command { key, body }),
        }
    }

    if !placed {
        tracing::info!("Adding trash {} in {}", trash_id, slot.to_deck_setup_value());
        commands.push(Command::new(
            minter.mint_key(),
            CommandBody::LoadLabware(labware_params(trash_id.clone(), slot, def, None)),
        ));
    }
    doc.commands = commands;

    for uri in replaced.into_iter().filter(|u| *u != def.uri) {
        let still_loaded = doc.commands.iter().any(|c| {
            matches!(&c.body, CommandBody::LoadLabware(p) if loaded_uri(p).as_ref() == Some(&uri))
        });
        if !still_loaded {
            doc.labware_definitions.shift_remove(uri.as_str());
        }
    }
    trash_id
}

/// Point tip-dropping steps without a drop-tip location at the trash
fn make_drop_tip_explicit(data: &mut DesignerData, trash_id: &EntityId) -> usize {
    let mut count = 0;
    for form in data.saved_step_forms.values_mut() {
        let drops_tips = step_form::step_type(form)
            .is_some_and(|t| TIP_DROPPING_STEP_TYPES.contains(&t));
        let missing = form.get(DROP_TIP_LOCATION).map_or(true, Value::is_null);
        if drops_tips && missing {
            form.insert(
                DROP_TIP_LOCATION.to_string(),
                Value::String(trash_id.to_string()),
            );
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdMinter, SequentialIdSource};
    use pd_catalog::InMemoryCatalog;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        for (name, display) in [
            ("opentrons_1_trash_1100ml_fixed", "Opentrons Fixed Trash"),
            ("opentrons_1_trash_3200ml_fixed", "Opentrons Fixed Trash"),
        ] {
            catalog
                .insert_value(json!({
                    "namespace": "opentrons",
                    "version": 1,
                    "parameters": {"loadName": name},
                    "metadata": {"displayName": display},
                    "wells": {"A1": {"depth": 0, "totalLiquidVolume": 1_100_000, "shape": "rectangular", "xDimension": 172.86, "yDimension": 165.86}}
                }))
                .unwrap();
        }
        catalog
    }

    fn v7(robot: &str, extra_commands: Value) -> ProtocolDocument {
        let mut commands = vec![
            json!({"key": "c1", "commandType": "loadPipette", "params": {"pipetteId": "p1", "mount": "left", "pipetteName": "p300_single_gen2"}}),
            json!({"key": "c2", "commandType": "dropTip", "params": {"pipetteId": "p1", "labwareId": "fixedTrash", "wellName": "A1"}}),
        ];
        commands.extend(extra_commands.as_array().cloned().unwrap_or_default());
        serde_json::from_value(json!({
            "schemaVersion": 7,
            "designerApplication": {
                "name": "opentrons/protocol-designer",
                "version": "7.0.0",
                "data": {
                    "savedStepForms": {
                        "__INITIAL_DECK_SETUP_STEP__": {
                            "stepType": "manualIntervention",
                            "labwareLocationUpdate": {"fixedTrash": "12"}
                        },
                        "s1": {"stepType": "moveLiquid", "pipette": "p1", "dropTip_location": "fixedTrash", "blowout_location": "fixedTrash"},
                        "s2": {"stepType": "mix", "pipette": "p1"},
                        "s3": {"stepType": "pause"}
                    },
                    "orderedStepIds": ["s1", "s2", "s3"]
                }
            },
            "robot": {"model": robot},
            "commands": commands
        }))
        .unwrap()
    }

    fn run(doc: ProtocolDocument) -> ProtocolDocument {
        let catalog = catalog();
        let mut minter = IdMinter::new(Box::new(SequentialIdSource::new("trash")));
        let mut ctx = MigrationContext::new(&catalog, &mut minter);
        FixedTrashPromotion.migrate(doc, &mut ctx).unwrap()
    }

    fn trash_loads(doc: &ProtocolDocument) -> Vec<(&EntityId, &LocationReference)> {
        doc.commands
            .iter()
            .filter_map(|c| match &c.body {
                CommandBody::LoadLabware(p)
                    if p.load_name.as_deref().is_some_and(|n| n.contains("trash")) =>
                {
                    Some((&p.labware_id, &p.location))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn placement_is_a_function_of_robot() {
        assert_eq!(trash_placement(RobotType::Ot2).slot, "12");
        assert_eq!(trash_placement(RobotType::Flex).slot, "A3");
        assert_eq!(trash_placement(RobotType::Flex), trash_placement(RobotType::Flex));
    }

    #[test]
    fn promotes_trash_on_ot2() {
        let out = run(v7("OT-2 Standard", json!([])));
        let trash = "trash-1:opentrons/opentrons_1_trash_1100ml_fixed/1";

        assert_eq!(
            trash_loads(&out),
            vec![(&EntityId::new(trash), &LocationReference::slot("12"))]
        );

        let forms = &out.designer_data().saved_step_forms;
        assert_eq!(forms["s1"]["dropTip_location"], json!(trash));
        assert_eq!(forms["s1"]["blowout_location"], json!(trash));
        assert_eq!(forms["s2"]["dropTip_location"], json!(trash));
        assert!(forms["s3"].get("dropTip_location").is_none());
        assert_eq!(
            forms["__INITIAL_DECK_SETUP_STEP__"]["labwareLocationUpdate"],
            json!({(trash): "12"})
        );

        let drop = out.commands.iter().find(|c| c.key.as_deref() == Some("c2")).unwrap();
        assert_eq!(drop.operation_params().unwrap()["labwareId"], json!(trash));
        assert!(out
            .labware_definitions
            .contains_key("opentrons/opentrons_1_trash_1100ml_fixed/1"));
        assert_eq!(out.declared_version(), TO);
    }

    #[test]
    fn flex_trash_goes_to_a3() {
        let out = run(v7("OT-3 Standard", json!([])));
        let loads = trash_loads(&out);
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].1, &LocationReference::slot("A3"));
        assert!(loads[0].0.as_str().ends_with("opentrons_1_trash_3200ml_fixed/1"));
    }

    #[test]
    fn reuses_trash_already_loaded_in_place() {
        let existing = "old:opentrons/opentrons_1_trash_1100ml_fixed/1";
        let out = run(v7(
            "OT-2 Standard",
            json!([{"key": "c3", "commandType": "loadLabware", "params": {"labwareId": existing, "location": {"slotName": "12"}}}]),
        ));
        assert_eq!(trash_loads(&out).len(), 0, "no descriptive fields on the reused load");
        let loads: Vec<_> = out.loaded_ids().map(EntityId::as_str).collect();
        assert_eq!(loads, vec!["p1", existing]);
        assert_eq!(
            out.designer_data().saved_step_forms["s1"]["dropTip_location"],
            json!(existing)
        );
    }

    #[test]
    fn renames_trash_loaded_under_sentinel_id() {
        let out = run(v7(
            "OT-2 Standard",
            json!([{"key": "c3", "commandType": "loadLabware", "params": {
                "labwareId": "fixedTrash",
                "location": {"slotName": "12"},
                "loadName": "opentrons_1_trash_1100ml_fixed",
                "namespace": "opentrons",
                "version": 1
            }}]),
        ));
        let loads = trash_loads(&out);
        assert_eq!(loads.len(), 1);
        assert_ne!(loads[0].0.as_str(), FIXED_TRASH_SENTINEL);
        let encoded = serde_json::to_string(&out).unwrap();
        assert!(!encoded.contains("\"fixedTrash\""));
    }

    #[test]
    fn sentinel_load_of_another_trash_is_rewritten_in_place() {
        let short_trash = "opentrons/opentrons_1_trash_850ml_fixed/1";
        let mut doc = v7(
            "OT-2 Standard",
            json!([{"key": "c3", "commandType": "loadLabware", "params": {
                "labwareId": "fixedTrash",
                "location": {"slotName": "12"},
                "loadName": "opentrons_1_trash_850ml_fixed",
                "namespace": "opentrons",
                "version": 1
            }}]),
        );
        doc.labware_definitions.insert(
            short_trash.into(),
            json!({"parameters": {"loadName": "opentrons_1_trash_850ml_fixed"}}),
        );

        let out = run(doc);
        let trash = "trash-1:opentrons/opentrons_1_trash_1100ml_fixed/1";
        assert_eq!(
            trash_loads(&out),
            vec![(&EntityId::new(trash), &LocationReference::slot("12"))]
        );
        let rewritten = out.commands.iter().find(|c| c.key.as_deref() == Some("c3")).unwrap();
        assert_eq!(rewritten.loaded_entity().map(|(id, _)| id.as_str()), Some(trash));
        assert!(!out.labware_definitions.contains_key(short_trash));
        assert!(crate::validate::check(&out).is_empty());
    }

    #[test]
    fn other_trash_in_the_slot_is_folded_into_one() {
        let short_trash = "old:opentrons/opentrons_1_trash_850ml_fixed/1";
        let out = run(v7(
            "OT-2 Standard",
            json!([
                {"key": "c3", "commandType": "loadLabware", "params": {"labwareId": short_trash, "location": {"slotName": "12"}}},
                {"key": "c4", "commandType": "loadLabware", "params": {"labwareId": "fixedTrash", "location": {"slotName": "12"}}},
                {"key": "c5", "commandType": "dropTip", "params": {"pipetteId": "p1", "labwareId": short_trash, "wellName": "A1"}}
            ]),
        ));
        let trash = "trash-1:opentrons/opentrons_1_trash_1100ml_fixed/1";
        let loads: Vec<_> = out.loaded_ids().map(EntityId::as_str).collect();
        assert_eq!(loads, vec!["p1", trash]);
        let drop = out.commands.iter().find(|c| c.key.as_deref() == Some("c5")).unwrap();
        assert_eq!(drop.operation_params().unwrap()["labwareId"], json!(trash));
        assert!(crate::validate::check(&out).is_empty());
    }

    #[test]
    fn missing_trash_definition_is_fatal() {
        let empty = InMemoryCatalog::new();
        let mut minter = IdMinter::new(Box::new(SequentialIdSource::new("t")));
        let mut ctx = MigrationContext::new(&empty, &mut minter);
        let err = FixedTrashPromotion
            .migrate(v7("OT-2 Standard", json!([])), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, MigrationError::UnresolvableDefinition { .. }));
    }
}
