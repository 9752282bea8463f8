//! Combined adapter+labware definitions and their halves
//!
//! Before schema 7 a few adapter/labware pairs shipped as one definition.
//! The set is closed; nothing outside this table is treated as combined.

use pd_schema::DefinitionUri;

/// Adapter and labware halves of a combined definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SplitPair {
    /// Adapter definition
    pub adapter: DefinitionUri,
    /// Labware that sits on the adapter
    pub labware: DefinitionUri,
}

impl SplitPair {
    /// Create new split pair
    #[inline]
    #[must_use]
    pub fn new(adapter: DefinitionUri, labware: DefinitionUri) -> Self {
        Self { adapter, labware }
    }
}

const NAMESPACE: &str = "opentrons";

/// `(combined, adapter, labware)` as `(loadName, version)`
const BUILTIN: &[((&str, u32), (&str, u32), (&str, u32))] = &[
    (
        ("opentrons_96_aluminumblock_biorad_wellplate_200ul", 1),
        ("opentrons_96_well_aluminum_block", 1),
        ("biorad_96_wellplate_200ul_pcr", 2),
    ),
    (
        ("opentrons_96_aluminumblock_nest_wellplate_100ul", 1),
        ("opentrons_96_well_aluminum_block", 1),
        ("nest_96_wellplate_100ul_pcr_full_skirt", 2),
    ),
    (
        ("opentrons_96_deep_well_adapter_nest_wellplate_2ml_deep", 1),
        ("opentrons_96_deep_well_adapter", 1),
        ("nest_96_wellplate_2ml_deep", 2),
    ),
    (
        ("opentrons_96_flat_bottom_adapter_nest_wellplate_200ul_flat", 1),
        ("opentrons_96_flat_bottom_adapter", 1),
        ("nest_96_wellplate_200ul_flat", 2),
    ),
    (
        ("opentrons_96_pcr_adapter_nest_wellplate_100ul_pcr_full_skirt", 1),
        ("opentrons_96_pcr_adapter", 1),
        ("nest_96_wellplate_100ul_pcr_full_skirt", 2),
    ),
    (
        ("opentrons_universal_flat_adapter_corning_384_wellplate_112ul_flat", 1),
        ("opentrons_universal_flat_adapter", 1),
        ("corning_384_wellplate_112ul_flat", 2),
    ),
];

/// Built-in combined definitions
pub fn builtin_splits() -> impl Iterator<Item = (DefinitionUri, SplitPair)> {
    let uri = |(name, version): (&str, u32)| DefinitionUri::from_parts(NAMESPACE, name, version);
    BUILTIN.iter().map(move |&(combined, adapter, labware)| {
        (uri(combined), SplitPair::new(uri(adapter), uri(labware)))
    })
}
