//! Testing utilities for protocol migration
//!
//! Definition bodies, a fixture catalog, and document builders.

#![allow(missing_docs)]

pub mod builder;
pub mod definitions;

pub use builder::{
    entity, on_labware, on_module, slot, v6_ot2_builder, v6_ot2_document, v7_flex_builder,
    v7_flex_heater_shaker, DocumentBuilder,
};
pub use definitions::{body, fixture_catalog};
