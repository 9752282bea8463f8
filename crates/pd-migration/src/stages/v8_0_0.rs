//! 7.1.0 → 8.0.0

use crate::assembler::{DocumentAssembler, SchemaTags};
use crate::error::MigrationError;
use crate::migrator::{MigrationContext, Migrator};
use crate::validate::sentinel_occurrences;
use pd_schema::{ProtocolDocument, SchemaVersion};
use serde_json::Value;

const FROM: SchemaVersion = SchemaVersion::new(7, 1, 0);
const TO: SchemaVersion = SchemaVersion::new(8, 0, 0);

/// Stage `8.0.0`: schema 8 tags; the trash must already be explicit
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaEightTags;

impl Migrator for SchemaEightTags {
    fn name(&self) -> &'static str {
        "8.0.0"
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
        _ctx: &mut MigrationContext<'_>,
    ) -> Result<ProtocolDocument, MigrationError> {
        let leftovers = sentinel_occurrences(&doc);
        if !leftovers.is_empty() {
            return Err(MigrationError::InvariantViolation(leftovers));
        }

        doc.extra
            .entry("commandAnnotations".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        Ok(DocumentAssembler::new(doc)
            .with_version(TO)
            .with_schema_tags(SchemaTags::V8)
            .assemble())
    }
}
