// ********* Canonical schema file ***********

use crate::ingest::*;

use booth_tally::schema::{Entity, EntityKind};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: String,
    /// state, district, pc, ac or party.
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predecessors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFile {
    pub entities: Vec<EntityRecord>,
    /// Normalized name to identifiers. Recomputed on load, written for
    /// consumers of the file.
    #[serde(default)]
    pub name_index: BTreeMap<String, Vec<String>>,
}

impl EntityRecord {
    fn to_entity(&self) -> IngestResult<Entity> {
        let kind = match EntityKind::parse(&self.kind) {
            Some(k) => k,
            None => whatever!("entity {}: unknown kind {:?}", self.id, self.kind),
        };
        let mut e = Entity::new(&self.id, kind, &self.name);
        e.state = self.state.clone();
        e.sequence = self.sequence;
        e.aliases = self.aliases.clone();
        e.parent = self.parent.clone();
        e.pc = self.pc.clone();
        e.district = self.district.clone();
        e.valid_from = self.valid_from;
        e.valid_to = self.valid_to;
        e.predecessors = self.predecessors.clone();
        e.successors = self.successors.clone();
        Ok(e)
    }

    fn from_entity(e: &Entity) -> EntityRecord {
        EntityRecord {
            id: e.id.clone(),
            kind: e.kind.as_str().to_string(),
            name: e.name.clone(),
            state: e.state.clone(),
            sequence: e.sequence,
            aliases: e.aliases.clone(),
            parent: e.parent.clone(),
            pc: e.pc.clone(),
            district: e.district.clone(),
            valid_from: e.valid_from,
            valid_to: e.valid_to,
            predecessors: e.predecessors.clone(),
            successors: e.successors.clone(),
        }
    }
}

pub fn read_schema(path: &Path, thresholds: &Thresholds) -> IngestResult<SchemaIndex> {
    let p = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &p })?;
    let file: SchemaFile = serde_json::from_str(&contents).context(ParsingJsonSnafu { path: &p })?;
    let entities = file
        .entities
        .iter()
        .map(|r| r.to_entity())
        .collect::<IngestResult<Vec<Entity>>>()?;
    let index = SchemaIndex::build(entities, thresholds).context(InvalidSchemaSnafu { path: &p })?;
    if !file.name_index.is_empty() && file.name_index != index.name_index() {
        warn!(
            "read_schema: the name index of {} is stale, it was recomputed",
            p
        );
    }
    info!("read_schema: {} entities from {}", index.entities().len(), p);
    Ok(index)
}

pub fn write_schema(path: &Path, index: &SchemaIndex) -> IngestResult<()> {
    let file = SchemaFile {
        entities: index.entities().iter().map(EntityRecord::from_entity).collect(),
        name_index: index.name_index(),
    };
    let p = path.display().to_string();
    let mut js = serde_json::to_string_pretty(&file).context(SerializingJsonSnafu { what: &p })?;
    js.push('\n');
    fs::write(path, js).context(WritingOutputSnafu { path: p })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
      "entities": [
        {"id": "TS", "kind": "state", "name": "Telangana"},
        {"id": "TS-085", "kind": "ac", "name": "Achampet (SC)", "state": "TS",
         "sequence": 85, "validFrom": 2009, "aliases": ["Achampeta"]},
        {"id": "INC", "kind": "party", "name": "Indian National Congress",
         "aliases": ["INC"]}
      ]
    }"#;

    #[test]
    fn schema_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("schema.json");
        fs::write(&p, SCHEMA).unwrap();
        let index = read_schema(&p, &Thresholds::DEFAULT).unwrap();
        assert_eq!(index.entities().len(), 3);
        let ac = index.entity("TS-085").unwrap();
        assert_eq!(ac.valid_from, Some(2009));
        assert_eq!(ac.aliases, vec!["Achampeta".to_string()]);

        let out = dir.path().join("schema2.json");
        write_schema(&out, &index).unwrap();
        let written: SchemaFile =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written.name_index, index.name_index());
        let reread = read_schema(&out, &Thresholds::DEFAULT).unwrap();
        assert_eq!(reread.entities(), index.entities());
    }

    #[test]
    fn bad_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("schema.json");
        fs::write(
            &p,
            r#"{"entities": [{"id": "X", "kind": "county", "name": "X"}]}"#,
        )
        .unwrap();
        assert!(read_schema(&p, &Thresholds::DEFAULT).is_err());

        fs::write(
            &p,
            r#"{"entities": [{"id": "TS-001", "kind": "ac", "name": "A", "state": "TS"}]}"#,
        )
        .unwrap();
        let e = read_schema(&p, &Thresholds::DEFAULT).unwrap_err();
        assert!(matches!(e, IngestError::InvalidSchema { .. }));
    }
}
