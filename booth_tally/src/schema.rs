//! The canonical schema: jurisdictions and parties with stable identifiers,
//! and the ordered cascade that resolves free-text names against it.
//!
//! A `SchemaIndex` is immutable. New aliases produce a new index through
//! `with_aliases`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt::Display;

use log::debug;

use crate::config::Thresholds;
use crate::matcher::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum EntityKind {
    State,
    District,
    /// Parliamentary constituency.
    Pc,
    /// Assembly constituency.
    Ac,
    Party,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::State,
        EntityKind::District,
        EntityKind::Pc,
        EntityKind::Ac,
        EntityKind::Party,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::State => "state",
            EntityKind::District => "district",
            EntityKind::Pc => "pc",
            EntityKind::Ac => "ac",
            EntityKind::Party => "party",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        EntityKind::ALL.iter().find(|k| k.as_str() == s).cloned()
    }

    // States and parties are not scoped by a state.
    fn is_state_scoped(&self) -> bool {
        matches!(self, EntityKind::District | EntityKind::Pc | EntityKind::Ac)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    /// The canonical display name.
    pub name: String,
    pub state: Option<String>,
    /// The official sequence number within the state (ACs and PCs).
    pub sequence: Option<u32>,
    pub aliases: Vec<String>,
    pub parent: Option<String>,
    pub pc: Option<String>,
    pub district: Option<String>,
    /// First election year for which the entity exists.
    pub valid_from: Option<u32>,
    /// Last election year for which the entity exists.
    pub valid_to: Option<u32>,
    pub predecessors: Vec<String>,
    pub successors: Vec<String>,
}

impl Entity {
    pub fn new(id: &str, kind: EntityKind, name: &str) -> Entity {
        Entity {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            state: None,
            sequence: None,
            aliases: Vec::new(),
            parent: None,
            pc: None,
            district: None,
            valid_from: None,
            valid_to: None,
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn is_valid_for(&self, year: u32) -> bool {
        self.valid_from.map_or(true, |f| year >= f) && self.valid_to.map_or(true, |t| year <= t)
    }

    fn links(&self) -> Vec<(&'static str, &String)> {
        let mut res: Vec<(&'static str, &String)> = Vec::new();
        if let Some(p) = &self.parent {
            res.push(("parent", p));
        }
        if let Some(p) = &self.pc {
            res.push(("pc", p));
        }
        if let Some(d) = &self.district {
            res.push(("district", d));
        }
        if let Some(s) = &self.state {
            res.push(("state", s));
        }
        for p in self.predecessors.iter() {
            res.push(("predecessor", p));
        }
        for s in self.successors.iter() {
            res.push(("successor", s));
        }
        res
    }
}

/// Where a name is looked up.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Context {
    pub kind: EntityKind,
    pub state: Option<String>,
    pub year: Option<u32>,
}

impl Context {
    pub fn ac(state: Option<&str>, year: Option<u32>) -> Context {
        Context {
            kind: EntityKind::Ac,
            state: state.map(|s| s.to_string()),
            year,
        }
    }

    pub fn state(year: Option<u32>) -> Context {
        Context {
            kind: EntityKind::State,
            state: None,
            year,
        }
    }

    pub fn party(year: Option<u32>) -> Context {
        Context {
            kind: EntityKind::Party,
            state: None,
            year,
        }
    }
}

/// The step of the cascade that produced a match.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum MatchStrategy {
    CanonicalId,
    ExactName,
    Alias,
    SequenceNumber,
    Fuzzy,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::CanonicalId => "canonicalId",
            MatchStrategy::ExactName => "exactName",
            MatchStrategy::Alias => "alias",
            MatchStrategy::SequenceNumber => "sequenceNumber",
            MatchStrategy::Fuzzy => "fuzzy",
        }
    }

    /// Matches that are worth recording as new aliases.
    pub fn is_inferred(&self) -> bool {
        matches!(self, MatchStrategy::SequenceNumber | MatchStrategy::Fuzzy)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Resolution {
    pub id: String,
    pub strategy: MatchStrategy,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SchemaError {
    DuplicateId(String),
    EmptyName(String),
    UnknownLink {
        id: String,
        link: &'static str,
        target: String,
    },
}

impl Error for SchemaError {}

impl Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::DuplicateId(id) => write!(f, "entity id {} is defined twice", id),
            SchemaError::EmptyName(id) => write!(f, "entity {} has an empty name", id),
            SchemaError::UnknownLink { id, link, target } => write!(
                f,
                "entity {} has a {} link to unknown entity {}",
                id, link, target
            ),
        }
    }
}

/// A raw name seen in the inputs, with the context it was seen in.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Observation {
    pub raw_name: String,
    pub context: Context,
}

#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct DiscoveredAlias {
    pub id: String,
    pub alias: String,
    pub strategy: MatchStrategy,
}

#[derive(PartialEq, Debug, Clone, Copy)]
struct FuzzyBounds {
    min_similarity: f64,
    min_length: usize,
}

// Similarities closer than this are equal.
const SIMILARITY_EPSILON: f64 = 1e-9;

/// The read-only lookup tables built from the list of entities.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    entities: Vec<Entity>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_alias: HashMap<String, Vec<usize>>,
    by_sequence: HashMap<u32, Vec<usize>>,
    // Phonetic keys of the canonical name and of the aliases.
    keys: Vec<Vec<String>>,
    fuzzy: FuzzyBounds,
}

type Step = fn(&SchemaIndex, &str, &Context) -> Option<usize>;

/// The matchers, in priority order. The first one that gives a unique
/// entity wins.
const CASCADE: [(MatchStrategy, Step); 5] = [
    (MatchStrategy::CanonicalId, match_canonical_id),
    (MatchStrategy::ExactName, match_exact_name),
    (MatchStrategy::Alias, match_alias),
    (MatchStrategy::SequenceNumber, match_sequence_number),
    (MatchStrategy::Fuzzy, match_fuzzy),
];

impl FuzzyBounds {
    fn new(thresholds: &Thresholds) -> FuzzyBounds {
        FuzzyBounds {
            min_similarity: thresholds.fuzzy_min_similarity,
            min_length: thresholds.fuzzy_min_length,
        }
    }
}

impl SchemaIndex {
    /// Checks the entities and builds the lookup tables. The fuzzy step uses
    /// the bounds of `thresholds`.
    pub fn build(entities: Vec<Entity>, thresholds: &Thresholds) -> Result<SchemaIndex, SchemaError> {
        SchemaIndex::index_entities(entities, FuzzyBounds::new(thresholds))
    }

    fn index_entities(entities: Vec<Entity>, fuzzy: FuzzyBounds) -> Result<SchemaIndex, SchemaError> {
        let mut by_id: HashMap<String, usize> = HashMap::new();
        for (i, e) in entities.iter().enumerate() {
            if normalize_name(&e.name).is_empty() {
                return Err(SchemaError::EmptyName(e.id.clone()));
            }
            if by_id.insert(e.id.clone(), i).is_some() {
                return Err(SchemaError::DuplicateId(e.id.clone()));
            }
        }
        for e in entities.iter() {
            for (link, target) in e.links() {
                if !by_id.contains_key(target) {
                    return Err(SchemaError::UnknownLink {
                        id: e.id.clone(),
                        link,
                        target: target.clone(),
                    });
                }
            }
        }

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_alias: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_sequence: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut keys: Vec<Vec<String>> = Vec::new();
        for (i, e) in entities.iter().enumerate() {
            let name = normalize_name(&e.name);
            let mut entity_keys = vec![phonetic_key(&name)];
            by_name.entry(name).or_insert_with(Vec::new).push(i);
            for a in e.aliases.iter() {
                let alias = normalize_name(a);
                if alias.is_empty() {
                    continue;
                }
                entity_keys.push(phonetic_key(&alias));
                let slot = by_alias.entry(alias).or_insert_with(Vec::new);
                if !slot.contains(&i) {
                    slot.push(i);
                }
            }
            if let Some(seq) = e.sequence {
                by_sequence.entry(seq).or_insert_with(Vec::new).push(i);
            }
            keys.push(entity_keys);
        }
        debug!(
            "SchemaIndex::build: {} entities, {} names, {} aliases",
            entities.len(),
            by_name.len(),
            by_alias.len()
        );
        Ok(SchemaIndex {
            entities,
            by_id,
            by_name,
            by_alias,
            by_sequence,
            keys,
            fuzzy,
        })
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.by_id.get(id).map(|i| &self.entities[*i])
    }

    /// Resolves a free-text name to a canonical identifier.
    pub fn resolve(&self, name: &str, ctx: &Context) -> Option<Resolution> {
        for (strategy, step) in CASCADE.iter() {
            if let Some(idx) = step(self, name, ctx) {
                let id = self.entities[idx].id.clone();
                debug!("resolve: {:?} -> {} ({:?})", name, id, strategy);
                return Some(Resolution {
                    id,
                    strategy: *strategy,
                });
            }
        }
        debug!("resolve: no match for {:?} in {:?}", name, ctx);
        None
    }

    /// The aliases that the inferred steps of the cascade would add.
    ///
    /// Only matches through a sequence number or a fuzzy match are
    /// recorded: the other steps already use the schema as it is.
    pub fn discover_aliases(&self, observations: &[Observation]) -> Vec<DiscoveredAlias> {
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut res: Vec<DiscoveredAlias> = Vec::new();
        for o in observations.iter() {
            let raw = o.raw_name.trim();
            if raw.is_empty() {
                continue;
            }
            if let Some(r) = self.resolve(raw, &o.context) {
                if !r.strategy.is_inferred() {
                    continue;
                }
                if seen.insert((r.id.clone(), normalize_name(raw))) {
                    res.push(DiscoveredAlias {
                        id: r.id,
                        alias: raw.to_string(),
                        strategy: r.strategy,
                    });
                }
            }
        }
        res.sort();
        res
    }

    /// A new index with the given aliases added to their entities.
    pub fn with_aliases(&self, aliases: &[DiscoveredAlias]) -> Result<SchemaIndex, SchemaError> {
        let mut entities = self.entities.clone();
        for a in aliases.iter() {
            if let Some(i) = self.by_id.get(&a.id) {
                let e = &mut entities[*i];
                let norm = normalize_name(&a.alias);
                let known = normalize_name(&e.name) == norm
                    || e.aliases.iter().any(|x| normalize_name(x) == norm);
                if !known {
                    e.aliases.push(a.alias.clone());
                }
            }
        }
        SchemaIndex::index_entities(entities, self.fuzzy)
    }

    /// Every normalized name and alias with the identifiers it points to.
    pub fn name_index(&self) -> BTreeMap<String, Vec<String>> {
        let mut res: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, idxs) in self.by_name.iter().chain(self.by_alias.iter()) {
            let ids = res.entry(name.clone()).or_insert_with(Vec::new);
            for i in idxs.iter() {
                let id = &self.entities[*i].id;
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
            ids.sort();
        }
        res
    }

    fn in_scope(&self, e: &Entity, ctx: &Context) -> bool {
        if e.kind != ctx.kind {
            return false;
        }
        match (&ctx.state, e.kind.is_state_scoped()) {
            (Some(s), true) => e.state.as_deref() == Some(s.as_str()),
            _ => true,
        }
    }

    /// Narrows candidates to the context and returns the only one left.
    ///
    /// When the candidates do not exist in the requested year, the renames
    /// and boundary changes are followed to the entity that does.
    fn pick(&self, candidates: &[usize], ctx: &Context) -> Option<usize> {
        let scoped: Vec<usize> = candidates
            .iter()
            .cloned()
            .filter(|i| self.in_scope(&self.entities[*i], ctx))
            .collect();
        let year = match ctx.year {
            Some(y) => y,
            None => return unique(&scoped),
        };
        let valid: Vec<usize> = scoped
            .iter()
            .cloned()
            .filter(|i| self.entities[*i].is_valid_for(year))
            .collect();
        if !valid.is_empty() {
            return unique(&valid);
        }
        let mut linked: BTreeSet<usize> = BTreeSet::new();
        for i in scoped.iter() {
            let e = &self.entities[*i];
            let links = if e.valid_to.map_or(false, |t| year > t) {
                &e.successors
            } else {
                &e.predecessors
            };
            for l in links.iter() {
                if let Some(j) = self.by_id.get(l) {
                    let target = &self.entities[*j];
                    if self.in_scope(target, ctx) && target.is_valid_for(year) {
                        linked.insert(*j);
                    }
                }
            }
        }
        let linked: Vec<usize> = linked.into_iter().collect();
        unique(&linked)
    }
}

fn unique(idxs: &[usize]) -> Option<usize> {
    match idxs {
        [i] => Some(*i),
        _ => None,
    }
}

fn match_canonical_id(index: &SchemaIndex, name: &str, ctx: &Context) -> Option<usize> {
    let trimmed = name.trim();
    let i = index
        .by_id
        .get(trimmed)
        .or_else(|| index.by_id.get(&trimmed.to_uppercase()))?;
    index.pick(&[*i], ctx)
}

fn match_exact_name(index: &SchemaIndex, name: &str, ctx: &Context) -> Option<usize> {
    let idxs = index.by_name.get(&normalize_name(name))?;
    index.pick(idxs, ctx)
}

fn match_alias(index: &SchemaIndex, name: &str, ctx: &Context) -> Option<usize> {
    let idxs = index.by_alias.get(&normalize_name(name))?;
    index.pick(idxs, ctx)
}

fn match_sequence_number(index: &SchemaIndex, name: &str, ctx: &Context) -> Option<usize> {
    let (seq, _) = split_sequence_number(name)?;
    let idxs = index.by_sequence.get(&seq)?;
    index.pick(idxs, ctx)
}

fn match_fuzzy(index: &SchemaIndex, name: &str, ctx: &Context) -> Option<usize> {
    let normalized = normalize_name(name);
    let stripped = match split_sequence_number(&normalized) {
        Some((_, rest)) => rest,
        None => normalized,
    };
    if significant_len(&stripped) < index.fuzzy.min_length {
        return None;
    }
    let query = phonetic_key(&stripped);

    // (entity, jaccard, bigram)
    let mut best: Option<(usize, f64, f64)> = None;
    let mut tied = false;
    for (i, e) in index.entities.iter().enumerate() {
        if !index.in_scope(e, ctx) {
            continue;
        }
        if let Some(y) = ctx.year {
            if !e.is_valid_for(y) {
                continue;
            }
        }
        let mut jac = 0.0f64;
        let mut bi = 0.0f64;
        for k in index.keys[i].iter() {
            jac = jac.max(jaccard(k, &query));
            bi = bi.max(bigram_similarity(k, &query));
        }
        match best {
            None => {
                best = Some((i, jac, bi));
                tied = false;
            }
            Some((_, bj, bb)) => {
                if jac > bj + SIMILARITY_EPSILON
                    || ((jac - bj).abs() <= SIMILARITY_EPSILON && bi > bb + SIMILARITY_EPSILON)
                {
                    best = Some((i, jac, bi));
                    tied = false;
                } else if (jac - bj).abs() <= SIMILARITY_EPSILON
                    && (bi - bb).abs() <= SIMILARITY_EPSILON
                {
                    tied = true;
                }
            }
        }
    }
    match best {
        Some((i, jac, _)) if jac >= index.fuzzy.min_similarity => {
            if tied {
                debug!("match_fuzzy: {:?} is ambiguous at {:.3}", name, jac);
                None
            } else {
                Some(i)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ac(id: &str, state: &str, seq: u32, name: &str) -> Entity {
        let mut e = Entity::new(id, EntityKind::Ac, name);
        e.state = Some(state.to_string());
        e.sequence = Some(seq);
        e
    }

    fn schema() -> SchemaIndex {
        schema_with(&Thresholds::DEFAULT)
    }

    fn schema_with(thresholds: &Thresholds) -> SchemaIndex {
        let mut kothagudem = ac("TS-070", "TS", 70, "Kothagudem");
        kothagudem.aliases.push("Kothagudam".to_string());
        let mut bjp = Entity::new("BJP", EntityKind::Party, "Bharatiya Janata Party");
        bjp.aliases.push("B.J.P.".to_string());
        SchemaIndex::build(
            vec![
                Entity::new("TS", EntityKind::State, "Telangana"),
                Entity::new("AP", EntityKind::State, "Andhra Pradesh"),
                ac("TS-085", "TS", 85, "Achampet (SC)"),
                ac("TS-099", "TS", 99, "Achampeta"),
                ac("TS-086", "TS", 86, "Nagarkurnool"),
                ac("TS-045", "TS", 45, "Sivaji Nagar"),
                kothagudem,
                ac("AP-085", "AP", 85, "Achanta"),
                bjp,
            ],
            thresholds,
        )
        .unwrap()
    }

    fn ts() -> Context {
        Context::ac(Some("TS"), None)
    }

    fn resolve(index: &SchemaIndex, name: &str, ctx: &Context) -> Option<(String, MatchStrategy)> {
        index.resolve(name, ctx).map(|r| (r.id, r.strategy))
    }

    #[test]
    fn cascade_steps() {
        let s = schema();
        assert_eq!(
            resolve(&s, "TS-085", &ts()),
            Some(("TS-085".to_string(), MatchStrategy::CanonicalId))
        );
        assert_eq!(
            resolve(&s, "achampet", &ts()),
            Some(("TS-085".to_string(), MatchStrategy::ExactName))
        );
        assert_eq!(
            resolve(&s, "KOTHAGUDAM", &ts()),
            Some(("TS-070".to_string(), MatchStrategy::Alias))
        );
        assert_eq!(
            resolve(&s, "86 - Nagar Kurnul", &ts()),
            Some(("TS-086".to_string(), MatchStrategy::SequenceNumber))
        );
        assert_eq!(
            resolve(&s, "Shivaji Nagar", &ts()),
            Some(("TS-045".to_string(), MatchStrategy::Fuzzy))
        );
        assert_eq!(
            resolve(&s, "b.j.p", &Context::party(None)),
            Some(("BJP".to_string(), MatchStrategy::Alias))
        );
        assert_eq!(resolve(&s, "Hyderabad", &ts()), None);
    }

    #[test]
    fn exact_name_wins_over_fuzzy() {
        // Both entities have the same phonetic key.
        let s = schema();
        assert_eq!(
            resolve(&s, "Achampeta", &ts()),
            Some(("TS-099".to_string(), MatchStrategy::ExactName))
        );
    }

    #[test]
    fn ambiguity_falls_through() {
        let s = schema();
        // Sequence 85 exists in two states, and the fuzzy step ties.
        assert_eq!(resolve(&s, "85 - Achampetta", &Context::ac(None, None)), None);
        assert_eq!(
            resolve(&s, "85 - Achampetta", &ts()),
            Some(("TS-085".to_string(), MatchStrategy::SequenceNumber))
        );
    }

    #[test]
    fn context_filters_kind_and_state() {
        let s = schema();
        assert_eq!(
            resolve(&s, "Achanta", &Context::ac(Some("AP"), None)),
            Some(("AP-085".to_string(), MatchStrategy::ExactName))
        );
        assert_eq!(resolve(&s, "Achanta", &ts()), None);
        assert_eq!(resolve(&s, "Telangana", &ts()), None);
        assert_eq!(
            resolve(&s, "telangana", &Context::state(None)),
            Some(("TS".to_string(), MatchStrategy::ExactName))
        );
    }

    #[test]
    fn boundary_changes_follow_successors() {
        let mut old = ac("HY-001", "HY", 1, "Hyderabad West");
        old.valid_to = Some(2004);
        old.successors.push("HY-010".to_string());
        let mut new = ac("HY-010", "HY", 10, "Khairatabad");
        new.valid_from = Some(2009);
        new.predecessors.push("HY-001".to_string());
        let s = SchemaIndex::build(
            vec![Entity::new("HY", EntityKind::State, "Hyderabad"), old, new],
            &Thresholds::DEFAULT,
        )
            .unwrap();
        let in_year = |y| Context::ac(Some("HY"), Some(y));
        assert_eq!(
            resolve(&s, "Hyderabad West", &in_year(2004)).map(|r| r.0),
            Some("HY-001".to_string())
        );
        assert_eq!(
            resolve(&s, "Hyderabad West", &in_year(2014)).map(|r| r.0),
            Some("HY-010".to_string())
        );
        assert!(!s.entity("HY-001").unwrap().is_valid_for(2014));
    }

    #[test]
    fn alias_discovery_produces_new_snapshot() {
        let s = schema();
        let obs: Vec<Observation> = ["Shivaji Nagar", "86 - Nagar Kurnul", "Achampet", "Shivaji Nagar"]
            .iter()
            .map(|n| Observation {
                raw_name: n.to_string(),
                context: ts(),
            })
            .collect();
        let found = s.discover_aliases(&obs);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "TS-045");
        assert_eq!(found[1].strategy, MatchStrategy::SequenceNumber);

        let s2 = s.with_aliases(&found).unwrap();
        assert_eq!(
            resolve(&s2, "Shivaji Nagar", &ts()),
            Some(("TS-045".to_string(), MatchStrategy::Alias))
        );
        // The original snapshot is unchanged.
        assert_eq!(
            resolve(&s, "Shivaji Nagar", &ts()),
            Some(("TS-045".to_string(), MatchStrategy::Fuzzy))
        );
        assert_eq!(
            s2.name_index().get("SHIVAJI NAGAR"),
            Some(&vec!["TS-045".to_string()])
        );
    }

    #[test]
    fn fuzzy_bounds_come_from_thresholds() {
        assert_eq!(
            resolve(&schema(), "Shivaji Nagar", &ts()),
            Some(("TS-045".to_string(), MatchStrategy::Fuzzy))
        );
        let strict = Thresholds {
            fuzzy_min_similarity: 1.01,
            ..Thresholds::DEFAULT
        };
        let s = schema_with(&strict);
        assert_eq!(resolve(&s, "Shivaji Nagar", &ts()), None);
        // Snapshots with new aliases keep the bounds.
        let s2 = s.with_aliases(&[]).unwrap();
        assert_eq!(resolve(&s2, "Shivaji Nagar", &ts()), None);
    }

    #[test]
    fn invalid_schemas() {
        let dup = vec![
            Entity::new("X", EntityKind::State, "X"),
            Entity::new("X", EntityKind::State, "Y"),
        ];
        assert_eq!(
            SchemaIndex::build(dup, &Thresholds::DEFAULT).unwrap_err(),
            SchemaError::DuplicateId("X".to_string())
        );
        let mut orphan = ac("TS-001", "TS", 1, "Sirpur");
        orphan.pc = Some("TS-PC-01".to_string());
        assert!(matches!(
            SchemaIndex::build(
                vec![Entity::new("TS", EntityKind::State, "Telangana"), orphan],
                &Thresholds::DEFAULT
            ),
            Err(SchemaError::UnknownLink { .. })
        ));
    }
}
