pub use crate::config::*;

/// A builder for the authoritative reference of one constituency.
///
/// The readers of reference files go through the builder, so that every
/// reference reaching the pipeline has been checked.
///
/// ```
/// use booth_tally::builder::ReferenceBuilder;
/// # use booth_tally::ReferenceError;
///
/// let reference = ReferenceBuilder::new()
///     .candidate("Anna", "ABC", 5230)?
///     .candidate("Bob", "XYZ", 4120)?
///     .nota(87)
///     .expected_booths(212)
///     .build()?;
/// assert_eq!(reference.official_valid(), 9350);
///
/// # Ok::<(), ReferenceError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReferenceBuilder {
    _reference: Reference,
}

impl ReferenceBuilder {
    pub fn new() -> ReferenceBuilder {
        ReferenceBuilder::default()
    }

    /// Adds the next candidate, in official order.
    ///
    /// A candidate is identified by its name and party: the same name under
    /// two parties is two candidates.
    pub fn candidate(
        mut self,
        name: &str,
        party: &str,
        official_votes: u64,
    ) -> Result<ReferenceBuilder, ReferenceError> {
        let name = name.trim();
        let party = party.trim();
        if name.is_empty() {
            return Err(ReferenceError::EmptyCandidateName {
                position: self._reference.candidates.len() + 1,
            });
        }
        if self
            ._reference
            .candidates
            .iter()
            .any(|c| c.name == name && c.party == party)
        {
            return Err(ReferenceError::DuplicateCandidate {
                name: name.to_string(),
                party: party.to_string(),
            });
        }
        self._reference.candidates.push(ReferenceCandidate {
            name: name.to_string(),
            party: party.to_string(),
            official_votes,
        });
        Ok(self)
    }

    pub fn nota(mut self, votes: u64) -> ReferenceBuilder {
        self._reference.official_nota = Some(votes);
        self
    }

    pub fn rejected(mut self, votes: u64) -> ReferenceBuilder {
        self._reference.official_rejected = Some(votes);
        self
    }

    pub fn expected_booths(mut self, booths: u32) -> ReferenceBuilder {
        self._reference.expected_booths = Some(booths);
        self
    }

    pub fn electors(mut self, electors: u64) -> ReferenceBuilder {
        self._reference.electors = Some(electors);
        self
    }

    pub fn build(self) -> Result<Reference, ReferenceError> {
        if self._reference.candidates.is_empty() {
            return Err(ReferenceError::NoCandidates);
        }
        Ok(self._reference)
    }
}
