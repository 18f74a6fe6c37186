use crate::error::NegotiationError;
use crate::scoring::SupplierScore;

/// Scored suppliers kept sorted from the best to the worst.
/// Suppliers with equal score keep the order, in which they were added.
#[derive(Clone, Debug, Default)]
pub struct Ranking {
    entries: Vec<SupplierScore>,
}

impl Ranking {
    pub fn new() -> Ranking {
        Ranking::default()
    }

    pub fn add(&mut self, new: SupplierScore) -> Result<(), NegotiationError> {
        if new.total.is_nan() {
            return Err(NegotiationError::InvalidScore(new.supplier_id));
        }

        log::debug!(
            "Adding supplier [{}] with score {:.2} to ranking.",
            new.supplier_id,
            new.total
        );

        // Keep vector sorted. Insert after all entries with the same score.
        let idx = self
            .entries
            .partition_point(|entry| entry.total >= new.total);
        self.entries.insert(idx, new);
        Ok(())
    }

    pub fn best(&self) -> Option<&SupplierScore> {
        self.entries.first()
    }

    pub fn runner_up(&self) -> Option<&SupplierScore> {
        self.entries.get(1)
    }

    pub fn entries(&self) -> &[SupplierScore] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<SupplierScore> {
        self.entries
    }
}

impl TryFrom<Vec<SupplierScore>> for Ranking {
    type Error = NegotiationError;

    fn try_from(scores: Vec<SupplierScore>) -> Result<Self, Self::Error> {
        let mut ranking = Ranking::new();
        for score in scores {
            ranking.add(score)?;
        }
        Ok(ranking)
    }
}
