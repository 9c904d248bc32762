use crate::contributions::records::{Amount, Contribution, GroupKey};
use std::collections::{BTreeMap, HashMap};

/// Amounts observed for one (recipient, subkey) pair.
/// `observations` keeps insertion order and is the source of truth; `sorted` and `total`
/// are maintained alongside it so that a running median costs one ordered insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    observations: Vec<Amount>,
    sorted: Vec<Amount>,
    total: Amount,
}

impl Bucket {
    pub fn new() -> Self {
        Bucket {
            observations: Vec::new(),
            sorted: Vec::new(),
            total: 0.0,
        }
    }

    /// appends an observation. This is the only way a bucket changes.
    /// amounts are finite; the validator rejects NaN and infinities.
    pub fn push(&mut self, amount: Amount) {
        let at = self.sorted.partition_point(|x| *x <= amount);
        self.sorted.insert(at, amount);
        self.observations.push(amount);
        self.total += amount;
    }

    pub fn count(&self) -> usize {
        self.observations.len()
    }

    /// sum in insertion order
    pub fn total(&self) -> Amount {
        self.total
    }

    /// odd count: the middle element once sorted; even count: the mean of the two middle ones.
    /// `None` only for a bucket that was never pushed to.
    pub fn median(&self) -> Option<Amount> {
        let sorted = &self.sorted;
        let mid = sorted.len() / 2;
        match sorted.len() {
            0 => None,
            len if len % 2 == 1 => Some(sorted[mid]),
            _ => Some((sorted[mid - 1] + sorted[mid]) / 2.0),
        }
    }
}

/// All buckets of one recipient, in two independent index spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientAggregate {
    pub recipient_id: String,
    pub by_zip: HashMap<GroupKey, Bucket>,
    // ordered so the final report can walk dates without sorting
    pub by_date: BTreeMap<GroupKey, Bucket>,
}

impl RecipientAggregate {
    fn new(recipient_id: &str) -> Self {
        RecipientAggregate {
            recipient_id: recipient_id.to_string(),
            by_zip: HashMap::new(),
            by_date: BTreeMap::new(),
        }
    }

    pub fn zip_bucket(&self, zip: &GroupKey) -> Option<&Bucket> {
        self.by_zip.get(zip)
    }

    pub fn date_bucket(&self, date: &GroupKey) -> Option<&Bucket> {
        self.by_date.get(date)
    }

    /// date buckets in ascending key order, `INVALID` included
    pub fn dates(&self) -> impl Iterator<Item = (&GroupKey, &Bucket)> {
        self.by_date.iter()
    }
}

/// Represents the aggregation store. Internal rep is a map from recipient id to its buckets.
/// A recipient is present iff at least one contribution for it was inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipients {
    pub state: BTreeMap<String, RecipientAggregate>,
}

impl Recipients {
    /// creates an empty store
    pub fn new() -> Self {
        Recipients {
            state: BTreeMap::new(),
        }
    }

    /// appends `c.amount` to the recipient's zip bucket and date bucket,
    /// creating the recipient and buckets on first touch.
    /// INVALID subkeys get buckets like any other subkey; reporting decides to skip them.
    pub fn insert(&mut self, c: &Contribution) {
        let aggregate = self
            .state
            .entry(c.recipient_id.clone())
            .or_insert_with(|| RecipientAggregate::new(&c.recipient_id));
        aggregate
            .by_zip
            .entry(c.zip.clone())
            .or_default()
            .push(c.amount);
        aggregate
            .by_date
            .entry(c.date.clone())
            .or_default()
            .push(c.amount);
    }

    pub fn get(&self, recipient_id: &str) -> Option<&RecipientAggregate> {
        self.state.get(recipient_id)
    }

    pub fn zip_bucket(&self, recipient_id: &str, zip: &GroupKey) -> Option<&Bucket> {
        self.get(recipient_id)
            .and_then(|aggregate| aggregate.zip_bucket(zip))
    }

    /// recipients in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &RecipientAggregate> {
        self.state.values()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
