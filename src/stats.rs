//! Run statistics over ingested records.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::category::Category;
use crate::model::record::MessageRecord;

/// Number of senders listed in [`Summary::top_senders`].
pub const TOP_SENDERS: usize = 10;

/// Aggregate counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub with_attachments: usize,
    /// Every category, including those with zero messages.
    pub per_category: BTreeMap<Category, usize>,
    /// Most frequent senders, highest count first, ties by name.
    pub top_senders: Vec<(String, usize)>,
}

impl Summary {
    /// Percentage of messages with at least one attachment.
    pub fn attachment_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.with_attachments as f64 / self.total as f64 * 100.0
        }
    }
}

/// Compute the summary of `records`.
pub fn summarize(records: &[MessageRecord]) -> Summary {
    let mut per_category: BTreeMap<Category, usize> =
        Category::ALL.iter().map(|&c| (c, 0)).collect();
    for record in records {
        *per_category.entry(record.category).or_default() += 1;
    }

    Summary {
        total: records.len(),
        with_attachments: count_with_attachments(records),
        per_category,
        top_senders: top_senders(records, TOP_SENDERS),
    }
}

/// Count how many records have attachments.
pub fn count_with_attachments(records: &[MessageRecord]) -> usize {
    records.iter().filter(|r| r.has_attachments()).count()
}

/// Return the top N senders by message count.
pub fn top_senders(records: &[MessageRecord], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let key = record.sender.trim();
        if !key.is_empty() {
            *counts.entry(key).or_default() += 1;
        }
    }
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(sender, count)| (sender.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(n);
    sorted
}
