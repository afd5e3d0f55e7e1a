//! Date-grouped projection of all chats for the history list.
//!
//! The index is a cache. It is always rebuilt from the store's chat
//! summaries with [`reindex`] rather than patched in place, so its
//! grouping can never drift from the store's `updated_at` values.
use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use serde::Serialize;

use super::models::ChatSummary;

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub chats: Vec<ChatSummary>,
}

#[derive(Clone, Serialize, Debug, PartialEq, Default)]
pub struct ChatIndex {
    groups: Vec<DateGroup>,
}

impl ChatIndex {
    pub fn groups(&self) -> &[DateGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of chats across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.chats.len()).sum()
    }

    pub fn find(&self, id: &str) -> Option<&ChatSummary> {
        self.groups
            .iter()
            .flat_map(|g| g.chats.iter())
            .find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Drop `id` from every group, pruning groups left empty. Only
    /// used when the store can't be read back after a delete.
    pub fn remove(&mut self, id: &str) {
        for group in self.groups.iter_mut() {
            group.chats.retain(|c| c.id != id);
        }
        self.groups.retain(|g| !g.chats.is_empty());
    }
}

/// Group chats by the UTC calendar date of `updated_at`. Groups are
/// ordered newest date first and chats within a group newest created
/// first.
pub fn reindex<I>(summaries: I) -> ChatIndex
where
    I: IntoIterator<Item = ChatSummary>,
{
    let groups = summaries
        .into_iter()
        .sorted_by(|a, b| {
            b.updated_at
                .date_naive()
                .cmp(&a.updated_at.date_naive())
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        })
        .chunk_by(|c| c.updated_at.date_naive())
        .into_iter()
        .map(|(date, chats)| DateGroup {
            date,
            chats: chats.collect(),
        })
        .collect();

    ChatIndex { groups }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Header shown above a date group, relative to `today`.
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "TODAY".to_string();
    }
    if today.pred_opt() == Some(date) {
        return "YESTERDAY".to_string();
    }
    format!(
        "{} {}{}, {}",
        date.format("%B"),
        date.day(),
        ordinal_suffix(date.day()),
        date.year()
    )
}
