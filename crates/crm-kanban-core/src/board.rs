//! Board State Model: ordered containers of ordered items.
//!
//! Every mutation here is synchronous and local. `move_item` runs on every
//! pointer-move tick, so it never panics and never errors: a move that does
//! not match the current arrangement is simply ignored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::records::{BoardKind, CardFields, Record};

/// Title of the read-only container that collects unrecognised stages.
pub const UNKNOWN_CONTAINER_TITLE: &str = "Unknown";

/// UI-scoped card identifier. Regenerated on every load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable column identifier, derived from the title at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn from_title(title: &str) -> Self {
        let slug: String = title
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c.to_ascii_lowercase() })
            .collect();
        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A kanban card: projection of one domain record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Backend identifier of the record. Never changes for the item's lifetime.
    pub record_id: i64,
    pub fields: CardFields,
}

impl Item {
    pub fn new(record_id: i64, fields: CardFields) -> Self {
        Self {
            id: ItemId::new(),
            record_id,
            fields,
        }
    }
}

/// A kanban column, one per stage value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    /// Equal to the backend stage string.
    pub title: String,
    /// False only for the catch-all column.
    pub accepts_drops: bool,
    pub items: Vec<Item>,
}

impl Container {
    fn new(title: &str, accepts_drops: bool) -> Self {
        Self {
            id: ContainerId::from_title(title),
            title: title.to_string(),
            accepts_drops,
            items: Vec::new(),
        }
    }
}

/// What to do with records whose stage matches no container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownStagePolicy {
    /// Collect them in a trailing read-only `Unknown` container.
    #[default]
    CatchAll,
    /// Leave them off the board.
    Drop,
}

impl UnknownStagePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatchAll => "catch_all",
            Self::Drop => "drop",
        }
    }
}

impl std::str::FromStr for UnknownStagePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catch_all" => Ok(Self::CatchAll),
            "drop" => Ok(Self::Drop),
            _ => Err(format!("Invalid unknown-stage policy: {}", s)),
        }
    }
}

/// Full copy of the board arrangement, used for rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    containers: Vec<Container>,
}

/// Summary of a `load_from_records` pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    /// Records without a stage value, placed in the first container that accepts drops.
    pub defaulted: usize,
    /// `(record_id, stage)` pairs that matched no container.
    pub unrecognized: Vec<(i64, String)>,
    /// Records left off the board (unrecognised under `Drop`, or duplicate ids).
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    containers: Vec<Container>,
}

impl Board {
    /// Build a board with one empty container per title, in order.
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            containers: titles
                .into_iter()
                .map(|t| Container::new(t.as_ref(), true))
                .collect(),
        }
    }

    /// Append the read-only catch-all container.
    pub fn with_catch_all(mut self) -> Self {
        if self.container_by_title(UNKNOWN_CONTAINER_TITLE).is_none() {
            self.containers
                .push(Container::new(UNKNOWN_CONTAINER_TITLE, false));
        }
        self
    }

    pub fn for_kind(kind: BoardKind, policy: UnknownStagePolicy) -> Self {
        let board = Self::new(kind.stage_titles());
        match policy {
            UnknownStagePolicy::CatchAll => board.with_catch_all(),
            UnknownStagePolicy::Drop => board,
        }
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn container(&self, id: &ContainerId) -> Option<&Container> {
        self.containers.iter().find(|c| &c.id == id)
    }

    pub fn container_index(&self, id: &ContainerId) -> Option<usize> {
        self.containers.iter().position(|c| &c.id == id)
    }

    pub fn container_by_title(&self, title: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.title == title)
    }

    /// Position of an item as `(container index, item index)`.
    pub fn locate(&self, item_id: &ItemId) -> Option<(usize, usize)> {
        self.containers.iter().enumerate().find_map(|(ci, c)| {
            c.items
                .iter()
                .position(|i| &i.id == item_id)
                .map(|ii| (ci, ii))
        })
    }

    pub fn item(&self, item_id: &ItemId) -> Option<&Item> {
        self.locate(item_id)
            .map(|(ci, ii)| &self.containers[ci].items[ii])
    }

    pub fn item_by_record(&self, record_id: i64) -> Option<&Item> {
        self.containers
            .iter()
            .flat_map(|c| c.items.iter())
            .find(|i| i.record_id == record_id)
    }

    /// Title of the container currently holding the item.
    pub fn stage_of(&self, item_id: &ItemId) -> Option<&str> {
        self.locate(item_id)
            .map(|(ci, _)| self.containers[ci].title.as_str())
    }

    pub fn item_ids(&self) -> Vec<&ItemId> {
        self.containers
            .iter()
            .flat_map(|c| c.items.iter().map(|i| &i.id))
            .collect()
    }

    pub fn record_ids(&self) -> Vec<i64> {
        self.containers
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.record_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.containers.iter().map(|c| c.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace every container's items from freshly fetched records.
    ///
    /// Records are grouped by `group_by`. A missing or blank value goes to
    /// the first container that accepts drops; a value matching no title goes to the catch-all
    /// container if the board has one and is dropped otherwise. Duplicate
    /// record ids keep their first occurrence.
    pub fn load_from_records<R, F>(&mut self, records: &[R], group_by: &str, to_item: F) -> LoadReport
    where
        R: Record,
        F: Fn(&R) -> Item,
    {
        let mut report = LoadReport::default();
        for container in &mut self.containers {
            container.items.clear();
        }
        if self.containers.is_empty() {
            report.dropped = records.len();
            return report;
        }

        let catch_all = self
            .containers
            .iter()
            .position(|c| !c.accepts_drops && c.title == UNKNOWN_CONTAINER_TITLE);
        let default_target = self.containers.iter().position(|c| c.accepts_drops);
        let mut seen = HashSet::new();

        for record in records {
            let record_id = record.record_id();
            if !seen.insert(record_id) {
                tracing::warn!(record_id, "duplicate record id in fetch; keeping first");
                report.dropped += 1;
                continue;
            }

            let stage = record
                .field(group_by)
                .map(str::trim)
                .filter(|s| !s.is_empty());

            let target = match stage {
                None => {
                    report.defaulted += 1;
                    default_target
                }
                Some(stage) => match self.containers.iter().position(|c| c.title == stage) {
                    Some(idx) => Some(idx),
                    None => {
                        tracing::warn!(
                            record_id,
                            stage,
                            field = group_by,
                            "record stage matches no container"
                        );
                        report.unrecognized.push((record_id, stage.to_string()));
                        catch_all
                    }
                },
            };

            match target {
                Some(idx) => {
                    self.containers[idx].items.push(to_item(record));
                    report.loaded += 1;
                }
                None => report.dropped += 1,
            }
        }

        report
    }

    /// Move the item at `from_index` of `from` to `to_index` of `to`.
    ///
    /// Returns whether the board changed. Out-of-range indices, unknown
    /// containers, a mismatched item id, or a read-only destination all leave
    /// the board untouched.
    pub fn move_item(
        &mut self,
        item_id: &ItemId,
        from: &ContainerId,
        from_index: usize,
        to: &ContainerId,
        to_index: usize,
    ) -> bool {
        let (Some(from_ci), Some(to_ci)) = (self.container_index(from), self.container_index(to)) else {
            return false;
        };

        let source = &self.containers[from_ci].items;
        if from_index >= source.len() || &source[from_index].id != item_id {
            return false;
        }

        if from_ci == to_ci {
            if to_index >= source.len() || to_index == from_index {
                return false;
            }
            let items = &mut self.containers[from_ci].items;
            let item = items.remove(from_index);
            items.insert(to_index, item);
            return true;
        }

        let dest = &self.containers[to_ci];
        if !dest.accepts_drops || to_index > dest.items.len() {
            return false;
        }

        let item = self.containers[from_ci].items.remove(from_index);
        self.containers[to_ci].items.insert(to_index, item);
        true
    }

    /// Reorder whole containers. Titles and contents are untouched.
    pub fn move_container(&mut self, from: usize, to: usize) -> bool {
        let len = self.containers.len();
        if from >= len || to >= len || from == to {
            return false;
        }
        let container = self.containers.remove(from);
        self.containers.insert(to, container);
        true
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            containers: self.containers.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &BoardSnapshot) {
        self.containers = snapshot.containers.clone();
    }

    pub fn matches(&self, snapshot: &BoardSnapshot) -> bool {
        self.containers == snapshot.containers
    }
}
