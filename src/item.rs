use crate::{batch::SearchTask, error::CrawlerError, request::SearchType};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Data,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub un_lo_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firms_code: Option<String>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Location {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MblItem {
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbl_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voyage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub por: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pol: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_of_deliv: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_dest: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_update: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VesselItem {
    pub task_id: String,
    pub vessel_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voyage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pol: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ata: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerItem {
    pub task_id: String,
    pub container_key: String,
    pub container_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_free_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_pickup_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_return_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStatusItem {
    pub task_id: String,
    pub container_key: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voyage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_or_actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorItem {
    pub task_id: String,
    pub search_no: String,
    pub search_type: SearchType,
    pub status: ResultStatus,
    pub detail: String,
}

impl ErrorItem {
    pub fn from_error(task: &SearchTask, search_type: SearchType, err: &CrawlerError) -> Self {
        ErrorItem {
            task_id: task.task_id.clone(),
            search_no: task.search_no.clone(),
            search_type,
            status: err.status(),
            detail: err.detail(),
        }
    }

    pub fn did_not_end(task: &SearchTask, search_type: SearchType) -> Self {
        ErrorItem {
            task_id: task.task_id.clone(),
            search_no: task.search_no.clone(),
            search_type,
            status: ResultStatus::Error,
            detail: "<task-did-not-end>".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    Mbl(MblItem),
    Vessel(VesselItem),
    Container(ContainerItem),
    ContainerStatus(ContainerStatusItem),
    Error(ErrorItem),
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self {
            Item::Mbl(_) => ItemKind::Mbl,
            Item::Vessel(_) => ItemKind::Vessel,
            Item::Container(_) => ItemKind::Container,
            Item::ContainerStatus(_) => ItemKind::ContainerStatus,
            Item::Error(_) => ItemKind::Error,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Item::Mbl(item) => &item.task_id,
            Item::Vessel(item) => &item.task_id,
            Item::Container(item) => &item.task_id,
            Item::ContainerStatus(item) => &item.task_id,
            Item::Error(item) => &item.task_id,
        }
    }

    /// Main records and error records settle a task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Item::Mbl(_) | Item::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Mbl,
    Vessel,
    Container,
    ContainerStatus,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub kind: ItemKind,
    pub key: String,
}

impl RecordKey {
    pub fn new(kind: ItemKind, key: impl Into<String>) -> Self {
        RecordKey {
            kind,
            key: key.into(),
        }
    }
}

/// Per-task accumulator that drops replays of already recorded items.
#[derive(Debug, Default)]
pub struct ItemRecorder {
    recorded: HashSet<RecordKey>,
    items: Vec<Item>,
    terminal: bool,
}

impl ItemRecorder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns `false` when `key` was already recorded and `item` got dropped.
    pub fn record(&mut self, key: RecordKey, item: Item) -> bool {
        self.record_all(key, vec![item])
    }

    pub fn record_all(&mut self, key: RecordKey, items: Vec<Item>) -> bool {
        if !self.recorded.insert(key) {
            return false;
        }
        self.terminal |= items.iter().any(Item::is_terminal);
        self.items.extend(items);
        true
    }

    pub fn is_recorded(&self, key: &RecordKey) -> bool {
        self.recorded.contains(key)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn items(&self) -> &[Item] {
        self.items.as_slice()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

/// Final outcome for one task, handed to the result sink.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_id: String,
    pub search_no: String,
    pub search_type: SearchType,
    pub status: ResultStatus,
    pub items: Vec<Item>,
    pub finished_at: DateTime<FixedOffset>,
}

impl TaskResult {
    pub fn new(task: &SearchTask, search_type: SearchType, items: Vec<Item>) -> Self {
        let status = items
            .iter()
            .find_map(|item| match item {
                Item::Error(err) => Some(err.status),
                _ => None,
            })
            .unwrap_or(ResultStatus::Data);

        TaskResult {
            task_id: task.task_id.clone(),
            search_no: task.search_no.clone(),
            search_type,
            status,
            items,
            finished_at: crate::utils::get_now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mbl(task_id: &str, no: &str) -> Item {
        Item::Mbl(MblItem {
            task_id: task_id.to_string(),
            mbl_no: Some(no.to_string()),
            ..Default::default()
        })
    }

    fn vessel(task_id: &str, key: &str) -> Item {
        Item::Vessel(VesselItem {
            task_id: task_id.to_string(),
            vessel_key: key.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn recording_twice_keeps_one_copy() {
        let mut once = ItemRecorder::new();
        once.record(RecordKey::new(ItemKind::Mbl, "MBLA1"), mbl("T1", "MBLA1"));

        let mut twice = ItemRecorder::new();
        assert!(twice.record(RecordKey::new(ItemKind::Mbl, "MBLA1"), mbl("T1", "MBLA1")));
        assert!(!twice.record(RecordKey::new(ItemKind::Mbl, "MBLA1"), mbl("T1", "MBLA1")));

        assert_eq!(once.items(), twice.items());
        assert_eq!(twice.items().len(), 1);
    }

    #[test]
    fn keeps_insertion_order_and_tracks_terminal_items() {
        let mut recorder = ItemRecorder::new();
        recorder.record_all(
            RecordKey::new(ItemKind::Vessel, "MBLA1"),
            vec![vessel("T1", "EVER LEADER"), vessel("T1", "XIN YING KOU")],
        );
        assert!(!recorder.is_terminal());

        recorder.record(RecordKey::new(ItemKind::Mbl, "MBLA1"), mbl("T1", "MBLA1"));
        assert!(recorder.is_terminal());
        assert!(recorder.is_recorded(&RecordKey::new(ItemKind::Vessel, "MBLA1")));
        assert!(!recorder.is_recorded(&RecordKey::new(ItemKind::Container, "MBLA1")));

        let kinds = recorder
            .into_items()
            .iter()
            .map(Item::kind)
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![ItemKind::Vessel, ItemKind::Vessel, ItemKind::Mbl]);
    }

    #[test]
    fn task_status_follows_error_records() {
        let task = SearchTask::new("T1", "MBLA1");
        let ok = TaskResult::new(&task, SearchType::Mbl, vec![mbl("T1", "MBLA1")]);
        assert_eq!(ok.status, ResultStatus::Data);

        let failed = TaskResult::new(
            &task,
            SearchType::Mbl,
            vec![Item::Error(ErrorItem::from_error(
                &task,
                SearchType::Mbl,
                &CrawlerError::ProxyPoolExhausted,
            ))],
        );
        assert_eq!(failed.status, ResultStatus::Fatal);
    }

    #[test]
    fn serializes_items_with_a_type_tag() {
        let json = serde_json::to_value(mbl("T1", "MBLA1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "mbl", "task_id": "T1", "mbl_no": "MBLA1"})
        );
    }
}
