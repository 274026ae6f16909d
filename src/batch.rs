use crate::{error::CrawlerError, request::SearchType};
use itertools::Itertools;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTask {
    pub task_id: String,
    pub search_no: String,
}

impl SearchTask {
    pub fn new(task_id: impl Into<String>, search_no: impl Into<String>) -> Self {
        SearchTask {
            task_id: task_id.into(),
            search_no: search_no.into(),
        }
    }
}

/// Tasks handled in one session, consumed strictly front to back.
#[derive(Debug, Clone)]
pub struct SearchBatch {
    search_type: SearchType,
    tasks: VecDeque<SearchTask>,
}

impl SearchBatch {
    /// Later entries reusing an earlier task id are dropped.
    pub fn new(search_type: SearchType, tasks: Vec<SearchTask>) -> Self {
        let tasks = tasks
            .into_iter()
            .unique_by(|t| t.task_id.clone())
            .collect();
        SearchBatch { search_type, tasks }
    }

    /// Builds a batch from comma separated task ids and search numbers.
    pub fn from_lists(
        search_type: SearchType,
        task_ids: &str,
        search_nos: &str,
    ) -> Result<Self, CrawlerError> {
        let task_ids = split_list(task_ids);
        let search_nos = split_list(search_nos);

        if task_ids.len() != search_nos.len() {
            return Err(CrawlerError::SearchNoLengthMismatch {
                task_ids: task_ids.len(),
                search_nos: search_nos.len(),
            });
        }

        let tasks = task_ids
            .into_iter()
            .zip(search_nos)
            .map(|(t, s)| SearchTask::new(t, s))
            .collect();
        Ok(Self::new(search_type, tasks))
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn current(&self) -> Option<&SearchTask> {
        self.tasks.front()
    }

    /// Drops the current task and returns it.
    pub fn advance(&mut self) -> Option<SearchTask> {
        self.tasks.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unique()
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_batch_from_comma_lists() {
        let batch =
            SearchBatch::from_lists(SearchType::Mbl, " T1, T2 ,T1", "MBLA1,MBLB2, MBLA1").unwrap();

        assert_eq!(
            batch.iter().cloned().collect::<Vec<_>>(),
            vec![SearchTask::new("T1", "MBLA1"), SearchTask::new("T2", "MBLB2")]
        );
    }

    #[test]
    fn rejects_mismatched_lists() {
        let err = SearchBatch::from_lists(SearchType::Booking, "T1,T2", "BK1").unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::SearchNoLengthMismatch {
                task_ids: 2,
                search_nos: 1
            }
        ));
    }

    #[test]
    fn advances_one_task_at_a_time() {
        let mut batch = SearchBatch::new(
            SearchType::Mbl,
            vec![SearchTask::new("T1", "A"), SearchTask::new("T2", "B")],
        );

        assert_eq!(batch.current().map(|t| t.task_id.as_str()), Some("T1"));
        assert_eq!(batch.advance().map(|t| t.task_id), Some("T1".to_string()));
        assert_eq!(batch.current().map(|t| t.task_id.as_str()), Some("T2"));
        batch.advance();
        assert!(batch.is_empty());
        assert_eq!(batch.advance(), None);
    }
}
