use crate::{error::CrawlerError, item::TaskResult};
use std::{
    io::Write,
    sync::{Arc, Mutex},
};

/// Receives every finished task, in batch order.
pub trait ResultSink: Send {
    fn deliver(&mut self, result: &TaskResult) -> Result<(), CrawlerError>;
}

/// One JSON object per line.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ResultSink for JsonLinesSink<W> {
    fn deliver(&mut self, result: &TaskResult) -> Result<(), CrawlerError> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects results in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    results: Arc<Mutex<Vec<TaskResult>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn results(&self) -> Vec<TaskResult> {
        match self.results.lock() {
            Ok(results) => results.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ResultSink for MemorySink {
    fn deliver(&mut self, result: &TaskResult) -> Result<(), CrawlerError> {
        match self.results.lock() {
            Ok(mut results) => results.push(result.clone()),
            Err(poisoned) => poisoned.into_inner().push(result.clone()),
        }
        Ok(())
    }
}
