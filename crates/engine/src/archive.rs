use shared::domain::HistoryRecord;

/// Completed sessions in completion order. Records are owned copies and are never touched again.
#[derive(Debug, Default, Clone)]
pub struct HistoryArchive {
    records: Vec<HistoryRecord>,
}

impl HistoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: HistoryRecord) -> &HistoryRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn list(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}
