use chrono::NaiveDate;

/// A resolved reverse name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    pub reverse: String,
    pub forward: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub name: String,
    pub id: String,
}

/// One line of a reference table: the last column is the match key, the
/// first two are copied into output rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub provider: Provider,
    pub match_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedRow {
    pub name: String,
    pub count: u64,
    pub provider: Option<Provider>,
}

impl AggregatedRow {
    pub fn to_record(&self) -> Vec<String> {
        let mut record = vec![self.name.clone(), self.count.to_string()];
        if let Some(provider) = &self.provider {
            record.push(provider.name.clone());
            record.push(provider.id.clone());
        }
        record
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub day: Option<NaiveDate>,
    pub pages: usize,
    pub raw_records: usize,
    pub resolved: usize,
    pub daily_rows: usize,
    pub matched_rows: usize,
    pub month_rows: usize,
    pub year_rows: Option<usize>,
    pub failed_endpoints: Vec<String>,
}
