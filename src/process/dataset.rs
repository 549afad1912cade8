/// How a dataset's columns are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    /// `headers[i]` labels column `i`.
    Named(Vec<String>),
    /// Columns are addressed by position only.
    Positional(usize),
}

impl Columns {
    pub fn len(&self) -> usize {
        match self {
            Columns::Named(h) => h.len(),
            Columns::Positional(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded table: rows of raw text cells, every row exactly as wide as
/// the column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Columns,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(columns: Columns) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub(crate) fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn headers(&self) -> Option<&[String]> {
        match &self.columns {
            Columns::Named(h) => Some(h),
            Columns::Positional(_) => None,
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers()?.iter().position(|h| h == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// `(header, cell)` pairs for one row; `None` for positional datasets.
    pub fn labeled_row(&self, index: usize) -> Option<Vec<(&str, &str)>> {
        let headers = self.headers()?;
        let row = self.rows.get(index)?;
        Some(
            headers
                .iter()
                .zip(row)
                .map(|(h, v)| (h.as_str(), v.as_str()))
                .collect(),
        )
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .filter_map(move |r| r.get(index).map(String::as_str))
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }
}
