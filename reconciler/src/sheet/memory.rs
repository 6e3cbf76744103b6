use super::{CellValue, SheetBackend};
use async_trait::async_trait;
use common::{Error, Result};
use tokio::sync::RwLock;

/// In-process grid, for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryBackend {
    grid: RwLock<Vec<Vec<CellValue>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        let grid = rows
            .into_iter()
            .map(|row| row.into_iter().map(CellValue::Text).collect())
            .collect();
        Self {
            grid: RwLock::new(grid),
        }
    }

    pub async fn row_count(&self) -> usize {
        self.grid.read().await.len()
    }
}

/// Grid mutations shared by the in-memory and object-backed sheets.
pub(crate) fn write_cells(
    grid: &mut Vec<Vec<CellValue>>,
    row: usize,
    start_col: usize,
    values: Vec<CellValue>,
) -> Result<()> {
    if row == 0 {
        return Err(Error::InvalidInput("Sheet rows are 1-based".into()));
    }
    if grid.len() < row {
        grid.resize_with(row, Vec::new);
    }

    let cells = &mut grid[row - 1];
    let end = start_col + values.len();
    if cells.len() < end {
        cells.resize_with(end, CellValue::default);
    }
    for (cell, value) in cells[start_col..end].iter_mut().zip(values) {
        *cell = value;
    }
    Ok(())
}

pub(crate) fn append_cells(grid: &mut Vec<Vec<CellValue>>, values: Vec<CellValue>) -> usize {
    grid.push(values);
    grid.len()
}

pub(crate) fn render(grid: &[Vec<CellValue>]) -> Vec<Vec<String>> {
    grid.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[async_trait]
impl SheetBackend for MemoryBackend {
    async fn read_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(render(&self.grid.read().await))
    }

    async fn write_range(&self, row: usize, start_col: usize, values: Vec<CellValue>) -> Result<()> {
        write_cells(&mut *self.grid.write().await, row, start_col, values)
    }

    async fn append_row(&self, values: Vec<CellValue>) -> Result<usize> {
        Ok(append_cells(&mut *self.grid.write().await, values))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
