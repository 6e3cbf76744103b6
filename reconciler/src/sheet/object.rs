use super::memory::{append_cells, render, write_cells};
use super::{CellValue, SheetBackend};
use crate::storage::ObjectStorage;
use async_trait::async_trait;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SheetDocument {
    #[serde(default)]
    values: Vec<Vec<CellValue>>,
}

/// A sheet stored as one JSON document in object storage (S3, MinIO or a
/// local directory). Each write rewrites the whole document.
pub struct ObjectSheetBackend {
    storage: Arc<dyn ObjectStorage>,
    key: String,
    write_lock: Mutex<()>,
}

impl ObjectSheetBackend {
    pub fn new(storage: Arc<dyn ObjectStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<SheetDocument> {
        match self.storage.get_object(&self.key).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(Error::NotFound(_)) => {
                debug!(key = %self.key, "No sheet document yet, starting empty");
                Ok(SheetDocument::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, document: &SheetDocument) -> Result<()> {
        let data = serde_json::to_vec_pretty(document)?;
        self.storage.put_object(&self.key, &data).await
    }
}

#[async_trait]
impl SheetBackend for ObjectSheetBackend {
    async fn read_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(render(&self.load().await?.values))
    }

    async fn write_range(&self, row: usize, start_col: usize, values: Vec<CellValue>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        write_cells(&mut document.values, row, start_col, values)?;
        self.save(&document).await
    }

    async fn append_row(&self, values: Vec<CellValue>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let row = append_cells(&mut document.values, values);
        self.save(&document).await?;
        Ok(row)
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.storage.location(), self.key)
    }
}
