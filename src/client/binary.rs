//! Blob helpers.
//!
//! Whole blobs are held in memory; there is no streaming.

use super::DbClient;
use crate::error::DbResult;
use crate::models::Param;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

impl DbClient {
    /// Execute `sql` with `bytes` bound to the parameter `param_name`.
    pub async fn insert_binary(
        &mut self,
        bytes: &[u8],
        sql: &str,
        param_name: &str,
    ) -> DbResult<u64> {
        debug!(bytes = bytes.len(), param = %param_name, "Inserting binary value");
        self.execute(sql, &[Param::named(param_name, bytes)]).await
    }

    /// Read a file and store its contents like [`insert_binary`](Self::insert_binary).
    pub async fn insert_file(
        &mut self,
        path: impl AsRef<Path>,
        sql: &str,
        param_name: &str,
    ) -> DbResult<u64> {
        self.clear_error();
        let read: DbResult<Vec<u8>> = tokio::fs::read(path.as_ref()).await.map_err(Into::into);
        let bytes = self.record(read)?;
        self.insert_binary(&bytes, sql, param_name).await
    }

    /// Select a single binary cell.
    pub async fn select_binary(&mut self, sql: &str, params: &[Param]) -> DbResult<Vec<u8>> {
        self.select_cell::<Vec<u8>>(sql, params).await
    }

    /// Select a single binary cell and decode it as an image.
    #[cfg(feature = "image")]
    pub async fn select_binary_as_image(
        &mut self,
        sql: &str,
        params: &[Param],
    ) -> DbResult<image::DynamicImage> {
        let bytes = self.select_binary(sql, params).await?;
        let decoded: DbResult<image::DynamicImage> =
            image::load_from_memory(&bytes).map_err(Into::into);
        self.record(decoded)
    }

    /// Select a single binary cell and write it to a new file at `path`.
    ///
    /// Returns the number of bytes written. An existing file is never
    /// overwritten.
    pub async fn select_binary_and_save(
        &mut self,
        path: impl AsRef<Path>,
        sql: &str,
        params: &[Param],
    ) -> DbResult<u64> {
        let bytes = self.select_binary(sql, params).await?;
        let written = write_new_file(path.as_ref(), &bytes).await;
        self.record(written)
    }
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> DbResult<u64> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Saved binary value");
    Ok(bytes.len() as u64)
}
