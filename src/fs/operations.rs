use std::{io::ErrorKind, path::Path};

use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

use crate::storage::error::StoreError;

/// Reads a whole JSON document under a shared lock. A missing or empty file reads as `None`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    file.lock_shared()?;
    let mut content = String::new();
    let read = file.read_to_string(&mut content).await;
    file.unlock_async().await?;
    read?;

    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&content)?))
}

/// Replaces the document at `path` with `value`.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let buffer = serde_json::to_vec_pretty(value)?;
    let mut file = open_for_update(path).await?;
    file.lock_exclusive()?;
    let result = overwrite(&mut file, &buffer).await;
    file.unlock_async().await?;
    result
}

/// Read-modify-write of a JSON document while holding an exclusive lock for the whole cycle, so
/// two processes can't interleave their updates. `change` sees `None` for a missing file.
pub async fn update_json<T, R>(
    path: &Path,
    change: impl FnOnce(&mut Option<T>) -> Result<R, StoreError>,
) -> Result<R, StoreError>
where
    T: Serialize + DeserializeOwned,
{
    let mut file = open_for_update(path).await?;
    file.lock_exclusive()?;
    let result = update_locked(&mut file, change).await;
    file.unlock_async().await?;
    result
}

async fn update_locked<T, R>(
    file: &mut File,
    change: impl FnOnce(&mut Option<T>) -> Result<R, StoreError>,
) -> Result<R, StoreError>
where
    T: Serialize + DeserializeOwned,
{
    let mut content = String::new();
    file.read_to_string(&mut content).await?;
    let mut value = if content.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str::<T>(&content)?)
    };

    let result = change(&mut value)?;

    if let Some(value) = value {
        overwrite(file, &serde_json::to_vec_pretty(&value)?).await?;
    }
    Ok(result)
}

async fn open_for_update(path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?)
}

async fn overwrite(file: &mut File, buffer: &[u8]) -> Result<(), StoreError> {
    file.rewind().await?;
    file.set_len(0).await?;
    file.write_all(buffer).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}
