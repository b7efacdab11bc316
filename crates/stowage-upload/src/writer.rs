use stowage_core::{AppError, AppResult, FileInfo, UploadSession};
use stowage_storage::{ByteReader, StorageError};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::service::UploadService;

/// Result of feeding one chunk into a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// More bytes are expected; carries the session with its new offset
    Incomplete(UploadSession),
    /// The last byte arrived and the file record was created
    Finished(FileInfo),
}

impl UploadOutcome {
    pub fn file_info(&self) -> Option<&FileInfo> {
        match self {
            UploadOutcome::Finished(info) => Some(info),
            UploadOutcome::Incomplete(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, UploadOutcome::Finished(_))
    }
}

impl UploadService {
    /// Append the next chunk of an upload session.
    ///
    /// `session.file_offset` must match the stored offset, otherwise the chunk is refused.
    /// At most `file_size - file_offset` bytes are read from `reader`. Whatever reached the
    /// backend is recorded in the session even when the stream fails part way. Once the
    /// offset reaches the declared size the upload is finalized under the same lock.
    #[tracing::instrument(
        skip(self, session, reader),
        fields(session_id = %session.id, file_offset = session.file_offset)
    )]
    pub async fn upload_data<R>(&self, session: &UploadSession, reader: R) -> AppResult<UploadOutcome>
    where
        R: AsyncRead + Send + 'static,
    {
        let Some(_guard) = self.locks.lock(session.id) else {
            tracing::debug!(session_id = %session.id, "Upload session is already being written");
            return Err(AppError::ConcurrencyConflict {
                session_id: session.id,
            });
        };

        let mut current = self.get_upload_session(session.id).await?;
        self.reconcile_offset(&mut current).await?;
        if current.file_offset != session.file_offset {
            tracing::debug!(
                session_id = %session.id,
                expected = current.file_offset,
                actual = session.file_offset,
                "Upload offset mismatch"
            );
            return Err(AppError::OffsetMismatch {
                session_id: session.id,
                expected: current.file_offset,
                actual: session.file_offset,
            });
        }

        let remaining = current.remaining();
        if remaining > 0 {
            self.write_chunk(&mut current, reader, remaining).await?;
        }

        if current.file_offset != current.file_size {
            return Ok(UploadOutcome::Incomplete(current));
        }

        let info = self.finalize(&current).await?;
        Ok(UploadOutcome::Finished(info))
    }

    async fn write_chunk<R>(&self, session: &mut UploadSession, reader: R, remaining: u64) -> AppResult<()>
    where
        R: AsyncRead + Send + 'static,
    {
        let upload_path = session.upload_path();
        let first_chunk = session.file_offset == 0;
        let bounded: ByteReader = Box::pin(reader.take(remaining));

        let result = if first_chunk {
            self.storage.write_file(bounded, &upload_path).await
        } else {
            self.storage.append_file(bounded, &upload_path).await
        };
        let (written, write_error) = match result {
            Ok(written) => (written, None),
            Err(e) => (e.bytes_written(), Some(e)),
        };

        if first_chunk {
            if written == 0 {
                if let Some(e) = write_error {
                    self.discard_object(&upload_path).await;
                    return Err(e.into());
                }
            }

            let min_size = self.config.min_first_part_size;
            if written < min_size && written as i64 != session.file_size {
                self.discard_object(&upload_path).await;
                tracing::debug!(
                    session_id = %session.id,
                    size_bytes = written,
                    min_size = min_size,
                    error = ?write_error.as_ref().map(StorageError::to_string),
                    "First upload part too small"
                );
                return Err(AppError::FirstPartTooSmall { min_size, written });
            }
        }

        if written > 0 {
            let previous = session.file_offset;
            session.file_offset += written as i64;
            if let Err(e) = self.sessions.update(session).await {
                tracing::error!(
                    session_id = %session.id,
                    persisted_offset = previous,
                    stored_bytes = session.file_offset,
                    error = %e,
                    "Upload chunk stored but offset not persisted"
                );
                return Err(e);
            }
            tracing::debug!(
                session_id = %session.id,
                size_bytes = written,
                file_offset = session.file_offset,
                file_size = session.file_size,
                "Upload chunk stored"
            );
        }

        match write_error {
            Some(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    file_offset = session.file_offset,
                    error = %e,
                    "Upload chunk interrupted"
                );
                Err(e.into())
            }
            None => Ok(()),
        }
    }

    /// Catch up a stored offset that trails the object, left behind when bytes reached the
    /// backend but the offset update did not. Only this writer appends under the session
    /// lock, so every byte of the object past the offset is ours.
    async fn reconcile_offset(&self, session: &mut UploadSession) -> AppResult<()> {
        if session.file_offset == 0 {
            // The next write starts the object over.
            return Ok(());
        }

        let stored = self.storage.file_size(&session.upload_path()).await?;
        let durable = stored.min(session.file_size.max(0) as u64) as i64;
        if durable > session.file_offset {
            tracing::warn!(
                session_id = %session.id,
                persisted_offset = session.file_offset,
                stored_bytes = durable,
                "Upload offset behind stored object, catching up"
            );
            session.file_offset = durable;
            self.sessions.update(session).await?;
        }
        Ok(())
    }

    async fn discard_object(&self, path: &str) {
        if let Err(e) = self.storage.remove_file(path).await {
            tracing::warn!(path = %path, error = %e, "Failed to remove rejected upload data");
        }
    }
}
