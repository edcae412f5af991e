//! Runs one upload session against a [`RemoteStore`].

use std::sync::Arc;

use filedeck_protocol::{
    CompleteUploadRequest, InitUploadRequest, ObjectDescriptor, UploadMode, UploadPartRequest,
};
use filedeck_store::RemoteStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chunked::checksum_bytes;
use crate::retry::{RetryError, RetryPolicy};
use crate::source::TransferSource;
use crate::timeout::TimeoutPolicy;
use crate::types::TransferSession;
use crate::TransferError;

/// Drives sessions through init, upload and finalize.
///
/// Parts go out strictly in order. Cancellation is checked before each
/// request is scheduled; an in-flight request is allowed to finish.
pub struct SessionDriver {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    timeout: TimeoutPolicy,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        retry: RetryPolicy,
        timeout: TimeoutPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            retry,
            timeout,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Uploads `source` through `session` and returns the stored object.
    ///
    /// `on_progress` receives the bytes acknowledged so far for this file.
    /// The session ends `completed`, `failed` or `aborted`; exceeding the
    /// size-based time budget fails it with [`TransferError::Timeout`].
    pub async fn upload(
        &self,
        session: &TransferSession,
        source: &dyn TransferSource,
        mime_type: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<ObjectDescriptor, TransferError> {
        let budget = self.timeout.budget(source.size());
        let outcome =
            tokio::time::timeout(budget, self.drive(session, source, mime_type, on_progress)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout {
                filename: session.filename(),
                offset: session.offset(),
            }),
        };

        match &result {
            Ok(_) => {}
            Err(e) if e.is_aborted() => session.abort(),
            Err(e) => session.fail(&e.to_string()),
        }
        if result.is_err() {
            debug!(session = ?session.snapshot(), "session ended early");
        }
        result
    }

    async fn drive(
        &self,
        session: &TransferSession,
        source: &dyn TransferSource,
        mime_type: &str,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<ObjectDescriptor, TransferError> {
        let filename = session.filename();
        let storage_key = session.storage_key();

        self.check_cancelled(session)?;
        session
            .begin_init()
            .map_err(|reason| protocol(&filename, reason))?;

        let init = self
            .store
            .init_upload(&InitUploadRequest {
                filename: filename.clone(),
                filesize: source.size(),
                storage_key: storage_key.clone(),
                mime_type: mime_type.to_string(),
            })
            .await
            .map_err(|source| TransferError::SessionInitFailed {
                filename: filename.clone(),
                source,
            })?;
        session
            .apply_init(&init)
            .map_err(|reason| protocol(&filename, reason))?;

        debug!(
            file = %filename,
            mode = ?init.mode,
            transfer_id = %init.transfer_id,
            parts = init.total_parts.unwrap_or(1),
            "session initialized"
        );

        match init.mode {
            UploadMode::Direct => {
                self.upload_direct(session, source, mime_type, &init.transfer_id)
                    .await?
            }
            UploadMode::Chunked => self.upload_parts(session, source, on_progress).await?,
        }
        on_progress(session.offset());

        self.check_cancelled(session)?;
        let parts = session
            .begin_finalize()
            .map_err(|reason| protocol(&filename, reason))?;
        let object = self
            .store
            .complete_upload(&CompleteUploadRequest {
                transfer_id: init.transfer_id.clone(),
                upload_id: session.upload_id(),
                storage_key,
                parts,
            })
            .await
            .map_err(|source| TransferError::FinalizeFailed {
                filename: filename.clone(),
                offset: session.offset(),
                source,
            })?;
        session
            .complete()
            .map_err(|reason| protocol(&filename, reason))?;

        info!(file = %filename, bytes = source.size(), "upload complete");
        Ok(object)
    }

    async fn upload_direct(
        &self,
        session: &TransferSession,
        source: &dyn TransferSource,
        mime_type: &str,
        transfer_id: &str,
    ) -> Result<(), TransferError> {
        let filename = session.filename();
        self.check_cancelled(session)?;

        let body = read(session, source, 0, source.size() as usize).await?;
        self.retry
            .run(&filename, &self.cancel, |_| {
                self.store
                    .upload_direct(transfer_id, &filename, mime_type, body.clone())
            })
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, source } => TransferError::DirectUploadFailed {
                    filename: filename.clone(),
                    attempts,
                    source,
                },
                RetryError::Cancelled { .. } => aborted(session),
            })?;

        session
            .record_direct()
            .map_err(|reason| protocol(&filename, reason))
    }

    async fn upload_parts(
        &self,
        session: &TransferSession,
        source: &dyn TransferSource,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> Result<(), TransferError> {
        let filename = session.filename();
        let storage_key = session.storage_key();
        let upload_id = session
            .upload_id()
            .ok_or_else(|| protocol(&filename, "chunked session without upload id".into()))?;

        for part in session.pending_parts() {
            self.check_cancelled(session)?;

            let len = (part.byte_range.end - part.byte_range.start) as usize;
            let body = read(session, source, part.byte_range.start, len).await?;
            let request = UploadPartRequest {
                upload_id: upload_id.clone(),
                storage_key: storage_key.clone(),
                part_number: part.part_number,
                checksum: checksum_bytes(&body),
            };

            let label = format!("{filename} part {}", part.part_number);
            let receipt = self
                .retry
                .run(&label, &self.cancel, |_| {
                    self.store.upload_part(&request, body.clone())
                })
                .await
                .map_err(|e| match e {
                    RetryError::Exhausted { attempts, source } => {
                        TransferError::PartUploadFailed {
                            filename: filename.clone(),
                            part_number: part.part_number,
                            attempts,
                            offset: session.offset(),
                            source,
                        }
                    }
                    RetryError::Cancelled { .. } => aborted(session),
                })?;

            session
                .record_part(part.part_number, receipt.etag)
                .map_err(|reason| protocol(&filename, reason))?;
            debug!(file = %filename, part = part.part_number, offset = session.offset(), "part uploaded");
            on_progress(session.offset());
        }

        Ok(())
    }

    fn check_cancelled(&self, session: &TransferSession) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(aborted(session))
        } else {
            Ok(())
        }
    }
}

async fn read(
    session: &TransferSession,
    source: &dyn TransferSource,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>, TransferError> {
    source
        .read_range(offset, len)
        .await
        .map_err(|source| TransferError::SourceReadFailed {
            filename: session.filename(),
            offset: session.offset(),
            source,
        })
}

fn aborted(session: &TransferSession) -> TransferError {
    TransferError::Aborted {
        filename: session.filename(),
        offset: session.offset(),
    }
}

fn protocol(filename: &str, reason: String) -> TransferError {
    TransferError::Protocol {
        filename: filename.to_string(),
        reason,
    }
}
