//! Reader for a worker's diagnostic stream
//!
//! Reads the stream incrementally, one line at a time as the emulator
//! writes it, decodes each line into a `WorkerEvent` and forwards it to the
//! campaign. When the stream is exhausted exactly one `Done` follows.
//! The exit status of the process is never looked at.

use shared::{process_debug, process_warn, ProcessId, WorkerEvent, WorkerMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Forward every line of `stream` as a tagged event, then `Done`
///
/// Returns the number of lines forwarded.
pub async fn forward_worker_output<R>(worker_id: u32, stream: R, events: mpsc::Sender<WorkerMessage>) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    let mut forwarded = 0;

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                if buffer.last() == Some(&b'\n') {
                    buffer.pop();
                }
                let line = String::from_utf8_lossy(&buffer);
                let message = WorkerMessage::new(worker_id, WorkerEvent::decode(&line));

                if events.send(message).await.is_err() {
                    process_debug!(ProcessId::Worker(worker_id), "Campaign stopped listening, dropping output");
                    return forwarded;
                }
                forwarded += 1;
            }
            Err(e) => {
                process_warn!(ProcessId::Worker(worker_id), "⚠️ Diagnostic stream read failed: {}", e);
                break;
            }
        }
    }

    let _ = events.send(WorkerMessage::done(worker_id)).await;
    process_debug!(ProcessId::Worker(worker_id), "Stream closed after {} lines", forwarded);
    forwarded
}
