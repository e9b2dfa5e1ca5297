use human_bytes::human_bytes;
use shared::checksum::checksum;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::{
    defaults::MAX_SENDS,
    identity::Session,
    key_manager::encrypt_file,
    net_server::{requests, Connection},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    /// The server confirmed the checksum after this many sends.
    Verified { sends: usize },
    /// Every send came back with a different checksum, the server discarded the file.
    Failed,
}

/// Uploads `content` as `file_name` until the server's checksum matches our own, sending at most
/// [`MAX_SENDS`] times.
pub async fn backup_file<S>(
    conn: &mut Connection<S>,
    session: &Session,
    file_name: &str,
    content: &[u8],
) -> anyhow::Result<BackupOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let expected = checksum(content);
    let encrypted = encrypt_file(&session.symmetric_key, content);
    #[allow(clippy::cast_precision_loss)]
    let size = human_bytes(content.len() as f64);

    for send in 1..=MAX_SENDS {
        info!("sending {file_name} ({size}), attempt {send} of {MAX_SENDS}");
        let received = requests::send_file(conn, session.client_id, file_name, encrypted.clone()).await?;

        if received.checksum == expected {
            requests::crc_ok(conn, session.client_id, file_name).await?;
            return Ok(BackupOutcome::Verified { sends: send });
        }

        warn!(
            "checksum mismatch for {file_name}: expected {expected:08x}, server computed {:08x}",
            received.checksum
        );
        if send < MAX_SENDS {
            requests::crc_retry(conn, session.client_id, file_name).await?;
        }
    }

    requests::crc_failed(conn, session.client_id, file_name).await?;
    Ok(BackupOutcome::Failed)
}
