use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Write every line read from `input` back to `output`.
///
/// Returns the number of lines echoed once the input ends or `cancel` fires.
pub async fn echo<R, W>(input: R, mut output: W, cancel: CancellationToken) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut echoed = 0;

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            break;
        };

        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        echoed += 1;
    }

    Ok(echoed)
}

/// Echo stdin to stdout on a background task.
pub fn spawn_stdio_echo(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        match echo(stdin, tokio::io::stdout(), cancel).await {
            Ok(lines) => info!(lines, "Console echo stopped"),
            Err(e) => warn!(error = %e, "Console echo failed"),
        }
    })
}
