//! Bounded single-consumer text streams with explicit close semantics.

use tokio::sync::mpsc;

/// Default stream channel capacity.
pub const STREAM_CAPACITY: usize = 64;

/// Producing half of a node output stream. Dropping it closes the stream.
pub struct StreamWriter {
    tx: mpsc::Sender<String>,
}

impl StreamWriter {
    /// Send one chunk; `false` when the consumer is gone.
    pub async fn send(&self, chunk: String) -> bool {
        self.tx.send(chunk).await.is_ok()
    }
}

/// Consuming half. Streams are single-consumer: taking the reader out of
/// the variable store transfers ownership.
pub struct StreamReader {
    rx: mpsc::Receiver<String>,
}

impl StreamReader {
    /// Next chunk, or `None` once the stream is closed and drained.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain the remainder into one string.
    pub async fn collect(mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            out.push_str(&chunk);
        }
        out
    }
}

/// Create a bounded stream pair.
pub fn stream_channel() -> (StreamWriter, StreamReader) {
    let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
    (StreamWriter { tx }, StreamReader { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_roundtrip_and_close() {
        let (writer, mut reader) = stream_channel();
        assert!(writer.send("a".into()).await);
        assert!(writer.send("b".into()).await);
        drop(writer);
        assert_eq!(reader.next().await.as_deref(), Some("a"));
        assert_eq!(reader.next().await.as_deref(), Some("b"));
        assert_eq!(reader.next().await, None);
    }

    #[tokio::test]
    async fn test_collect() {
        let (writer, reader) = stream_channel();
        tokio::spawn(async move {
            writer.send("he".into()).await;
            writer.send("llo".into()).await;
        });
        assert_eq!(reader.collect().await, "hello");
    }

    #[tokio::test]
    async fn test_send_after_reader_dropped() {
        let (writer, reader) = stream_channel();
        drop(reader);
        assert!(!writer.send("x".into()).await);
    }
}
