use {
    crate::ingest::{IngestMessage, TransportMessage},
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::Value,
    std::time::Duration,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{
            tcp::{OwnedReadHalf, OwnedWriteHalf},
            TcpStream,
        },
        sync::mpsc,
        time::sleep,
    },
};

#[derive(Debug)]
pub enum SourceError {
    Connection(String),
    Stream(String),
    MaxRetries,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connection(msg) => write!(f, "connection error: {}", msg),
            SourceError::Stream(msg) => write!(f, "stream error: {}", msg),
            SourceError::MaxRetries => write!(f, "maximum reconnect attempts exceeded"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Connection to the sensor event feed.
///
/// `connect` must (re)establish the subscription to the sensor topic
/// namespace before `next_message` is polled again; the reconnect runner
/// calls it after every stream failure, so messages only flow on an active
/// subscription.
#[async_trait]
pub trait EventSource: Send {
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Next raw message from the feed. `Ok(None)` means the subscription
    /// ended in an orderly way.
    async fn next_message(&mut self) -> Result<Option<TransportMessage>, SourceError>;
}

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    max_retries: u32,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            max,
            max_retries,
            attempt: 0,
        }
    }

    pub async fn sleep(&mut self) -> Result<(), SourceError> {
        if self.attempt >= self.max_retries {
            return Err(SourceError::MaxRetries);
        }

        let delay = self
            .initial
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.max);

        log::warn!(
            "Reconnect attempt {} of {} in {:?}",
            self.attempt + 1,
            self.max_retries,
            delay
        );

        sleep(delay).await;
        self.attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Drive `source` until the feed ends or the ingestion channel closes,
/// reconnecting with exponential backoff on transport failures.
pub async fn run_with_reconnect<S: EventSource>(
    mut source: S,
    tx: mpsc::Sender<IngestMessage>,
) -> Result<(), SourceError> {
    let mut backoff = ExponentialBackoff::new(Duration::from_secs(5), Duration::from_secs(60), 10);

    loop {
        match source.connect().await {
            Ok(()) => {
                log::info!("Connected to sensor event feed");
                backoff.reset();

                loop {
                    match source.next_message().await {
                        Ok(Some(message)) => {
                            if tx.send(IngestMessage::Event(message)).await.is_err() {
                                log::warn!("Ingestion channel closed, stopping subscriber");
                                return Ok(());
                            }
                        }
                        Ok(None) => {
                            log::info!("Sensor event feed ended");
                            return Ok(());
                        }
                        Err(e) => {
                            log::error!("Sensor event feed error: {}", e);
                            break;
                        }
                    }
                }

                backoff.sleep().await?;
            }
            Err(e) => {
                log::error!("Connection failed: {}", e);
                backoff.sleep().await?;
            }
        }
    }
}

/// One message envelope on the broker bridge feed.
#[derive(Debug, Deserialize)]
struct BridgeFrame {
    topic: String,
    payload: Value,
}

/// Newline-delimited JSON feed from the broker bridge.
///
/// Each connect sends a single subscribe line for the configured topic
/// filter, then reads one `{topic, payload}` envelope per line. Swapping in
/// a real broker client means implementing `EventSource` instead.
pub struct TcpLineSource {
    addr: String,
    topic_filter: String,
    reader: Option<BufReader<OwnedReadHalf>>,
    /// Dropping the write half would end the subscription, so it is held
    /// for the lifetime of the connection.
    #[allow(dead_code)]
    writer: Option<OwnedWriteHalf>,
}

impl TcpLineSource {
    pub fn new(addr: String, topic_filter: String) -> Self {
        Self {
            addr,
            topic_filter,
            reader: None,
            writer: None,
        }
    }
}

#[async_trait]
impl EventSource for TcpLineSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| SourceError::Connection(format!("{}: {}", self.addr, e)))?;
        let (read_half, mut write_half) = stream.into_split();

        // Subscription must be re-established on every connect
        let subscribe = serde_json::json!({ "subscribe": self.topic_filter });
        let mut line = subscribe.to_string().into_bytes();
        line.push(b'\n');
        write_half
            .write_all(&line)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        log::info!("Subscribed to {} on {}", self.topic_filter, self.addr);
        self.reader = Some(BufReader::new(read_half));
        self.writer = Some(write_half);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<TransportMessage>, SourceError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SourceError::Connection("not connected".to_string()))?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| SourceError::Stream(e.to_string()))?;
            if read == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<BridgeFrame>(trimmed) {
                Ok(frame) => {
                    let payload = serde_json::to_vec(&frame.payload)
                        .map_err(|e| SourceError::Stream(e.to_string()))?;
                    return Ok(Some(TransportMessage {
                        topic: frame.topic,
                        payload,
                    }));
                }
                Err(e) => {
                    log::warn!("Skipping unparseable bridge frame: {}", e);
                }
            }
        }
    }
}
