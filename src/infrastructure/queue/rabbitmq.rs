use anyhow::{Result, anyhow};
use lapin::{
    Channel, Connection, ConnectionProperties, Consumer, options::*,
    types::{AMQPValue, FieldTable},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Queue topology for one work queue: the lease (consumer timeout) and the
/// dead-letter queue rejected deliveries are routed to.
#[derive(Clone, Debug)]
pub struct WorkQueue {
    pub name: String,
    pub dead_letter: String,
    pub lock_duration: Duration,
    pub prefetch: u16,
}

#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ");
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(url: &str) -> Result<Self> {
        let (conn, channel) = Self::connect(url).await?;

        Ok(Self {
            url: url.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    pub async fn reconnect(&self) -> Result<()> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        Ok(())
    }

    fn work_queue_args(queue: &WorkQueue) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            "x-consumer-timeout".into(),
            AMQPValue::LongLongInt(queue.lock_duration.as_millis() as i64),
        );
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString("".into()),
        );
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(queue.dead_letter.as_str().into()),
        );
        args
    }

    async fn declare(channel: &Channel, queue: &WorkQueue) -> Result<()> {
        let durable = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };

        channel
            .queue_declare(&queue.dead_letter, durable, FieldTable::default())
            .await
            .map_err(|e| anyhow!("Failed to declare dead-letter queue: {}", e))?;

        channel
            .queue_declare(&queue.name, durable, Self::work_queue_args(queue))
            .await
            .map_err(|e| anyhow!("Failed to declare queue: {}", e))?;

        Ok(())
    }

    /// Declares the topology and starts a consumer limited to `prefetch`
    /// unacknowledged deliveries.
    pub async fn consume(&self, queue: &WorkQueue, consumer_tag: &str) -> Result<Consumer> {
        let channel = self.channel.lock().await;

        Self::declare(&channel, queue).await?;

        channel
            .basic_qos(queue.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        let consumer = channel
            .basic_consume(
                &queue.name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        Ok(consumer)
    }
}
