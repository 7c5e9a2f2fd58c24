use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("kafka client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}
