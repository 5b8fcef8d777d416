//! # Output Sink
//!
//! Publisher registry for the records the bridge emits. Channels are
//! registered up front and identified by a strongly typed [`Channel`]
//! handle, so emission never needs a runtime type check. All channels share
//! one PUB socket; each record goes out as a two part message of topic name
//! followed by the JSON record.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::marker::PhantomData;

use sim_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    records::{RecordHeader, Stamped, TransformRecord},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publisher registry over a single PUB socket.
pub struct OutputSink {
    socket: MonitoredSocket,
}

/// Handle to a registered output channel carrying records of type `T`.
pub struct Channel<T> {
    topic: String,
    frame_id: String,
    child_frame_id: String,
    _record: PhantomData<T>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OutputSinkError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the record: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the record: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutputSink {
    /// Create a new sink bound to the given endpoint.
    ///
    /// This function will not block until a consumer connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, OutputSinkError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, endpoint)
            .map_err(OutputSinkError::SocketError)?;

        Ok(Self { socket })
    }

    /// Register a named output channel for records of type `T`.
    pub fn register<T: Serialize>(
        &mut self,
        topic: &str,
        frame_id: &str,
        child_frame_id: &str,
    ) -> Channel<T> {
        Channel {
            topic: topic.to_string(),
            frame_id: frame_id.to_string(),
            child_frame_id: child_frame_id.to_string(),
            _record: PhantomData,
        }
    }

    /// Emit one record on a channel, stamped and headed with the channel's
    /// frame pair.
    pub fn emit<T: Serialize>(
        &self,
        channel: &Channel<T>,
        stamp: DateTime<Utc>,
        data: T,
    ) -> Result<(), OutputSinkError> {
        self.send(
            &channel.topic,
            &Stamped {
                header: RecordHeader {
                    frame_id: channel.frame_id.clone(),
                    child_frame_id: channel.child_frame_id.clone(),
                    stamp,
                },
                data,
            },
        )
    }

    /// Emit a transform between an explicit frame pair.
    ///
    /// Transforms relate many different frame pairs over one channel, so the
    /// pair is given per call rather than fixed at registration.
    pub fn emit_transform(
        &self,
        channel: &Channel<TransformRecord>,
        stamp: DateTime<Utc>,
        frame_id: &str,
        child_frame_id: &str,
        data: TransformRecord,
    ) -> Result<(), OutputSinkError> {
        self.send(
            &channel.topic,
            &Stamped {
                header: RecordHeader {
                    frame_id: frame_id.to_string(),
                    child_frame_id: child_frame_id.to_string(),
                    stamp,
                },
                data,
            },
        )
    }

    fn send<T: Serialize>(&self, topic: &str, record: &T) -> Result<(), OutputSinkError> {
        let record_str =
            serde_json::to_string(record).map_err(OutputSinkError::SerializationError)?;

        self.socket
            .send(topic, zmq::SNDMORE)
            .map_err(OutputSinkError::SendError)?;
        self.socket
            .send(&record_str, 0)
            .map_err(OutputSinkError::SendError)
    }
}
