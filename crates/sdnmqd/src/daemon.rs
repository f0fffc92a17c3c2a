//! Bridge daemon wiring.
//!
//! Connects the broker endpoints named in the configuration to a
//! [`SimulatedController`]: one listener task per request queue and one task
//! publishing packet-in events. All tasks stop when the shutdown token is
//! cancelled.

use crate::config::{BrokerBackend, ConfigError, QueueConfig, SdnmqConfig};
use sdnmq_bridge::packet::run_publisher;
use sdnmq_bridge::{
    run_listener, FlowProgrammer, PacketForwarder, PacketInHandler, SimulatedController,
};
use sdnmq_broker::{BrokerError, MemoryBroker, MessagePublisher, MessageReceiver, RedisBroker};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const FLOW_PROGRAMMER_TASK: &str = "flowprogrammer";
pub const PACKET_OUT_TASK: &str = "packetout";
pub const PACKET_IN_TASK: &str = "packetin";

/// Errors that stop the daemon from starting.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Running bridge: the controller it drives and the tasks serving it.
pub struct Bridge {
    controller: Arc<SimulatedController>,
    programmer: Arc<FlowProgrammer>,
    tasks: Vec<(&'static str, JoinHandle<u64>)>,
}

impl Bridge {
    /// Spawns the listener and publisher tasks on the current runtime and
    /// registers the packet-in handler with `controller`.
    pub fn spawn<F, P, T>(
        controller: Arc<SimulatedController>,
        flow_requests: F,
        packet_out_requests: P,
        packet_in: T,
        shutdown: &CancellationToken,
    ) -> Self
    where
        F: MessageReceiver + 'static,
        P: MessageReceiver + 'static,
        T: MessagePublisher + 'static,
    {
        let programmer = Arc::new(FlowProgrammer::new(controller.clone()));
        let forwarder = Arc::new(PacketForwarder::new(controller.clone(), controller.clone()));
        let (handler, events) = PacketInHandler::new(controller.clone());
        controller.register_listener(Arc::new(handler));

        let tasks = vec![
            (
                FLOW_PROGRAMMER_TASK,
                tokio::spawn(run_listener(
                    FLOW_PROGRAMMER_TASK,
                    flow_requests,
                    programmer.clone(),
                    shutdown.clone(),
                )),
            ),
            (
                PACKET_OUT_TASK,
                tokio::spawn(run_listener(
                    PACKET_OUT_TASK,
                    packet_out_requests,
                    forwarder,
                    shutdown.clone(),
                )),
            ),
            (
                PACKET_IN_TASK,
                tokio::spawn(run_publisher(events, packet_in, shutdown.clone())),
            ),
        ];

        Self {
            controller,
            programmer,
            tasks,
        }
    }

    /// Spawns a bridge serving the queues of an in-process broker.
    pub fn spawn_memory(
        controller: Arc<SimulatedController>,
        broker: &MemoryBroker,
        queues: &QueueConfig,
        shutdown: &CancellationToken,
    ) -> Result<Self, DaemonError> {
        let flow_requests = broker.queue_receiver(&queues.flow_programmer)?;
        let packet_out_requests = broker.queue_receiver(&queues.packet_out)?;
        Ok(Self::spawn(
            controller,
            flow_requests,
            packet_out_requests,
            broker.topic_publisher(&queues.packet_in),
            shutdown,
        ))
    }

    pub fn controller(&self) -> &Arc<SimulatedController> {
        &self.controller
    }

    pub fn programmer(&self) -> &Arc<FlowProgrammer> {
        &self.programmer
    }

    /// Waits for every task to stop. Returns the number of messages each
    /// task handled, in spawn order.
    pub async fn join(self) -> Vec<(&'static str, u64)> {
        let mut counts = Vec::with_capacity(self.tasks.len());
        for (name, task) in self.tasks {
            match task.await {
                Ok(count) => {
                    info!(task = name, count, "Task stopped");
                    counts.push((name, count));
                }
                Err(e) => error!(task = name, error = %e, "Task failed"),
            }
        }
        counts
    }
}

/// Runs the daemon until `shutdown` is cancelled.
pub async fn run(config: SdnmqConfig, shutdown: CancellationToken) -> Result<(), DaemonError> {
    config.validate()?;

    let controller = Arc::new(config.topology.build_controller()?);
    let queues = &config.queues;
    info!(
        backend = ?config.broker.backend,
        nodes = controller.nodes().len(),
        flow_programmer = %queues.flow_programmer,
        packet_out = %queues.packet_out,
        packet_in = %queues.packet_in,
        "Starting bridge"
    );

    let bridge = match config.broker.backend {
        BrokerBackend::Memory => {
            warn!("Memory broker selected, other processes cannot reach the bridge");
            let broker = MemoryBroker::new();
            Bridge::spawn_memory(controller, &broker, queues, &shutdown)?
        }
        BrokerBackend::Redis => {
            let broker = RedisBroker::connect(config.broker.redis.clone()).await?;
            Bridge::spawn(
                controller,
                broker.queue_receiver(&queues.flow_programmer).await?,
                broker.queue_receiver(&queues.packet_out).await?,
                broker.topic_publisher(&queues.packet_in),
                &shutdown,
            )
        }
    };

    let counts = bridge.join().await;
    info!(?counts, "Bridge stopped");
    Ok(())
}
