//! sdnmq-cli: client for an SDN-MQ bridge running on a Redis broker.
//!
//! Sends flow programming and packet-out requests, and prints packet-in
//! events matching attribute filters.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sdnmq_bridge::attributes::{
    filter_attributes, DEFAULT_FLOW_PROGRAMMER_QUEUE, DEFAULT_PACKET_IN_TOPIC,
    DEFAULT_PACKET_OUT_QUEUE,
};
use sdnmq_bridge::flow::{decode_action_list, decode_match, FlowRule};
use sdnmq_bridge::packet::builder::{FrameBuilder, Transport};
use sdnmq_bridge::packet::OutboundPacket;
use sdnmq_bridge::{FlowProgrammerRequest, PacketForwardRequest};
use sdnmq_broker::{
    AttributeFilter, BrokerMessage, MessagePublisher, MessageReceiver, RedisBroker,
    RedisBrokerConfig,
};
use sdnmq_types::{DlAddress, NodeRef, PortRef, NODE_TYPE_OF};
use sdnmqd::config::{ENV_FLOW_PROGRAMMER_QUEUE, ENV_PACKET_IN_TOPIC, ENV_PACKET_OUT_QUEUE};
use serde_json::Value;
use std::net::Ipv4Addr;
use tracing_subscriber::EnvFilter;

/// SDN-MQ client
#[derive(Parser, Debug)]
#[command(name = "sdnmq-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Redis broker URL
    #[arg(long, env = "SDNMQ_REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    /// Flow programming request queue
    #[arg(long, env = ENV_FLOW_PROGRAMMER_QUEUE, default_value = DEFAULT_FLOW_PROGRAMMER_QUEUE)]
    flow_queue: String,

    /// Packet forwarding request queue
    #[arg(long, env = ENV_PACKET_OUT_QUEUE, default_value = DEFAULT_PACKET_OUT_QUEUE)]
    packet_out_queue: String,

    /// Packet-in topic
    #[arg(long, env = ENV_PACKET_IN_TOPIC, default_value = DEFAULT_PACKET_IN_TOPIC)]
    packet_in_topic: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a named flow, or replace it with --modify
    AddFlow(FlowArgs),

    /// Remove a named flow
    DeleteFlow {
        /// Flow name
        #[arg(short, long)]
        name: String,
    },

    /// Send a frame out of a switch port
    SendPacket(PacketArgs),

    /// Print packet-in events
    Subscribe(SubscribeArgs),
}

#[derive(clap::Args, Debug)]
struct FlowArgs {
    /// Flow name
    #[arg(short, long)]
    name: String,

    /// Node id
    #[arg(long)]
    node: String,

    /// Node type
    #[arg(long, default_value = NODE_TYPE_OF)]
    node_type: String,

    /// Match as JSON, e.g. '{"ingressPort":"1","etherType":2048}'
    #[arg(short, long = "match", default_value = "{}")]
    match_json: String,

    /// Actions as a JSON array, e.g. '[{"action":"output","port":"2"}]'
    #[arg(short, long)]
    actions: String,

    /// Flow priority
    #[arg(short, long, default_value = "0")]
    priority: i16,

    /// Replace an existing flow instead of adding one
    #[arg(long)]
    modify: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Protocol {
    Tcp,
    Udp,
}

#[derive(clap::Args, Debug)]
struct PacketArgs {
    /// Node id
    #[arg(long)]
    node: String,

    /// Node type
    #[arg(long, default_value = NODE_TYPE_OF)]
    node_type: String,

    /// Egress port
    #[arg(long)]
    port: String,

    /// Source MAC address
    #[arg(long, default_value = "00:00:00:00:00:01")]
    src_mac: String,

    /// Destination MAC address
    #[arg(long, default_value = "FF:FF:FF:FF:FF:FF")]
    dst_mac: String,

    /// 802.1Q VLAN id
    #[arg(long)]
    vlan: Option<u16>,

    /// 802.1Q priority code point
    #[arg(long, default_value = "0")]
    pcp: u8,

    /// Source IPv4 address
    #[arg(long, requires = "dst_ip")]
    src_ip: Option<Ipv4Addr>,

    /// Destination IPv4 address
    #[arg(long, requires = "src_ip")]
    dst_ip: Option<Ipv4Addr>,

    /// IPv4 type of service
    #[arg(long, default_value = "0")]
    tos: u8,

    /// Transport protocol
    #[arg(long, value_enum, requires = "src_ip")]
    protocol: Option<Protocol>,

    /// Transport source port
    #[arg(long, default_value = "0")]
    sport: u16,

    /// Transport destination port
    #[arg(long, default_value = "0")]
    dport: u16,

    /// Payload text
    #[arg(long, default_value = "")]
    payload: String,
}

#[derive(clap::Args, Debug)]
struct SubscribeArgs {
    /// Attribute filter key=value, may be repeated
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// Only events whose IPv4 source lies in this subnet (a.b.c.d/len)
    #[arg(long)]
    src_subnet: Option<String>,

    /// Only events whose IPv4 destination lies in this subnet (a.b.c.d/len)
    #[arg(long)]
    dst_subnet: Option<String>,

    /// Exit after this many events
    #[arg(short, long)]
    count: Option<u64>,
}

fn parse_cidr(text: &str) -> Result<(Ipv4Addr, u8)> {
    let (addr, len) = text
        .split_once('/')
        .ok_or_else(|| anyhow!("expected a.b.c.d/len, got '{}'", text))?;
    let addr: Ipv4Addr = addr
        .trim()
        .parse()
        .with_context(|| format!("invalid subnet address '{}'", addr))?;
    let len: u8 = len
        .trim()
        .parse()
        .with_context(|| format!("invalid prefix length '{}'", len))?;
    Ok((addr, len))
}

fn parse_ethernet(text: &str) -> Result<[u8; 6]> {
    let mac: DlAddress = text.parse()?;
    mac.as_bytes()
        .try_into()
        .map_err(|_| anyhow!("'{}' is not a 48-bit MAC address", text))
}

fn flow_request(args: &FlowArgs) -> Result<FlowProgrammerRequest> {
    let node = NodeRef::new(&args.node_type, &args.node)?;
    let match_json: Value =
        serde_json::from_str(&args.match_json).context("match is not valid JSON")?;
    let actions_json: Value =
        serde_json::from_str(&args.actions).context("actions are not valid JSON")?;

    let match_spec = decode_match(&node, &match_json)?;
    let actions = decode_action_list(&node, &actions_json)?;
    let rule = FlowRule::new(node, match_spec, actions, args.priority);

    Ok(if args.modify {
        FlowProgrammerRequest::modify(&args.name, rule)
    } else {
        FlowProgrammerRequest::add(&args.name, rule)
    })
}

fn forward_request(args: &PacketArgs) -> Result<PacketForwardRequest> {
    let node = NodeRef::new(&args.node_type, &args.node)?;
    let egress = PortRef::resolve(&node, &args.port)?;

    let mut frame = FrameBuilder::new(
        parse_ethernet(&args.src_mac)?,
        parse_ethernet(&args.dst_mac)?,
    );
    if let Some(vlan) = args.vlan {
        frame = frame.vlan(args.pcp, vlan);
    }
    if let (Some(src), Some(dst)) = (args.src_ip, args.dst_ip) {
        frame = frame.ipv4(src, dst).tos(args.tos);
        if let Some(protocol) = args.protocol {
            let transport = match protocol {
                Protocol::Tcp => Transport::Tcp,
                Protocol::Udp => Transport::Udp,
            };
            frame = frame.transport(transport, args.sport, args.dport);
        }
    }
    let data = frame.payload(args.payload.as_bytes()).build()?;

    Ok(PacketForwardRequest::new(OutboundPacket::new(egress, data)))
}

fn subscription_filter(args: &SubscribeArgs) -> Result<AttributeFilter> {
    let mut filter = AttributeFilter::any();
    for text in &args.filters {
        filter = filter.and(text.parse::<AttributeFilter>().map_err(|e| anyhow!(e))?);
    }
    for (key, subnet) in [
        (filter_attributes::NW_SRC_BINARY, &args.src_subnet),
        (filter_attributes::NW_DST_BINARY, &args.dst_subnet),
    ] {
        if let Some(subnet) = subnet {
            let (addr, len) = parse_cidr(subnet)?;
            filter = filter.and(AttributeFilter::subnet(key, addr, len)?);
        }
    }
    Ok(filter)
}

async fn send(broker: &RedisBroker, queue: &str, message: BrokerMessage) -> Result<()> {
    broker
        .queue_sender(queue)
        .publish(message)
        .await
        .with_context(|| format!("failed to send to queue {}", queue))
}

async fn subscribe(broker: &RedisBroker, topic: &str, args: &SubscribeArgs) -> Result<()> {
    let filter = subscription_filter(args)?;
    eprintln!("Subscribed to {} where {}", topic, filter);

    let mut subscription = broker.subscribe(topic, filter).await?;
    let mut received: u64 = 0;

    loop {
        if args.count.is_some_and(|count| received >= count) {
            return Ok(());
        }

        let message = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            message = subscription.receive() => message?,
        };
        let Some(message) = message else {
            bail!("subscription to {} closed", topic);
        };

        let body = message.body_text().unwrap_or_default();
        match serde_json::from_str::<Value>(body) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{}", body),
        }
        received += 1;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let broker = RedisBroker::connect(RedisBrokerConfig::new(&cli.redis_url))
        .await
        .with_context(|| format!("failed to connect to {}", cli.redis_url))?;

    match &cli.command {
        Command::AddFlow(args) => {
            let request = flow_request(args)?;
            send(&broker, &cli.flow_queue, request.to_message()).await?;
            eprintln!("Sent {} for flow {}", request.command.as_str(), request.flow_name);
        }
        Command::DeleteFlow { name } => {
            let request = FlowProgrammerRequest::delete(name);
            send(&broker, &cli.flow_queue, request.to_message()).await?;
            eprintln!("Sent delete for flow {}", name);
        }
        Command::SendPacket(args) => {
            let request = forward_request(args)?;
            let len = request.packet.data.len();
            send(&broker, &cli.packet_out_queue, request.to_message()).await?;
            eprintln!("Sent {} byte frame out of {}", len, request.packet.egress);
        }
        Command::Subscribe(args) => subscribe(&broker, &cli.packet_in_topic, args).await?,
    }

    Ok(())
}
