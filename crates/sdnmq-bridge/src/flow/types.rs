//! Flow rule model: matches, actions, rules and request commands.

use crate::error::BridgeError;
use sdnmq_types::{DlAddress, NodeRef, PortRef};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A network address match with optional mask.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetMatch {
    pub addr: IpAddr,
    pub mask: Option<IpAddr>,
}

impl NetMatch {
    pub fn exact(addr: IpAddr) -> Self {
        Self { addr, mask: None }
    }

    pub fn masked(addr: IpAddr, mask: IpAddr) -> Self {
        Self {
            addr,
            mask: Some(mask),
        }
    }
}

impl fmt::Display for NetMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mask {
            Some(mask) => write!(f, "{}/{}", self.addr, mask),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// Sparse flow match. `None` fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MatchSpec {
    pub in_port: Option<PortRef>,
    pub dl_src: Option<DlAddress>,
    pub dl_dst: Option<DlAddress>,
    /// 12-bit VLAN id
    pub dl_vlan: Option<u16>,
    /// 3-bit VLAN priority
    pub dl_vlan_pr: Option<u8>,
    pub dl_type: Option<u16>,
    pub nw_src: Option<NetMatch>,
    pub nw_dst: Option<NetMatch>,
    pub nw_tos: Option<u8>,
    pub nw_proto: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl MatchSpec {
    /// Returns true if every field is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        *self == MatchSpec::default()
    }
}

/// Closed vocabulary of action type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Loopback,
    Output,
    Flood,
    Drop,
    Controller,
    SetDlSrc,
    SetDlDst,
    SetNwSrc,
    SetNwDst,
    SetTpSrc,
    SetTpDst,
    PushVlan,
    PopVlan,
}

impl ActionType {
    pub const ALL: [ActionType; 13] = [
        ActionType::Loopback,
        ActionType::Output,
        ActionType::Flood,
        ActionType::Drop,
        ActionType::Controller,
        ActionType::SetDlSrc,
        ActionType::SetDlDst,
        ActionType::SetNwSrc,
        ActionType::SetNwDst,
        ActionType::SetTpSrc,
        ActionType::SetTpDst,
        ActionType::PushVlan,
        ActionType::PopVlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Loopback => "loopback",
            ActionType::Output => "output",
            ActionType::Flood => "flood",
            ActionType::Drop => "drop",
            ActionType::Controller => "controller",
            ActionType::SetDlSrc => "setDlSrc",
            ActionType::SetDlDst => "setDlDst",
            ActionType::SetNwSrc => "setNwSrc",
            ActionType::SetNwDst => "setNwDst",
            ActionType::SetTpSrc => "setTpSrc",
            ActionType::SetTpDst => "setTpDst",
            ActionType::PushVlan => "pushVLAN",
            ActionType::PopVlan => "popVLAN",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BridgeError::unsupported("action", s))
    }
}

/// A flow action. Action lists are applied in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionSpec {
    Loopback,
    Drop,
    Controller,
    Output(PortRef),
    SetDlSrc(DlAddress),
    SetDlDst(DlAddress),
    SetNwSrc(IpAddr),
    SetNwDst(IpAddr),
    SetTpSrc(u16),
    SetTpDst(u16),
    /// Push an 802.1Q tag: 3-bit priority, 1-bit drop eligible, 12-bit id.
    PushVlan { pcp: u8, dei: u8, vid: u16 },
    PopVlan,
}

impl ActionSpec {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionSpec::Loopback => ActionType::Loopback,
            ActionSpec::Drop => ActionType::Drop,
            ActionSpec::Controller => ActionType::Controller,
            ActionSpec::Output(_) => ActionType::Output,
            ActionSpec::SetDlSrc(_) => ActionType::SetDlSrc,
            ActionSpec::SetDlDst(_) => ActionType::SetDlDst,
            ActionSpec::SetNwSrc(_) => ActionType::SetNwSrc,
            ActionSpec::SetNwDst(_) => ActionType::SetNwDst,
            ActionSpec::SetTpSrc(_) => ActionType::SetTpSrc,
            ActionSpec::SetTpDst(_) => ActionType::SetTpDst,
            ActionSpec::PushVlan { .. } => ActionType::PushVlan,
            ActionSpec::PopVlan => ActionType::PopVlan,
        }
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSpec::Output(port) => write!(f, "output={}", port.id()),
            ActionSpec::SetDlSrc(addr) | ActionSpec::SetDlDst(addr) => {
                write!(f, "{}={}", self.action_type(), addr)
            }
            ActionSpec::SetNwSrc(addr) | ActionSpec::SetNwDst(addr) => {
                write!(f, "{}={}", self.action_type(), addr)
            }
            ActionSpec::SetTpSrc(port) | ActionSpec::SetTpDst(port) => {
                write!(f, "{}={}", self.action_type(), port)
            }
            ActionSpec::PushVlan { pcp, dei, vid } => {
                write!(f, "pushVLAN=pcp:{},dei:{},vid:{}", pcp, dei, vid)
            }
            _ => write!(f, "{}", self.action_type()),
        }
    }
}

/// A flow rule bound to the node it is programmed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowRule {
    pub match_spec: MatchSpec,
    pub actions: Vec<ActionSpec>,
    pub priority: i16,
    pub node: NodeRef,
}

impl FlowRule {
    pub fn new(
        node: NodeRef,
        match_spec: MatchSpec,
        actions: Vec<ActionSpec>,
        priority: i16,
    ) -> Self {
        Self {
            match_spec,
            actions,
            priority,
            node,
        }
    }
}

/// Flow programming commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowCommand {
    Add,
    Modify,
    Delete,
}

impl FlowCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowCommand::Add => "add",
            FlowCommand::Modify => "modify",
            FlowCommand::Delete => "delete",
        }
    }
}

impl fmt::Display for FlowCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowCommand {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(FlowCommand::Add),
            "modify" => Ok(FlowCommand::Modify),
            "delete" => Ok(FlowCommand::Delete),
            _ => Err(BridgeError::unsupported("command", s)),
        }
    }
}
