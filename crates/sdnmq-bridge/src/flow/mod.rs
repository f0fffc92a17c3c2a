//! Flow programming: rule model, JSON codecs and the flow registry.

pub mod action_codec;
pub mod match_codec;
pub mod registry;
pub mod types;

pub use action_codec::{decode_action, decode_action_list, encode_action, encode_action_list};
pub use match_codec::{decode_match, encode_match};
pub use registry::{FlowOutcome, FlowRegistry};
pub use types::{ActionSpec, ActionType, FlowCommand, FlowRule, MatchSpec, NetMatch};
