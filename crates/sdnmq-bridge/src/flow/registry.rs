//! Registry of installed flows, keyed by the requester's flow name.
//!
//! Each name is either absent or installed. An entry is only written after
//! the flow table service reported success, and is only removed after a
//! successful remove, so the registry never holds a rule the device does not
//! have (or lacks one it has).
//!
//! One mutex guards the whole map and is held across the flow table call.
//! Requests for any flow name are therefore serialized, and at most one
//! external call is in flight at a time.

use crate::error::{BridgeError, BridgeResult};
use crate::flow::types::FlowRule;
use crate::services::FlowTableService;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// What a successful flow request did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Installed,
    Replaced,
    Removed,
}

/// Flow name to installed rule.
pub struct FlowRegistry {
    flow_table: Arc<dyn FlowTableService>,
    flows: Mutex<HashMap<String, FlowRule>>,
}

impl FlowRegistry {
    pub fn new(flow_table: Arc<dyn FlowTableService>) -> Self {
        Self {
            flow_table,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Installs `rule` under `name`, replacing the rule already installed
    /// under that name if there is one.
    pub fn install_or_replace(&self, name: &str, rule: FlowRule) -> BridgeResult<FlowOutcome> {
        let mut flows = self.flows.lock();

        let outcome = match flows.get(name) {
            Some(old) => {
                debug!(flow = name, node = %rule.node, "Replacing flow");
                self.flow_table
                    .replace(&rule.node, old, &rule)
                    .into_result("replace")?;
                FlowOutcome::Replaced
            }
            None => {
                debug!(flow = name, node = %rule.node, "Installing flow");
                self.flow_table
                    .install(&rule.node, &rule)
                    .into_result("install")?;
                FlowOutcome::Installed
            }
        };

        info!(flow = name, node = %rule.node, ?outcome, "Flow programmed");
        flows.insert(name.to_string(), rule);
        Ok(outcome)
    }

    /// Removes the flow installed under `name`.
    pub fn remove(&self, name: &str) -> BridgeResult<FlowOutcome> {
        let mut flows = self.flows.lock();

        let rule = flows
            .get(name)
            .ok_or_else(|| BridgeError::not_found("flow", name))?;

        self.flow_table
            .remove(&rule.node, rule)
            .into_result("remove")?;

        info!(flow = name, node = %rule.node, "Flow removed");
        flows.remove(name);
        Ok(FlowOutcome::Removed)
    }

    /// Returns a copy of the rule installed under `name`.
    pub fn get(&self, name: &str) -> Option<FlowRule> {
        self.flows.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flows.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.lock().is_empty()
    }

    /// Returns the installed flow names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.flows.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::types::{ActionSpec, MatchSpec};
    use crate::services::{Status, StatusCode};
    use pretty_assertions::assert_eq;
    use sdnmq_types::NodeRef;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Install(FlowRule),
        Replace(FlowRule, FlowRule),
        Remove(FlowRule),
    }

    #[derive(Default)]
    struct RecordingFlowTable {
        calls: Mutex<Vec<Call>>,
        fail_with: Mutex<Option<StatusCode>>,
    }

    impl RecordingFlowTable {
        fn status(&self) -> Status {
            match *self.fail_with.lock() {
                Some(code) => Status::failure(code, "rejected"),
                None => Status::success(),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    impl FlowTableService for RecordingFlowTable {
        fn install(&self, _node: &NodeRef, rule: &FlowRule) -> Status {
            self.calls.lock().push(Call::Install(rule.clone()));
            self.status()
        }

        fn replace(&self, _node: &NodeRef, old: &FlowRule, new: &FlowRule) -> Status {
            self.calls.lock().push(Call::Replace(old.clone(), new.clone()));
            self.status()
        }

        fn remove(&self, _node: &NodeRef, rule: &FlowRule) -> Status {
            self.calls.lock().push(Call::Remove(rule.clone()));
            self.status()
        }
    }

    fn rule(priority: i16) -> FlowRule {
        FlowRule::new(
            NodeRef::openflow("1").unwrap(),
            MatchSpec::default(),
            vec![ActionSpec::Drop],
            priority,
        )
    }

    fn setup() -> (Arc<RecordingFlowTable>, FlowRegistry) {
        let table = Arc::new(RecordingFlowTable::default());
        let registry = FlowRegistry::new(table.clone());
        (table, registry)
    }

    #[test]
    fn test_flow_lifecycle() {
        let (table, registry) = setup();
        let (a, b) = (rule(1), rule(2));

        assert_eq!(registry.install_or_replace("f1", a.clone()).unwrap(), FlowOutcome::Installed);
        assert_eq!(registry.install_or_replace("f1", b.clone()).unwrap(), FlowOutcome::Replaced);
        assert_eq!(registry.get("f1"), Some(b.clone()));
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove("f1").unwrap(), FlowOutcome::Removed);
        assert!(!registry.contains("f1"));

        assert_eq!(
            table.calls(),
            vec![
                Call::Install(a.clone()),
                Call::Replace(a, b.clone()),
                Call::Remove(b),
            ]
        );
    }

    #[test]
    fn test_delete_unknown_flow() {
        let (table, registry) = setup();
        assert_eq!(registry.remove("unknown"), Err(BridgeError::not_found("flow", "unknown")));
        assert!(table.calls().is_empty());
    }

    #[test]
    fn test_failed_install_leaves_registry_unchanged() {
        let (table, registry) = setup();
        *table.fail_with.lock() = Some(StatusCode::InternalError);

        let err = registry.install_or_replace("f1", rule(1)).unwrap_err();
        assert!(matches!(err, BridgeError::ExternalServiceFailure { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_replace_keeps_old_rule() {
        let (table, registry) = setup();
        registry.install_or_replace("f1", rule(1)).unwrap();
        *table.fail_with.lock() = Some(StatusCode::Conflict);

        assert!(registry.install_or_replace("f1", rule(2)).is_err());
        assert_eq!(registry.get("f1"), Some(rule(1)));
    }

    #[test]
    fn test_failed_remove_keeps_entry() {
        let (table, registry) = setup();
        registry.install_or_replace("f1", rule(1)).unwrap();
        *table.fail_with.lock() = Some(StatusCode::Unavailable);

        assert!(registry.remove("f1").is_err());
        assert!(registry.contains("f1"));
        assert_eq!(registry.names(), vec!["f1".to_string()]);
    }

    /// Counts flow table calls that overlap in time.
    #[derive(Default)]
    struct OverlapFlowTable {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        installs: AtomicUsize,
        replaces: AtomicUsize,
        removes: AtomicUsize,
    }

    impl OverlapFlowTable {
        fn call(&self, counter: &AtomicUsize) -> Status {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Status::success()
        }
    }

    impl FlowTableService for OverlapFlowTable {
        fn install(&self, _node: &NodeRef, _rule: &FlowRule) -> Status {
            self.call(&self.installs)
        }

        fn replace(&self, _node: &NodeRef, _old: &FlowRule, _new: &FlowRule) -> Status {
            self.call(&self.replaces)
        }

        fn remove(&self, _node: &NodeRef, _rule: &FlowRule) -> Status {
            self.call(&self.removes)
        }
    }

    #[test]
    fn test_concurrent_requests_are_serialized() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 5;

        let table = Arc::new(OverlapFlowTable::default());
        let registry = FlowRegistry::new(table.clone());

        thread::scope(|scope| {
            for t in 0..THREADS {
                let registry = &registry;
                scope.spawn(move || {
                    let own = format!("t{}", t);
                    for round in 0..ROUNDS {
                        registry
                            .install_or_replace("shared", rule((t * ROUNDS + round) as i16))
                            .unwrap();
                        registry.install_or_replace(&own, rule(round as i16)).unwrap();
                        if round % 2 == 0 {
                            registry.remove(&own).unwrap();
                        }
                    }
                });
            }
        });

        assert_eq!(table.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(table.in_flight.load(Ordering::SeqCst), 0);

        // Own flows are removed in the last round; only the shared one stays.
        assert_eq!(registry.names(), vec!["shared".to_string()]);
        assert!(registry.get("shared").is_some());

        // Own flows: installed on rounds 0, 1 and 3, replaced on rounds 2 and
        // 4, removed on rounds 0, 2 and 4. Shared flow: one install, every
        // other call replaces.
        let per_thread_installs = 3;
        let per_thread_replaces = 2;
        let per_thread_removes = 3;
        assert_eq!(
            table.installs.load(Ordering::SeqCst),
            1 + THREADS * per_thread_installs
        );
        assert_eq!(
            table.replaces.load(Ordering::SeqCst),
            THREADS * ROUNDS - 1 + THREADS * per_thread_replaces
        );
        assert_eq!(
            table.removes.load(Ordering::SeqCst),
            THREADS * per_thread_removes
        );
    }
}
