//! The stage palette.
//!
//! Every stage takes the scan context, mutates it, and either passes it on
//! or short-circuits the rest of the chain. The palette is closed: the
//! factory composes chains out of these types only.

pub mod agent_list;
pub mod details;
pub mod dispatch;
pub mod inventory_sync;
pub mod matching;
pub mod os_scanner;
pub mod package_scanner;

use crate::context::ScanContext;
use crate::error::ScanError;
use std::sync::Arc;
use tracing::debug;

/// Whether the chain keeps running after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Terminal: no further stage runs for this event.
    Halt,
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn process(&self, ctx: &mut ScanContext) -> Result<Flow, ScanError>;
}

/// An ordered stage chain produced by the factory.
pub type Chain = Vec<Arc<dyn Stage>>;

/// Run a context through a chain in a single traversal.
pub fn run_chain(chain: &Chain, ctx: &mut ScanContext) -> Result<(), ScanError> {
    for stage in chain {
        match stage.process(ctx)? {
            Flow::Continue => {}
            Flow::Halt => {
                debug!(stage = stage.name(), "chain halted");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScanContext;
    use crate::message::ScannerType;
    use std::sync::Mutex;
    use vdscan_core::model::AgentInfo;

    struct Recorder {
        label: &'static str,
        flow: Flow,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn process(&self, _ctx: &mut ScanContext) -> Result<Flow, ScanError> {
            self.seen.lock().unwrap().push(self.label);
            Ok(self.flow)
        }
    }

    fn ctx() -> ScanContext {
        ScanContext::control(ScannerType::PackageInsert, AgentInfo::default())
    }

    #[test]
    fn chain_runs_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = vec![
            Arc::new(Recorder {
                label: "first",
                flow: Flow::Continue,
                seen: seen.clone(),
            }),
            Arc::new(Recorder {
                label: "second",
                flow: Flow::Continue,
                seen: seen.clone(),
            }),
        ];

        run_chain(&chain, &mut ctx()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn halt_short_circuits() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = vec![
            Arc::new(Recorder {
                label: "first",
                flow: Flow::Halt,
                seen: seen.clone(),
            }),
            Arc::new(Recorder {
                label: "unreached",
                flow: Flow::Continue,
                seen: seen.clone(),
            }),
        ];

        run_chain(&chain, &mut ctx()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first"]);
    }
}
