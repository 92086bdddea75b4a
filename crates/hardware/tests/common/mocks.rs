use entangler_core::core::registers::Role;
use entangler_core::core::sync::{LinkLines, Progress, SyncController, SyncPhase, SyncVerdict};
use mockall::mock;
use std::fmt;
use std::sync::{Arc, Mutex};

mock! {
    pub Controller {
        pub fn role(&self) -> Role;
        pub fn on_enable(&mut self) -> SyncVerdict;
        pub fn on_partner_signal(&mut self, phase: SyncPhase, lines: &LinkLines) -> SyncVerdict;
        pub fn on_tick(&mut self, phase: SyncPhase, progress: &Progress) -> LinkLines;
        pub fn heralds_locally(&self) -> bool;
    }
}

/// A thread-safe wrapper that lets the mock stand in for a real controller.
///
/// The test keeps a clone of the handle to inspect or extend expectations
/// after the sequencer has taken ownership of its copy.
#[derive(Clone)]
pub struct ScriptedSync {
    pub mock: Arc<Mutex<MockController>>,
}

impl ScriptedSync {
    pub fn new(mock: MockController) -> Self {
        Self {
            mock: Arc::new(Mutex::new(mock)),
        }
    }

    pub fn boxed(&self) -> Box<dyn SyncController> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for ScriptedSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScriptedSync")
    }
}

impl SyncController for ScriptedSync {
    fn role(&self) -> Role {
        self.mock.lock().unwrap().role()
    }

    fn on_enable(&mut self) -> SyncVerdict {
        self.mock.lock().unwrap().on_enable()
    }

    fn on_partner_signal(&mut self, phase: SyncPhase, lines: &LinkLines) -> SyncVerdict {
        self.mock.lock().unwrap().on_partner_signal(phase, lines)
    }

    fn on_tick(&mut self, phase: SyncPhase, progress: &Progress) -> LinkLines {
        self.mock.lock().unwrap().on_tick(phase, progress)
    }

    fn heralds_locally(&self) -> bool {
        self.mock.lock().unwrap().heralds_locally()
    }
}
