//! Test-only fakes for suites and extensions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::collect::Extension;
use crate::core::rules::{BuildRule, Suite};

/// Suite that records every rule assigned to it, in assignment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeSuite {
    pub package: String,
    pub assigned: Vec<Rc<BuildRule>>,
}

impl FakeSuite {
    pub fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            assigned: Vec::new(),
        }
    }
}

impl Suite for FakeSuite {
    fn package_name(&self) -> &str {
        &self.package
    }

    fn assign_build_rule(&mut self, rule: Rc<BuildRule>) {
        self.assigned.push(rule);
    }

    fn is_built(&self) -> bool {
        !self.assigned.is_empty()
    }
}

/// Shared log of hook calls.
pub type Events = Rc<RefCell<Vec<&'static str>>>;

/// Extension that logs `clear`, `start` and `finish` calls.
pub struct RecordingExtension {
    name: String,
    events: Events,
}

impl RecordingExtension {
    pub fn new(name: &str) -> (Self, Events) {
        let events = Events::default();
        let extension = Self {
            name: name.to_string(),
            events: Rc::clone(&events),
        };
        (extension, events)
    }
}

impl Extension for RecordingExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear(&mut self) {
        self.events.borrow_mut().push("clear");
    }

    fn on_start(&mut self) {
        self.events.borrow_mut().push("start");
    }

    fn on_finish(&mut self) {
        self.events.borrow_mut().push("finish");
    }
}
