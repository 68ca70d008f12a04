//! Collection plan printed by `collector collect`.

use std::rc::Rc;

use serde::Serialize;

use crate::core::resolve::Backend;
use crate::core::rules::{BuildRule, Suite};

/// Settings key listing the packages of the suite pool.
pub const SUITES: &str = "SUITES";

/// A suite known only by package, narrowed by the rules assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSuite {
    package: String,
    rules: Vec<Rc<BuildRule>>,
}

impl PlannedSuite {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            rules: Vec::new(),
        }
    }

    /// Selectors narrowing this suite, in declaration order.
    pub fn targets(&self) -> Vec<String> {
        self.rules.iter().rev().map(|rule| rule.to_string()).collect()
    }
}

impl Suite for PlannedSuite {
    fn package_name(&self) -> &str {
        &self.package
    }

    fn assign_build_rule(&mut self, rule: Rc<BuildRule>) {
        self.rules.push(rule);
    }

    fn is_built(&self) -> bool {
        !self.rules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub package: String,
    pub built: bool,
    pub targets: Vec<String>,
}

impl From<&PlannedSuite> for PlanEntry {
    fn from(suite: &PlannedSuite) -> Self {
        Self {
            package: suite.package.clone(),
            built: suite.is_built(),
            targets: suite.targets(),
        }
    }
}

/// Ordered suites of one run plus the execution mode they will run under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub backend: Backend,
    pub verbose: bool,
    pub suites: Vec<PlanEntry>,
}

impl Plan {
    pub fn render_text(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&format!("backend: {}\n", self.backend));
        for entry in &self.suites {
            if entry.targets.is_empty() {
                buf.push_str(&format!("{}\n", entry.package));
            } else {
                buf.push_str(&format!("{} [{}]\n", entry.package, entry.targets.join(", ")));
            }
        }
        buf
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        let mut payload = serde_json::to_string_pretty(self)?;
        payload.push('\n');
        Ok(payload)
    }
}
