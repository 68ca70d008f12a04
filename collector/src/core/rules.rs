//! Build rules and their assignment to suites.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use crate::core::selector::Selector;

/// A resolved selector bound to the package of the suite it configures.
///
/// Rules are shared as `Rc<BuildRule>` and compared by identity when they are
/// removed from a pool: two rules with equal fields are still distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRule {
    pub package: String,
    pub case: Option<String>,
    pub test: Option<String>,
}

impl BuildRule {
    pub fn new(package: impl Into<String>, case: Option<String>, test: Option<String>) -> Self {
        Self {
            package: package.into(),
            case,
            test,
        }
    }

    pub fn from_selector(selector: Selector) -> Self {
        Self {
            package: selector.suite,
            case: selector.case,
            test: selector.test,
        }
    }
}

impl fmt::Display for BuildRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.package)?;
        if let Some(case) = &self.case {
            write!(f, ":{case}")?;
            if let Some(test) = &self.test {
                write!(f, ".{test}")?;
            }
        }
        Ok(())
    }
}

/// Pending rules of one collection run, in declaration order.
pub type RulePool = Vec<Rc<BuildRule>>;

/// What the collector needs from a suite.
pub trait Suite {
    fn package_name(&self) -> &str;

    /// Narrow the suite with `rule`. Later assignments may overwrite earlier ones.
    fn assign_build_rule(&mut self, rule: Rc<BuildRule>);

    fn is_built(&self) -> bool;
}

/// Apply every pending rule for `suite`'s package and remove those rules from
/// `pool`.
///
/// Matches are applied last-declared first, so the first declared rule is the
/// one that ends up in effect. Non-matching rules keep their relative order.
/// Returns the number of rules applied.
pub fn try_apply_rules<S>(suite: &mut S, pool: &mut RulePool) -> usize
where
    S: Suite + ?Sized,
{
    let matched: Vec<Rc<BuildRule>> = pool
        .iter()
        .filter(|rule| rule.package == suite.package_name())
        .cloned()
        .collect();
    if matched.is_empty() {
        return 0;
    }

    for rule in matched.iter().rev() {
        suite.assign_build_rule(Rc::clone(rule));
    }
    pool.retain(|rule| !matched.iter().any(|applied| Rc::ptr_eq(applied, rule)));

    debug!(
        package = suite.package_name(),
        applied = matched.len(),
        pending = pool.len(),
        built = suite.is_built(),
        "applied build rules"
    );
    matched.len()
}
