//! Lazy suite collection.
//!
//! Two traversals share one lifecycle (`idle → collecting → done`):
//!
//! - [`base`] streams an already known pool of suites.
//! - [`by_commands`] resolves selector-derived build rules against the pool
//!   and streams the suites they select.
//!
//! Nothing happens until the first item is pulled. Opening a traversal clears
//! the run's extensions and fires their start hooks; draining it fires the
//! finish hooks. Dropping a traversal early skips the finish hooks, so callers
//! that stop pulling and still need them must call
//! [`RunContext::finish`] themselves.

use std::mem;
use std::rc::Rc;
use std::time::{Duration, Instant};
use std::vec;

use tracing::{debug, info, warn};

use crate::core::rules::{BuildRule, RulePool, Suite, try_apply_rules};
use crate::core::selector::Selector;
use crate::core::settings::ConfigStore;
use crate::core::shuffle::{Shuffle, parse_shuffle};
use crate::error::{CollectError, LookupError};

/// Settings key holding the selector commands of a run.
pub const TESTS: &str = "TESTS";

/// Run-scoped hooks of an extension.
pub trait Extension {
    fn name(&self) -> &str;

    /// Reset per-run shared state.
    fn clear(&mut self) {}

    fn on_start(&mut self) {}

    fn on_finish(&mut self) {}
}

/// Extensions of one collection run, in chain order.
#[derive(Default)]
pub struct RunContext {
    extensions: Vec<Box<dyn Extension>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn clear(&mut self) {
        for extension in &mut self.extensions {
            extension.clear();
        }
    }

    pub fn start(&mut self) {
        for extension in &mut self.extensions {
            debug!(extension = extension.name(), "on_start");
            extension.on_start();
        }
    }

    pub fn finish(&mut self) {
        for extension in &mut self.extensions {
            debug!(extension = extension.name(), "on_finish");
            extension.on_finish();
        }
    }
}

/// Logs how long a traversal stayed open.
#[derive(Debug, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
}

impl Stopwatch {
    pub fn elapsed(&self) -> Option<Duration> {
        self.started.map(|started| started.elapsed())
    }
}

impl Extension for Stopwatch {
    fn name(&self) -> &str {
        "stopwatch"
    }

    fn clear(&mut self) {
        self.started = None;
    }

    fn on_start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn on_finish(&mut self) {
        if let Some(elapsed) = self.elapsed() {
            info!(elapsed_ms = elapsed.as_millis() as u64, "collection closed");
        }
    }
}

/// Resolves a suite name to its position in the pool.
pub trait SuiteLoader<S> {
    fn load_suite_by_name(&self, name: &str, suites: &[S]) -> Result<usize, LookupError>;
}

/// Finds the first suite whose package equals the name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLoader;

impl<S: Suite> SuiteLoader<S> for PackageLoader {
    fn load_suite_by_name(&self, name: &str, suites: &[S]) -> Result<usize, LookupError> {
        suites
            .iter()
            .position(|suite| suite.package_name() == name)
            .ok_or_else(|| LookupError::Suite(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Collecting,
    Done,
}

enum Source<I: Iterator> {
    Pending(I, Option<Shuffle>),
    Streaming(I),
    Buffered(vec::IntoIter<I::Item>),
    Spent,
}

/// Traversal over a known pool. See [`base`].
pub struct Base<'ctx, I: Iterator> {
    source: Source<I>,
    context: &'ctx mut RunContext,
    state: State,
    yielded: usize,
}

/// Stream `suites` in order, or in `shuffle` order.
///
/// Items pass through untouched, whatever their type. With a shuffle the
/// source is drained into memory on the first pull, so it must be finite.
pub fn base<I>(
    suites: I,
    shuffle: Option<Shuffle>,
    context: &mut RunContext,
) -> Base<'_, I::IntoIter>
where
    I: IntoIterator,
{
    Base {
        source: Source::Pending(suites.into_iter(), shuffle),
        context,
        state: State::Idle,
        yielded: 0,
    }
}

impl<I: Iterator> Base<'_, I> {
    fn open(&mut self) {
        self.source = match mem::replace(&mut self.source, Source::Spent) {
            Source::Pending(items, None) => Source::Streaming(items),
            Source::Pending(items, Some(shuffle)) => {
                let mut buffered: Vec<I::Item> = items.collect();
                shuffle.apply(&mut buffered);
                debug!(seed = shuffle.seed(), count = buffered.len(), "shuffled suites");
                Source::Buffered(buffered.into_iter())
            }
            other => other,
        };
        self.context.clear();
        self.context.start();
        self.state = State::Collecting;
    }

    fn pull(&mut self) -> Option<I::Item> {
        match &mut self.source {
            Source::Streaming(items) => items.next(),
            Source::Buffered(items) => items.next(),
            Source::Pending(..) | Source::Spent => None,
        }
    }
}

impl<I: Iterator> Iterator for Base<'_, I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Idle {
            self.open();
        }
        if self.state == State::Done {
            return None;
        }
        match self.pull() {
            Some(item) => {
                self.yielded += 1;
                Some(item)
            }
            None => {
                self.source = Source::Spent;
                self.state = State::Done;
                self.context.finish();
                info!(yielded = self.yielded, "collection finished");
                None
            }
        }
    }
}

/// Traversal driven by build rules. See [`by_commands`].
pub struct ByCommands<'ctx, S, L> {
    suites: Vec<S>,
    rules: RulePool,
    loader: L,
    shuffle: Option<Shuffle>,
    context: &'ctx mut RunContext,
    state: State,
    ready: vec::IntoIter<S>,
}

/// Stream the suites selected by `rules`.
///
/// On the first pull every rule's suite is loaded through `loader` and the
/// pending rules for it are applied with [`try_apply_rules`]. A suite selected
/// by several rules is yielded once, at its first selector. Rules still pending
/// afterwards, or a suite the loader cannot find, fail the traversal with one
/// [`CollectError`]; the extensions are then never cleared nor started.
pub fn by_commands<S, L>(
    suites: Vec<S>,
    rules: RulePool,
    loader: L,
    shuffle: Option<Shuffle>,
    context: &mut RunContext,
) -> ByCommands<'_, S, L>
where
    S: Suite,
    L: SuiteLoader<S>,
{
    ByCommands {
        suites,
        rules,
        loader,
        shuffle,
        context,
        state: State::Idle,
        ready: Vec::new().into_iter(),
    }
}

impl<S, L> ByCommands<'_, S, L>
where
    S: Suite,
    L: SuiteLoader<S>,
{
    fn resolve(&mut self) -> Result<Vec<S>, CollectError> {
        let selectors = self.rules.clone();
        let mut order: Vec<usize> = Vec::new();

        for rule in &selectors {
            if !self.rules.iter().any(|pending| Rc::ptr_eq(pending, rule)) {
                continue;
            }
            let index = self
                .loader
                .load_suite_by_name(&rule.package, &self.suites)
                .map_err(|err| {
                    warn!(rule = %rule, error = %err, "selector did not resolve");
                    CollectError::unresolved(rule)
                })?;
            let suite = self
                .suites
                .get_mut(index)
                .ok_or_else(|| CollectError::unresolved(rule))?;
            try_apply_rules(suite, &mut self.rules);
            if !order.contains(&index) {
                order.push(index);
            }
        }

        if let Some(rule) = self.rules.first() {
            warn!(rule = %rule, "build rule matched no collected suite");
            return Err(CollectError::unresolved(rule));
        }
        if let Some(shuffle) = self.shuffle {
            shuffle.apply(&mut order);
            debug!(seed = shuffle.seed(), count = order.len(), "shuffled suites");
        }

        let mut slots: Vec<Option<S>> = mem::take(&mut self.suites)
            .into_iter()
            .map(Some)
            .collect();
        Ok(order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect())
    }
}

impl<S, L> Iterator for ByCommands<'_, S, L>
where
    S: Suite,
    L: SuiteLoader<S>,
{
    type Item = Result<S, CollectError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Idle => match self.resolve() {
                Ok(resolved) => {
                    info!(suites = resolved.len(), "resolved selectors");
                    self.ready = resolved.into_iter();
                    self.context.clear();
                    self.context.start();
                    self.state = State::Collecting;
                }
                Err(err) => {
                    self.state = State::Done;
                    return Some(Err(err));
                }
            },
            State::Collecting => {}
            State::Done => return None,
        }
        match self.ready.next() {
            Some(suite) => Some(Ok(suite)),
            None => {
                self.state = State::Done;
                self.context.finish();
                None
            }
        }
    }
}

/// Either traversal, as picked by [`create_generator`].
pub enum Generator<'ctx, S, L> {
    Base(Base<'ctx, vec::IntoIter<S>>),
    ByCommands(ByCommands<'ctx, S, L>),
}

impl<S, L> Iterator for Generator<'_, S, L>
where
    S: Suite,
    L: SuiteLoader<S>,
{
    type Item = Result<S, CollectError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Generator::Base(inner) => inner.next().map(Ok),
            Generator::ByCommands(inner) => inner.next(),
        }
    }
}

/// Parse `TESTS` selectors into build rules, in command order.
pub fn rules_from_commands(commands: &[String]) -> RulePool {
    commands
        .iter()
        .map(|cmd| Rc::new(BuildRule::from_selector(Selector::parse(cmd))))
        .collect()
}

/// Pick the traversal for `config`.
///
/// Selector commands in `TESTS` drive [`by_commands`]; without them the whole
/// pool goes through [`base`]. The shuffle is read once from `config`.
pub fn create_generator<'ctx, S, L>(
    suites: Vec<S>,
    config: &ConfigStore,
    loader: L,
    context: &'ctx mut RunContext,
) -> Generator<'ctx, S, L>
where
    S: Suite,
    L: SuiteLoader<S>,
{
    let shuffle = parse_shuffle(config);
    let commands = config.string_list(TESTS);
    if commands.is_empty() {
        debug!(suites = suites.len(), "collecting every suite");
        return Generator::Base(base(suites, shuffle, context));
    }
    debug!(commands = commands.len(), "collecting by commands");
    let rules = rules_from_commands(&commands);
    Generator::ByCommands(by_commands(suites, rules, loader, shuffle, context))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::test_support::{FakeSuite, RecordingExtension};
    use toml::Value;

    fn suites(packages: &[&str]) -> Vec<FakeSuite> {
        packages.iter().map(|package| FakeSuite::new(package)).collect()
    }

    fn rule(package: &str, case: Option<&str>, test: Option<&str>) -> Rc<BuildRule> {
        Rc::new(BuildRule::new(
            package,
            case.map(str::to_string),
            test.map(str::to_string),
        ))
    }

    struct CountingLoader {
        calls: Rc<Cell<usize>>,
    }

    impl SuiteLoader<FakeSuite> for CountingLoader {
        fn load_suite_by_name(
            &self,
            name: &str,
            suites: &[FakeSuite],
        ) -> Result<usize, LookupError> {
            self.calls.set(self.calls.get() + 1);
            PackageLoader.load_suite_by_name(name, suites)
        }
    }

    #[test]
    fn base_yields_every_item_once_in_order() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);

        let collected: Vec<u32> = base(vec![3, 1, 2], None, &mut context).collect();

        assert_eq!(collected, vec![3, 1, 2]);
        assert_eq!(events.borrow().as_slice(), ["clear", "start", "finish"]);
    }

    #[test]
    fn base_hooks_fire_once_before_first_item() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);
        let mut traversal = base(suites(&["a"]), None, &mut context);

        let first = traversal.next().expect("one suite");
        assert_eq!(first.package, "a");
        assert_eq!(events.borrow().as_slice(), ["clear", "start"]);
    }

    #[test]
    fn base_is_type_agnostic() {
        let mut context = RunContext::new();
        let text: String = base("want2passaword".chars(), None, &mut context).collect();
        assert_eq!(text, "want2passaword");
    }

    #[test]
    fn base_hooks_fire_for_empty_pool() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);

        assert_eq!(base(Vec::<u8>::new(), None, &mut context).count(), 0);
        assert_eq!(events.borrow().as_slice(), ["clear", "start", "finish"]);
    }

    #[test]
    fn base_is_lazy() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);
        let pulled = Cell::new(0);
        let source = (0..).inspect(|_| pulled.set(pulled.get() + 1));

        let first: Vec<u64> = base(source, None, &mut context).take(3).collect();

        assert_eq!(first, vec![0, 1, 2]);
        assert_eq!(pulled.get(), 3);
        assert_eq!(events.borrow().as_slice(), ["clear", "start"]);
    }

    #[test]
    fn stopwatch_runs_between_start_and_clear() {
        let mut stopwatch = Stopwatch::default();
        assert!(stopwatch.elapsed().is_none());
        stopwatch.on_start();
        assert!(stopwatch.elapsed().is_some());
        stopwatch.on_finish();
        stopwatch.clear();
        assert!(stopwatch.elapsed().is_none());
    }

    #[test]
    fn base_with_shuffle_is_a_permutation() {
        let mut context = RunContext::new();
        let items: Vec<u32> = (0..20).collect();
        let mut shuffled: Vec<u32> =
            base(items.clone(), Some(Shuffle::new(3)), &mut context).collect();

        let mut expected = items.clone();
        Shuffle::new(3).apply(&mut expected);
        assert_eq!(shuffled, expected);
        shuffled.sort_unstable();
        assert_eq!(shuffled, items);
    }

    #[test]
    fn by_commands_applies_rules_and_yields_each_suite_once() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);
        let calls = Rc::new(Cell::new(0));
        let rules = vec![
            rule("a", Some("b"), Some("c")),
            rule("x", Some("y"), Some("z")),
            rule("a", Some("d"), None),
        ];

        let collected: Vec<FakeSuite> = by_commands(
            suites(&["x", "a", "unused"]),
            rules.clone(),
            CountingLoader {
                calls: Rc::clone(&calls),
            },
            None,
            &mut context,
        )
        .collect::<Result<_, _>>()
        .expect("collect");

        let packages: Vec<&str> = collected.iter().map(|s| s.package.as_str()).collect();
        assert_eq!(packages, vec!["a", "x"]);
        assert_eq!(calls.get(), 2);
        assert!(Rc::ptr_eq(&collected[0].assigned[0], &rules[2]));
        assert!(Rc::ptr_eq(&collected[0].assigned[1], &rules[0]));
        assert!(Rc::ptr_eq(&collected[1].assigned[0], &rules[1]));
        assert_eq!(events.borrow().as_slice(), ["clear", "start", "finish"]);
    }

    #[test]
    fn by_commands_unknown_suite_fails_without_hooks() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);
        let rules = vec![rule("a", None, None), rule("missing", Some("Case"), Some("t"))];

        let mut traversal = by_commands(suites(&["a"]), rules, PackageLoader, None, &mut context);
        let err = traversal
            .next()
            .expect("one item")
            .expect_err("unresolved");

        assert_eq!(
            err,
            CollectError::Unresolved {
                suite: "missing".to_string(),
                case: Some("Case".to_string()),
                test: Some("t".to_string()),
            }
        );
        assert!(traversal.next().is_none());
        drop(traversal);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn by_commands_rejects_rules_left_pending() {
        struct FirstSuiteLoader;
        impl SuiteLoader<FakeSuite> for FirstSuiteLoader {
            fn load_suite_by_name(&self, _: &str, _: &[FakeSuite]) -> Result<usize, LookupError> {
                Ok(0)
            }
        }

        let mut context = RunContext::new();
        let mut traversal = by_commands(
            suites(&["a"]),
            vec![rule("alias", None, None)],
            FirstSuiteLoader,
            None,
            &mut context,
        );
        let err = traversal.next().expect("item").expect_err("pending");
        assert!(matches!(err, CollectError::Unresolved { ref suite, .. } if suite == "alias"));
    }

    #[test]
    fn by_commands_without_rules_is_empty_and_still_opens() {
        let (extension, events) = RecordingExtension::new("ext");
        let mut context = RunContext::new().with_extension(extension);
        let collected = by_commands(
            suites(&["a"]),
            Vec::new(),
            PackageLoader,
            Some(Shuffle::new(1)),
            &mut context,
        )
        .count();
        assert_eq!(collected, 0);
        assert_eq!(events.borrow().as_slice(), ["clear", "start", "finish"]);
    }

    #[test]
    fn by_commands_shuffle_keeps_selected_set() {
        let mut context = RunContext::new();
        let rules = rules_from_commands(&["a".to_string(), "b".to_string(), "c".to_string()]);
        let mut packages: Vec<String> = by_commands(
            suites(&["a", "b", "c", "d"]),
            rules,
            PackageLoader,
            Some(Shuffle::new(11)),
            &mut context,
        )
        .map(|suite| suite.expect("suite").package)
        .collect();
        packages.sort();
        assert_eq!(packages, vec!["a", "b", "c"]);
    }

    #[test]
    fn create_generator_uses_commands_when_present() {
        let mut config = ConfigStore::new();
        config.set(TESTS, Value::Array(vec!["b:Case.test".into()]));
        let mut context = RunContext::new();

        let generator = create_generator(
            suites(&["a", "b"]),
            &config,
            PackageLoader,
            &mut context,
        );
        assert!(matches!(generator, Generator::ByCommands(_)));
        let collected: Vec<FakeSuite> = generator.collect::<Result<_, _>>().expect("collect");
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].assigned[0].case.as_deref(), Some("Case"));
        assert_eq!(collected[0].assigned[0].test.as_deref(), Some("test"));
    }

    #[test]
    fn create_generator_falls_back_to_whole_pool() {
        let config = ConfigStore::new();
        let mut context = RunContext::new();

        let generator = create_generator(
            suites(&["a", "b"]),
            &config,
            PackageLoader,
            &mut context,
        );
        assert!(matches!(generator, Generator::Base(_)));
        let packages: Vec<String> = generator
            .map(|suite| suite.expect("suite").package)
            .collect();
        assert_eq!(packages, vec!["a", "b"]);
    }

    #[test]
    fn create_generator_threads_shuffle_into_base() {
        let mut config = ConfigStore::new();
        config.set("RANDOM", Value::Boolean(true));
        config.set("RANDOM_SEED", Value::Integer(5));
        let packages: Vec<String> = (0..12).map(|i| format!("pkg{i}")).collect();
        let refs: Vec<&str> = packages.iter().map(String::as_str).collect();
        let mut context = RunContext::new();

        let collected: Vec<String> =
            create_generator(suites(&refs), &config, PackageLoader, &mut context)
                .map(|suite| suite.expect("suite").package)
                .collect();

        let mut expected = packages.clone();
        Shuffle::new(5).apply(&mut expected);
        assert_eq!(collected, expected);
    }
}
