//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use convergent_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion = Box<dyn FnOnce(&[Effect])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use convergent_testing::ReducerTest;
///
/// ReducerTest::new(ItemReducer)
///     .with_env(item_env())
///     .given_state(ItemState::viewing(todo))
///     .when_action(ItemAction::BeginEdit)
///     .then_state(|state| {
///         assert!(state.editing);
///     })
///     .then_effects(|effects| {
///         assertions::assert_has_outbound(effects, |c| matches!(c, Outbound::Focus(_)));
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to run (When)
    ///
    /// Several actions run in order; effect assertions see the effects of
    /// the last one.
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects = smallvec::SmallVec::<[Effect; 4]>::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use convergent_core::effect::{Effect, Outbound};
    use convergent_core::value::Value;

    fn flatten(effects: &[Effect]) -> Vec<&Effect> {
        let mut flat = Vec::new();
        for effect in effects {
            match effect {
                Effect::Sequential(inner) => flat.extend(flatten(inner)),
                Effect::None => {},
                other => flat.push(other),
            }
        }
        flat
    }

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if any effect other than `Effect::None` is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects(effects: &[Effect]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count(effects: &[Effect], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects publish `name` with exactly `value`
    ///
    /// # Panics
    ///
    /// Panics if no matching `Publish` effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_publishes(effects: &[Effect], name: &str, value: &Value) {
        assert!(
            flatten(effects).iter().any(|e| matches!(
                e,
                Effect::Publish { name: n, value: v, .. } if *n == name && v == value
            )),
            "Expected a Publish of '{name}' = {value:?}, found {effects:?}"
        );
    }

    /// Assert the number of `Publish` effects
    ///
    /// # Panics
    ///
    /// Panics if the count differs.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_publish_count(effects: &[Effect], expected: usize) {
        let count = flatten(effects)
            .iter()
            .filter(|e| matches!(e, Effect::Publish { .. }))
            .count();
        assert_eq!(count, expected, "Expected {expected} Publish effects in {effects:?}");
    }

    /// Assert that effects emit a signal called `name`
    ///
    /// # Panics
    ///
    /// Panics if no matching `Emit` effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_emits(effects: &[Effect], name: &str) {
        assert!(
            flatten(effects)
                .iter()
                .any(|e| matches!(e, Effect::Emit(signal) if signal.name == name)),
            "Expected an Emit of '{name}', found {effects:?}"
        );
    }

    /// Assert that effects contain an outbound command matching `predicate`
    ///
    /// # Panics
    ///
    /// Panics if no matching `Outbound` effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_outbound<F>(effects: &[Effect], predicate: F)
    where
        F: Fn(&Outbound) -> bool,
    {
        assert!(
            flatten(effects)
                .iter()
                .any(|e| matches!(e, Effect::Outbound(command) if predicate(command))),
            "Expected a matching Outbound effect, found {effects:?}"
        );
    }

    /// Count `Destroy` effects
    #[must_use]
    pub fn destroyed(effects: &[Effect]) -> usize {
        flatten(effects)
            .iter()
            .filter(|e| matches!(e, Effect::Destroy(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergent_core::attribute::EntityId;
    use convergent_core::effect::Effect;
    use convergent_core::reducer::Reducer;
    use convergent_core::value::Value;

    #[derive(Clone, Debug)]
    struct TestState {
        count: i64,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        Noop,
    }

    struct TestReducer;

    struct TestEnv;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> smallvec::SmallVec<[Effect; 4]> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    smallvec::smallvec![Effect::Publish {
                        entity: EntityId::new("counter"),
                        name: "count",
                        value: Value::from(state.count),
                    }]
                },
                TestAction::Noop => smallvec::smallvec![Effect::None],
            }
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_action(TestAction::Increment)
            .when_action(TestAction::Increment)
            .then_state(|state| {
                assert_eq!(state.count, 2);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_publishes(effects, "count", &Value::from(2_i64));
            })
            .run();
    }

    #[test]
    fn test_assertions_no_effects() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 5 })
            .when_action(TestAction::Noop)
            .then_effects(assertions::assert_no_effects)
            .run();
        assertions::assert_no_effects(&[]);
        assertions::assert_no_effects(&[Effect::Sequential(vec![Effect::None])]);
    }
}
