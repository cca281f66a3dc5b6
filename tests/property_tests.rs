//! Property-based tests for delivery order.
//!
//! These use proptest to check that the delivered state sequence is exactly
//! the sent events applied in order, with no-ops skipped.

use proptest::prelude::*;
use reactive_fsm::{AsyncStateMachine, SideEffect, StateMachine, Transition};

#[derive(Debug, Clone)]
enum Input {
    Record(u16),
    Skip,
    Echo(u16),
}

prop_compose! {
    fn arbitrary_input()(variant in 0..3u8, value in 0..1000u16) -> Input {
        match variant {
            0 => Input::Record(value),
            1 => Input::Skip,
            _ => Input::Echo(value),
        }
    }
}

fn recorder() -> StateMachine<Vec<u16>, Input> {
    StateMachine::new(Vec::new(), |log: &Vec<u16>, input| match input {
        Input::Record(value) => {
            let mut log = log.clone();
            log.push(value);
            Transition::to(log)
        }
        Input::Echo(value) => Transition::stay().with_effect(SideEffect::emit(async move {
            Input::Record(value)
        })),
        Input::Skip => Transition::stay(),
    })
}

fn run(inputs: Vec<Input>) -> Vec<Vec<u16>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let mut machine = AsyncStateMachine::new(recorder());
        for input in inputs {
            machine.send(input);
        }
        machine.close();

        let mut states = machine.states();
        let mut seen = Vec::new();
        while let Some(state) = states.next().await {
            seen.push(state.unwrap());
        }
        seen
    })
}

fn expected_log(inputs: &[Input]) -> Vec<u16> {
    inputs
        .iter()
        .filter_map(|input| match input {
            Input::Record(value) | Input::Echo(value) => Some(*value),
            Input::Skip => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn first_state_is_initial(inputs in prop::collection::vec(arbitrary_input(), 0..20)) {
        let seen = run(inputs);
        prop_assert_eq!(seen.first(), Some(&Vec::new()));
    }

    #[test]
    fn states_follow_send_order(inputs in prop::collection::vec(arbitrary_input(), 0..40)) {
        let expected = expected_log(&inputs);
        let seen = run(inputs);
        prop_assert_eq!(seen.last(), Some(&expected));
    }

    #[test]
    fn no_ops_never_deliver_a_state(inputs in prop::collection::vec(arbitrary_input(), 0..40)) {
        let expected = expected_log(&inputs);
        let seen = run(inputs);
        prop_assert_eq!(seen.len(), expected.len() + 1);
        for (i, state) in seen.iter().enumerate() {
            prop_assert_eq!(state.as_slice(), &expected[..i]);
        }
    }
}
