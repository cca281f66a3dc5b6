use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use reactive_fsm::{
    AsyncStateMachine, Config, InFlightPolicy, Lifecycle, MachineError, SideEffect, StateMachine,
    Transition,
};

#[derive(Debug, Clone)]
enum Step {
    Push(u32),
    Ignore,
    Echo(u32),
    Touch,
    Slow(u32),
    Explode,
}

async fn explode() -> Option<Step> {
    panic!("effect forgot to handle its error")
}

fn appended(log: &[u32], value: u32) -> Vec<u32> {
    let mut log = log.to_vec();
    log.push(value);
    log
}

fn log_machine() -> StateMachine<Vec<u32>, Step> {
    StateMachine::new(Vec::new(), |log: &Vec<u32>, step| match step {
        Step::Push(n) => Transition::to(appended(log, n)),
        Step::Ignore => Transition::stay(),
        Step::Echo(n) => Transition::to(appended(log, n))
            .with_effect(SideEffect::emit(async move { Step::Push(n * 10) })),
        Step::Touch => Transition::stay().with_effect(SideEffect::emit(async { Step::Push(99) })),
        Step::Slow(n) => Transition::to(appended(log, n)).with_effect(SideEffect::emit(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Step::Push(n * 10)
        })),
        Step::Explode => Transition::to(appended(log, 0)).with_effect(SideEffect::new(explode())),
    })
}

async fn drain(machine: &mut AsyncStateMachine<Vec<u32>, Step>) -> Vec<Vec<u32>> {
    machine.close();
    let mut seen = Vec::new();
    let mut states = machine.states();
    while let Some(state) = states.next().await {
        seen.push(state.unwrap());
    }
    assert_eq!(states.lifecycle(), Lifecycle::Exhausted);
    seen
}

#[tokio::test]
async fn test_initial_state_is_delivered_without_events() {
    let mut machine = AsyncStateMachine::new(log_machine());
    let mut states = machine.states();
    assert_eq!(states.lifecycle(), Lifecycle::NotStarted);

    let first = tokio::time::timeout(Duration::from_millis(100), states.next())
        .await
        .expect("initial state must not wait for events");
    assert_eq!(first.unwrap().unwrap(), Vec::<u32>::new());
    assert_eq!(states.lifecycle(), Lifecycle::Running);
}

#[tokio::test]
async fn test_events_are_applied_in_send_order() {
    let mut machine = AsyncStateMachine::new(log_machine());
    for n in 1..=4 {
        machine.send(Step::Push(n));
    }

    let seen = drain(&mut machine).await;
    assert_eq!(
        seen,
        vec![vec![], vec![1], vec![1, 2], vec![1, 2, 3], vec![1, 2, 3, 4]]
    );
}

#[tokio::test]
async fn test_no_op_events_are_never_delivered() {
    let mut machine = AsyncStateMachine::new(log_machine());
    let sender = machine.sender();
    let mut states = machine.states();
    states.next().await.unwrap().unwrap();

    sender.send(Step::Ignore);
    sender.send(Step::Ignore);
    let pending = tokio::time::timeout(Duration::from_millis(50), states.next()).await;
    assert!(pending.is_err(), "ignored events must not produce a state");

    sender.send(Step::Push(7));
    assert_eq!(states.next().await.unwrap().unwrap(), vec![7]);
}

#[tokio::test]
async fn test_feedback_precedes_already_queued_events() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.send(Step::Echo(1));
    machine.send(Step::Push(3));

    let seen = drain(&mut machine).await;
    assert_eq!(seen, vec![vec![], vec![1], vec![1, 10], vec![1, 10, 3]]);
}

#[tokio::test]
async fn test_same_state_still_runs_its_side_effect() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.send(Step::Touch);
    machine.send(Step::Push(1));

    let seen = drain(&mut machine).await;
    assert_eq!(seen, vec![vec![], vec![99], vec![99, 1]]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_side_effect_blocks_the_queue() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.send(Step::Slow(2));
    machine.send(Step::Push(5));

    let seen = drain(&mut machine).await;
    assert_eq!(seen, vec![vec![], vec![2], vec![2, 20], vec![2, 20, 5]]);
}

#[tokio::test]
async fn test_cancelled_machine_delivers_nothing_more() {
    let mut machine = AsyncStateMachine::new(log_machine());
    let sender = machine.sender();
    let token = machine.cancellation_token();
    let mut states = machine.states();
    states.next().await.unwrap().unwrap();

    token.cancel();
    sender.send(Step::Push(1));
    assert!(sender.is_closed());
    assert!(states.next().await.is_none());
    assert_eq!(states.lifecycle(), Lifecycle::Cancelled);
    assert!(states.next().await.is_none());
}

#[tokio::test]
async fn test_cancellation_wakes_a_waiting_consumer() {
    let mut machine = AsyncStateMachine::new(log_machine());
    let token = machine.cancellation_token();
    let mut states = machine.states();
    states.next().await.unwrap().unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    assert!(states.next().await.is_none());
    assert_eq!(states.lifecycle(), Lifecycle::Cancelled);
}

#[tokio::test]
async fn test_cancelled_before_first_pull() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.cancel();
    let mut states = machine.states();
    assert!(states.next().await.is_none());
    assert_eq!(states.lifecycle(), Lifecycle::Cancelled);
}

#[tokio::test]
async fn test_panicking_side_effect_stops_the_machine() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.send(Step::Explode);
    machine.send(Step::Push(1));

    let mut states = machine.states();
    states.next().await.unwrap().unwrap();
    let failure = states.next().await.unwrap();
    assert_eq!(
        failure,
        Err(MachineError::SideEffectPanicked {
            message: "effect forgot to handle its error".into()
        })
    );
    assert_eq!(states.lifecycle(), Lifecycle::Failed);
    assert!(states.next().await.is_none());
}

#[tokio::test]
async fn test_closed_queue_drops_late_events() {
    let mut machine = AsyncStateMachine::new(log_machine());
    let sender = machine.sender();
    sender.send(Step::Push(1));
    machine.close();
    sender.send(Step::Push(2));
    machine.send(Step::Push(3));

    let mut states = machine.states();
    let mut seen = Vec::new();
    while let Some(state) = states.next().await {
        seen.push(state.unwrap());
    }
    assert_eq!(seen, vec![vec![], vec![1]]);
    assert_eq!(states.lifecycle(), Lifecycle::Exhausted);
}

#[tokio::test]
async fn test_new_pass_restarts_from_initial_state() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.send(Step::Push(1));
    machine.send(Step::Push(2));

    {
        let mut states = machine.states();
        assert_eq!(states.next().await.unwrap().unwrap(), Vec::<u32>::new());
        assert_eq!(states.next().await.unwrap().unwrap(), vec![1]);
    }

    let mut states = machine.states();
    assert_eq!(states.next().await.unwrap().unwrap(), Vec::<u32>::new());
    assert_eq!(states.next().await.unwrap().unwrap(), vec![2]);
}

#[tokio::test]
async fn test_states_as_stream() {
    let mut machine = AsyncStateMachine::new(log_machine());
    machine.send(Step::Push(4));
    machine.send(Step::Ignore);
    machine.send(Step::Push(2));
    machine.close();

    let seen: Vec<_> = machine
        .states()
        .into_stream()
        .map(|state| state.unwrap())
        .collect()
        .await;
    assert_eq!(seen, vec![vec![], vec![4], vec![4, 2]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_senders_lose_nothing() {
    let mut machine = AsyncStateMachine::new(log_machine());
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let sender = machine.sender();
            tokio::spawn(async move {
                for i in 0..25 {
                    sender.send(Step::Push(p * 100 + i));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let seen = drain(&mut machine).await;
    let last = seen.last().unwrap();
    assert_eq!(last.len(), 100);
    for p in 0..4 {
        let from_producer: Vec<u32> = last.iter().copied().filter(|v| v / 100 == p).collect();
        let expected: Vec<u32> = (0..25).map(|i| p * 100 + i).collect();
        assert_eq!(from_producer, expected, "per-producer order must be preserved");
    }
}

#[tokio::test]
async fn test_abort_policy_stops_in_flight_effect() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let descriptor = StateMachine::new(0u32, move |count: &u32, step: Step| match step {
        Step::Slow(n) => {
            let flag = Arc::clone(&flag);
            Transition::to(count + n).with_effect(SideEffect::emit(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Step::Push(0)
            }))
        }
        _ => Transition::stay(),
    });
    let config = Config::default()
        .with_name("abortable")
        .with_in_flight_policy(InFlightPolicy::Abort);
    let mut machine = AsyncStateMachine::with_config(descriptor, config);
    let token = machine.cancellation_token();
    machine.send(Step::Slow(1));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let mut states = machine.states();
    assert_eq!(states.next().await.unwrap().unwrap(), 0);
    assert!(states.next().await.is_none());
    assert_eq!(states.lifecycle(), Lifecycle::Cancelled);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_run_to_completion_finishes_before_cancelling() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let descriptor = StateMachine::new(0u32, move |count: &u32, step: Step| match step {
        Step::Slow(n) => {
            let counter = Arc::clone(&counter);
            Transition::to(count + n).with_effect(SideEffect::detached(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        }
        _ => Transition::stay(),
    });
    let mut machine = AsyncStateMachine::new(descriptor);
    let token = machine.cancellation_token();
    machine.send(Step::Slow(1));

    let mut states = machine.states();
    assert_eq!(states.next().await.unwrap().unwrap(), 0);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();
    });
    assert!(states.next().await.is_none());
    canceller.await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(states.current(), &1, "the finished effect's state is committed");
    assert_eq!(states.lifecycle(), Lifecycle::Cancelled);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkout {
    Idle,
    Paying,
    Done,
}

fn checkout_machine(charged: Arc<AtomicBool>) -> StateMachine<Checkout, Step> {
    StateMachine::new(Checkout::Idle, move |state, step| match (state, step) {
        (Checkout::Idle, Step::Slow(_)) => {
            let charged = Arc::clone(&charged);
            Transition::to(Checkout::Paying).with_effect(SideEffect::detached(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                charged.store(true, Ordering::SeqCst);
            }))
        }
        (Checkout::Paying, Step::Push(_)) => Transition::to(Checkout::Done),
        _ => Transition::stay(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_dropped_pull_resumes_the_running_transition() {
    let charged = Arc::new(AtomicBool::new(false));
    let mut machine = AsyncStateMachine::new(checkout_machine(Arc::clone(&charged)));
    let sender = machine.sender();
    let mut states = machine.states();
    assert_eq!(states.next().await.unwrap().unwrap(), Checkout::Idle);

    sender.send(Step::Slow(1));
    let timed_out = tokio::time::timeout(Duration::from_millis(10), states.next()).await;
    assert!(timed_out.is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(charged.load(Ordering::SeqCst));

    sender.send(Step::Push(2));
    assert_eq!(states.next().await.unwrap().unwrap(), Checkout::Paying);
    assert_eq!(states.next().await.unwrap().unwrap(), Checkout::Done);
    assert_eq!(states.current(), &Checkout::Done);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_pull_with_cancellation_commits_without_delivering() {
    let charged = Arc::new(AtomicBool::new(false));
    let mut machine = AsyncStateMachine::new(checkout_machine(Arc::clone(&charged)));
    let token = machine.cancellation_token();
    machine.send(Step::Slow(1));
    let mut states = machine.states();
    states.next().await.unwrap().unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(10), states.next()).await;
    assert!(timed_out.is_err());
    token.cancel();

    assert!(states.next().await.is_none());
    assert!(charged.load(Ordering::SeqCst));
    assert_eq!(states.current(), &Checkout::Paying);
    assert_eq!(states.lifecycle(), Lifecycle::Cancelled);
}
