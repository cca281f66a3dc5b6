//! Example: a supermarket trip driven by a reactive state machine.
//!
//! Run with `RUST_LOG=debug cargo run --example supermarket` to watch the
//! machine process events.

use std::time::Duration;

use reactive_fsm::{Config, SideEffect, StateMachine, Transition, spawn_with_config};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: &'static str,
    pub price: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Supermarket {
    FillingCart(Cart),
    AtCheckout(Cart),
    Paying { cart: Cart, price: u32 },
    WentHomeHappy(Cart),
    WentHomeSad(Cart),
}

#[derive(Debug, Clone)]
pub enum Trip {
    AddItem(Item),
    GoToCheckout,
    GiveCreditCard(String),
    PaymentSucceeded,
    PaymentFailed,
    Reset,
}

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("card {0} was rejected by the bank")]
    Rejected(String),
}

/// Talks to the bank. Cards starting with "4" are accepted.
async fn submit_payment(price: u32, card: String) -> Result<bool, BankError> {
    tracing::info!(price, %card, "executing the transaction");
    tokio::time::sleep(Duration::from_millis(200)).await;
    if card.starts_with('4') {
        Ok(true)
    } else {
        Err(BankError::Rejected(card))
    }
}

fn update_stock(cart: &Cart) -> SideEffect<Trip> {
    let count = cart.items.len();
    SideEffect::detached(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::info!(count, "stock updated");
    })
}

fn update_customer_queue() -> SideEffect<Trip> {
    SideEffect::detached(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracing::info!("customer queue updated");
    })
}

fn execute_transaction(price: u32, card: String) -> SideEffect<Trip> {
    SideEffect::fallible(
        async move {
            let accepted = submit_payment(price, card).await?;
            Ok(Some(if accepted {
                Trip::PaymentSucceeded
            } else {
                Trip::PaymentFailed
            }))
        },
        |err: BankError| {
            tracing::warn!(error = %err, "payment failed");
            Trip::PaymentFailed
        },
    )
}

fn supermarket() -> StateMachine<Supermarket, Trip> {
    StateMachine::new(Supermarket::FillingCart(Cart::default()), |state, event| {
        match (state, event) {
            (Supermarket::FillingCart(cart), Trip::AddItem(item)) => {
                let mut cart = cart.clone();
                cart.items.push(item);
                let effect = update_stock(&cart);
                Transition::to(Supermarket::FillingCart(cart)).with_effect(effect)
            }
            (Supermarket::FillingCart(cart), Trip::GoToCheckout) => {
                Transition::to(Supermarket::AtCheckout(cart.clone()))
                    .with_effect(update_customer_queue())
            }
            (Supermarket::AtCheckout(cart), Trip::GiveCreditCard(card)) => {
                let price: u32 = cart.items.iter().map(|item| item.price).sum();
                Transition::to(Supermarket::Paying {
                    cart: cart.clone(),
                    price,
                })
                .with_effect(execute_transaction(price, card))
            }
            (Supermarket::Paying { cart, .. }, Trip::PaymentSucceeded) => {
                Transition::to(Supermarket::WentHomeHappy(cart.clone()))
            }
            (Supermarket::Paying { cart, .. }, Trip::PaymentFailed) => {
                Transition::to(Supermarket::WentHomeSad(cart.clone()))
            }
            (_, Trip::Reset) => Transition::to(Supermarket::FillingCart(Cart::default())),
            _ => Transition::stay(),
        }
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let card = std::env::args().nth(1).unwrap_or_else(|| "4242".to_string());
    let (handle, task) = spawn_with_config(supermarket(), Config::default().with_name("supermarket"));
    let mut states = handle.subscribe();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            println!("state: {:?}", *states.borrow_and_update());
        }
    });

    handle.send(Trip::AddItem(Item {
        name: "baguette",
        price: 2,
    }));
    handle.send(Trip::AddItem(Item {
        name: "camembert",
        price: 5,
    }));
    handle.send(Trip::GoToCheckout);
    handle.send(Trip::GiveCreditCard(card));

    let outcome = handle
        .wait_for_state(|state| {
            matches!(
                state,
                Supermarket::WentHomeHappy(_) | Supermarket::WentHomeSad(_)
            )
        })
        .await;
    println!("trip over: {outcome:?}");

    handle.close();
    if let Err(err) = task.await {
        eprintln!("state machine failed: {err}");
    }
    let _ = printer.await;
}
