use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::types::time;
use tokio::time::{sleep, Duration};

use crate::{
    core::{
        cart::{self, CartItem},
        db::MarketDb,
    },
    error::Error,
    util::{self, deserialize_datetime, serialize_datetime},
};

/// How long the fake gateway "thinks" before answering.
const GATEWAY_DELAY_MS: u64 = 2000;

/// Fraction of payments the fake gateway declines.
const DECLINE_RATE: f64 = 0.1;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    ApplePay,
    GooglePay,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub address: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,

    pub items: Vec<CartItem>,

    pub total_amount: u32,

    pub status: OrderStatus,

    #[serde(
        serialize_with = "serialize_datetime",
        deserialize_with = "deserialize_datetime",
        default
    )]
    pub date: Option<time::OffsetDateTime>,

    pub customer_details: CustomerDetails,

    pub payment_method: PaymentMethod,
}

pub struct PaymentReceipt {
    pub transaction_id: String,
}

/// Simulated payment gateway. Waits a fixed delay, then declines a random
/// fraction of payments with a user-facing message.
pub async fn process_payment(amount: u32, method: PaymentMethod) -> anyhow::Result<PaymentReceipt> {
    log::info!("Processing payment of {} via {:?}...", amount, method);
    sleep(Duration::from_millis(GATEWAY_DELAY_MS)).await;

    if rand::thread_rng().gen::<f64>() < DECLINE_RATE {
        Err(Error::PaymentDeclined(
            "Payment declined by bank. Please try another method.".to_owned(),
        ))?
    }

    Ok(PaymentReceipt {
        transaction_id: format!("txn_{}", util::generate_id()),
    })
}

/// Runs the payment for the current cart, then records a confirmed order
/// and empties the cart. A declined payment leaves both untouched.
pub async fn place_order(
    db: &MarketDb,
    customer_details: CustomerDetails,
    payment_method: PaymentMethod,
) -> anyhow::Result<Order> {
    let items = db.get_cart().await?;
    if items.is_empty() {
        Err(Error::EmptyCart)?
    }

    let total_amount = cart::cart_total(&items);
    let receipt = process_payment(total_amount, payment_method).await?;
    log::info!("Payment accepted, transaction {}", receipt.transaction_id);

    let order = Order {
        id: format!("ord_{}", util::generate_id()),
        items,
        total_amount,
        status: OrderStatus::Confirmed,
        date: Some(util::now()),
        customer_details,
        payment_method,
    };

    let mut orders = db.get_orders().await?;
    orders.push(order.clone());
    db.save_orders(&orders).await?;
    cart::clear_cart(db).await?;

    Ok(order)
}
