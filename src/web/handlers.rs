use std::{convert::Infallible, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        cart,
        db::MarketDb,
        order::{self, CustomerDetails, PaymentMethod},
        user::User,
        vote::VoteRequest,
    },
    send_message, util, Directory, Rto,
};

/// A Json struct to store an entity ID
#[derive(Serialize, Deserialize, Debug)]
pub struct Id {
    pub id: String,
}

/// A Json struct for the mock login form
#[derive(Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub name: String,
    pub email: String,
}

/// A Json struct for putting a rental in the cart
#[derive(Serialize, Deserialize, Debug)]
pub struct NewCartItem {
    pub listing_id: String,
    pub days: u32,
    /// Rental start in unix milliseconds
    pub start_date: u64,
}

/// A Json struct for the checkout form
#[derive(Serialize, Deserialize, Debug)]
pub struct CheckoutRequest {
    pub customer_details: CustomerDetails,
    pub payment_method: PaymentMethod,
}

/// A Json struct for a contact-form submission
#[derive(Serialize, Deserialize, Debug)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// A Json struct for a support-chat query
#[derive(Serialize, Deserialize, Debug)]
pub struct ChatQuery {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChatReply {
    pub reply: String,
}

/// A Json struct for a new voting participant
#[derive(Serialize, Deserialize, Debug)]
pub struct NewParticipant {
    pub name: String,
    pub description: String,
}

pub fn to_http_none_or_error(result: anyhow::Result<()>) -> Result<impl warp::Reply, Infallible> {
    match result {
        Ok(_) => Ok(warp::reply::with_status(
            "Success".to_string(),
            warp::http::StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                e.to_string(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

pub fn to_http_output<T: Serialize>(
    result: anyhow::Result<T>,
) -> Result<impl warp::Reply, Infallible> {
    match result {
        Ok(data) => Ok(warp::reply::with_status(
            serde_json::to_string::<T>(&data).unwrap(),
            warp::http::StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                e.to_string(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

pub async fn login(
    login: LoginRequest,
    db: Arc<MarketDb>,
) -> Result<impl warp::Reply, Infallible> {
    let user = User::new(&login.name, &login.email);
    to_http_output(db.set_user(&user).await.map(|_| user))
}

pub async fn add_cart_item(
    item: NewCartItem,
    db: Arc<MarketDb>,
) -> Result<impl warp::Reply, Infallible> {
    let start = util::millis_to_datetime(item.start_date);
    to_http_output(cart::add_to_cart(&db, &item.listing_id, item.days, start).await)
}

pub async fn checkout(
    request: CheckoutRequest,
    db: Arc<MarketDb>,
) -> Result<impl warp::Reply, Infallible> {
    to_http_output(order::place_order(&db, request.customer_details, request.payment_method).await)
}

/// Operator input is validated here, at the caller; the voting engine
/// itself accepts any string.
pub async fn add_participant(
    participant: NewParticipant,
    directory: Directory,
) -> Result<impl warp::Reply, Infallible> {
    if participant.name.trim().is_empty() || participant.description.trim().is_empty() {
        return Ok(warp::reply::with_status(
            "Participant name and description are required".to_string(),
            warp::http::StatusCode::BAD_REQUEST,
        ));
    }

    match send_message!(
        directory.vote_actor,
        VoteRequest,
        AddParticipant,
        participant.name,
        participant.description
    ) {
        Ok(_) => Ok(warp::reply::with_status(
            "Success".to_string(),
            warp::http::StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                e.to_string(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
