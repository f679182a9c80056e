use std::{convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter};

use crate::{
    core::{
        cart,
        db::MarketDb,
        listing::{self, Listing},
        message::{self, ChatBot},
        vote::VoteRequest,
    },
    send_message, Directory, Rto,
};

use super::handlers::{
    add_cart_item, add_participant, checkout, login, to_http_none_or_error, to_http_output,
    ChatQuery, ChatReply, Id, NewContactMessage,
};

pub fn with_db(
    db: Arc<MarketDb>,
) -> impl Filter<Extract = (Arc<MarketDb>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

pub fn with_directory(
    directory: Directory,
) -> impl Filter<Extract = (Directory,), Error = Infallible> + Clone {
    warp::any().map(move || directory.clone())
}

fn with_bot(bot: Arc<ChatBot>) -> impl Filter<Extract = (Arc<ChatBot>,), Error = Infallible> + Clone {
    warp::any().map(move || bot.clone())
}

fn listing_filters(
    db: Arc<MarketDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_listings = warp::path!("listings")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_output(db.get_listings().await) });

    let create_listing = warp::path!("listing")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|new_listing: Listing, db: Arc<MarketDb>| async move {
            to_http_none_or_error(listing::add_listing(&db, new_listing).await)
        });

    let update_listing = warp::path!("listing")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|updated: Listing, db: Arc<MarketDb>| async move {
            to_http_none_or_error(listing::update_listing(&db, updated).await)
        });

    let delete_listing = warp::path!("listing")
        .and(warp::delete())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|target: Id, db: Arc<MarketDb>| async move {
            to_http_none_or_error(listing::delete_listing(&db, &target.id).await)
        });

    let read_categories = warp::path!("categories")
        .and(warp::get())
        .and_then(|| async move { to_http_output(Ok(listing::popular_categories())) });

    read_listings
        .or(create_listing)
        .or(update_listing)
        .or(delete_listing)
        .or(read_categories)
}

fn cart_filters(
    db: Arc<MarketDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_cart = warp::path!("cart")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_output(db.get_cart().await) });

    let create_cart_item = warp::path!("cart")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(add_cart_item);

    let delete_cart_item = warp::path!("cart")
        .and(warp::delete())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|item: Id, db: Arc<MarketDb>| async move {
            to_http_none_or_error(cart::remove_from_cart(&db, &item.id).await)
        });

    let clear_cart = warp::path!("cart" / "clear")
        .and(warp::post())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move {
            to_http_none_or_error(cart::clear_cart(&db).await)
        });

    read_cart
        .or(create_cart_item)
        .or(delete_cart_item)
        .or(clear_cart)
}

fn wishlist_filters(
    db: Arc<MarketDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_wishlist = warp::path!("wishlist")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_output(db.get_wishlist().await) });

    let toggle_wishlist = warp::path!("wishlist" / "toggle")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|target: Id, db: Arc<MarketDb>| async move {
            to_http_output(listing::toggle_wishlist(&db, &target.id).await)
        });

    read_wishlist.or(toggle_wishlist)
}

fn order_filters(
    db: Arc<MarketDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_orders = warp::path!("orders")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_output(db.get_orders().await) });

    let create_order = warp::path!("checkout")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(checkout);

    read_orders.or(create_order)
}

fn user_filters(
    db: Arc<MarketDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_user = warp::path!("user")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_output(db.get_user().await) });

    let login_user = warp::path!("user" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(login);

    let logout_user = warp::path!("user" / "logout")
        .and(warp::post())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_none_or_error(db.clear_user().await) });

    read_user.or(login_user).or(logout_user)
}

fn message_filters(
    db: Arc<MarketDb>,
    bot: Arc<ChatBot>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_messages = warp::path!("messages")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<MarketDb>| async move { to_http_output(db.get_messages().await) });

    let create_message = warp::path!("message")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|new: NewContactMessage, db: Arc<MarketDb>| async move {
            to_http_output(
                message::submit_message(&db, &new.name, &new.email, &new.subject, &new.message)
                    .await,
            )
        });

    let read_message = warp::path!("message" / "read")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|target: Id, db: Arc<MarketDb>| async move {
            to_http_none_or_error(message::mark_read(&db, &target.id).await)
        });

    let delete_message = warp::path!("message")
        .and(warp::delete())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|target: Id, db: Arc<MarketDb>| async move {
            to_http_none_or_error(message::delete_message(&db, &target.id).await)
        });

    let chat = warp::path!("chat")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_bot(bot))
        .and_then(|query: ChatQuery, bot: Arc<ChatBot>| async move {
            to_http_output(Ok(ChatReply {
                reply: bot.reply(&query.message).to_owned(),
            }))
        });

    read_messages
        .or(create_message)
        .or(read_message)
        .or(delete_message)
        .or(chat)
}

fn vote_filters(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_vote_state = warp::path!("vote")
        .and(warp::get())
        .and(with_directory(directory.clone()))
        .and_then(|directory: Directory| async move {
            to_http_output(send_message!(directory.vote_actor, VoteRequest, GetSnapshot))
        });

    let create_participant = warp::path!("vote" / "participant")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(add_participant);

    let delete_participant = warp::path!("vote" / "participant")
        .and(warp::delete())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(|participant: Id, directory: Directory| async move {
            to_http_none_or_error(send_message!(
                directory.vote_actor,
                VoteRequest,
                RemoveParticipant,
                participant.id
            ))
        });

    let cast_vote = warp::path!("vote" / "cast")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(|participant: Id, directory: Directory| async move {
            to_http_output(send_message!(
                directory.vote_actor,
                VoteRequest,
                CastVote,
                participant.id
            ))
        });

    let toggle_voting = warp::path!("vote" / "toggle")
        .and(warp::post())
        .and(with_directory(directory.clone()))
        .and_then(|directory: Directory| async move {
            to_http_output(send_message!(directory.vote_actor, VoteRequest, ToggleVoting))
        });

    let reset_votes = warp::path!("vote" / "reset")
        .and(warp::post())
        .and(with_directory(directory.clone()))
        .and_then(|directory: Directory| async move {
            to_http_none_or_error(send_message!(directory.vote_actor, VoteRequest, ResetVotes))
        });

    read_vote_state
        .or(create_participant)
        .or(delete_participant)
        .or(cast_vote)
        .or(toggle_voting)
        .or(reset_votes)
}

pub fn api_filters(
    db: Arc<MarketDb>,
    directory: Directory,
    bot: Arc<ChatBot>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    listing_filters(db.clone())
        .or(cart_filters(db.clone()))
        .or(wishlist_filters(db.clone()))
        .or(order_filters(db.clone()))
        .or(user_filters(db.clone()))
        .or(message_filters(db, bot))
        .or(vote_filters(directory))
}
