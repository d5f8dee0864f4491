use axum::Router;

pub mod channel;
pub mod chat;
pub mod events;
pub mod friend;
pub mod peers;
pub mod preference;
pub mod profile;
pub mod store;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/profile", profile::router(state.clone()))
        .nest("/friend", friend::router(state.clone()))
        .nest("/chat", chat::router(state.clone()))
        .nest("/channel", channel::router(state.clone()))
        .nest("/store", store::router(state.clone()))
        .merge(peers::router(state.clone()))
        .merge(preference::router(state.clone()))
        .merge(events::router(state.clone()))
        .with_state(state)
}
