use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use tokio_stream::{Stream, StreamExt};

use crate::{
    AppState,
    api::models::users::Role,
    auth::current_user::ActiveUser,
    changes::ChangeEvent,
    types::{Collection, UserId},
};

/// Which change events a subscriber may see. Admins see everything. Everyone else sees changes
/// to their own groups and the students in them, and nothing about user accounts.
fn audience(user_id: UserId, role: Role) -> impl Fn(&ChangeEvent) -> bool + Send + 'static {
    move |event| match (role, event.collection) {
        (Role::Admin, _) => true,
        (_, Collection::Users) => false,
        _ => event.owner == Some(user_id),
    }
}

/// A change to the subscriber's own account. Role and status were read at connect time, so the
/// stream ends here and the client reconnects under its current session.
fn ends_subscription(user_id: UserId, event: &ChangeEvent) -> bool {
    event.collection == Collection::Users && event.id == user_id
}

fn to_sse_event(event: &ChangeEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event.collection.to_string()).data(data)
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "events",
    summary = "Stream change notifications",
    description = "Server-sent events, one per successful write. The event name is the collection \
                   (`users`, `groups` or `students`) and the data is a `ChangeEvent`. \
                   Clients re-fetch what they display when one arrives. Only admins receive `users` events; \
                   other users only hear about their own groups and students. The stream closes when \
                   the subscriber's own account changes.",
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = ChangeEvent),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Password reset pending"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn stream_changes(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = %user.id, "Change subscriber connected");

    let user_id = user.id;
    let stream = state
        .changes
        .subscribe()
        .into_stream()
        .take_while(move |event| !ends_subscription(user_id, event))
        .filter(audience(user.id, user.role))
        .map(|event| Ok(to_sse_event(&event)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
