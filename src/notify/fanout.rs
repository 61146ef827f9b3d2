//! The dual-direction (down-then-up) tree walk shared by user discovery
//! and message-service discovery, plus the two bus-facing
//! operations built on it.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use uuid::Uuid;

use super::gateway::Channel;
use super::{Message, NotificationGateway, Notification};
use crate::bus::{subjects, Bus};
use crate::model::{point_types, NodeType};
use crate::store::{NodeStore, StoreResult};

/// DFS-down-then-walk-up collection of every node of `type_str` reachable
/// from `start`, parametrized over the target type so user discovery and
/// message-service discovery share one implementation — shared,
/// type-parametrized logic instead of per-type duplication.
///
/// The first hop upward follows only `start`'s primary parent edge, to
/// avoid duplicates when the user is in multiple groups; every ancestor
/// beyond that fans out through all of its parent edges.
async fn collect_typed(store: &dyn NodeStore, start: Uuid, type_str: &str) -> StoreResult<Vec<Uuid>> {
    let mut found = HashSet::new();
    collect_downward(store, start, type_str, &mut found).await?;

    if let Some(primary) = store.primary_parent(start).await? {
        let mut queue = VecDeque::from([primary]);
        let mut visited_ancestors = HashSet::new();
        while let Some(ancestor) = queue.pop_front() {
            if !visited_ancestors.insert(ancestor) {
                continue;
            }
            collect_downward(store, ancestor, type_str, &mut found).await?;
            for (parent, _) in store.edges_up(ancestor, false).await? {
                queue.push_back(parent);
            }
        }
    }

    Ok(found.into_iter().collect())
}

async fn collect_downward(
    store: &dyn NodeStore,
    start: Uuid,
    type_str: &str,
    found: &mut HashSet<Uuid>,
) -> StoreResult<()> {
    for node in store.descendants(start, Some(type_str), true, false).await? {
        found.insert(node.id);
    }
    Ok(())
}

/// Every user that should see a notification raised at `id`: `id`
/// itself if it's a user node, otherwise the dual-direction walk for
/// `user`-typed nodes, deduplicated.
pub async fn collect_users(store: &dyn NodeStore, id: Uuid) -> StoreResult<Vec<Uuid>> {
    let node = store.node(id).await?;
    if node.node_type == NodeType::User {
        return Ok(vec![id]);
    }
    collect_typed(store, id, NodeType::User.as_str()).await
}

/// Every `msgService`-typed node reachable from `id` via the same
/// dual-direction walk.
pub async fn collect_message_services(store: &dyn NodeStore, id: Uuid) -> StoreResult<Vec<Uuid>> {
    collect_typed(store, id, NodeType::MsgService.as_str()).await
}

/// Handle `node.<id>.not`: enumerate target users, synthesize one
/// [`Message`] per user, and publish each on `node.<userID>.msg`.
pub async fn handle_notification(
    store: &dyn NodeStore,
    bus: &dyn Bus,
    target_id: Uuid,
    notification: &Notification,
) -> StoreResult<()> {
    let users = collect_users(store, target_id).await?;

    for user_id in users {
        let user = store.node(user_id).await?;
        let message = Message {
            id: Uuid::new_v4(),
            user_id,
            parent_id: store.primary_parent(user_id).await?.unwrap_or(Uuid::nil()),
            notification_id: notification.id,
            email: user.text(point_types::EMAIL, "").unwrap_or("").to_string(),
            phone: user.text(point_types::PHONE, "").unwrap_or("").to_string(),
            subject: notification.subject.clone(),
            body: notification.body.clone(),
        };
        let payload = crate::proto_ext::encode_message(&message);
        bus.publish(&subjects::node_msg(&user_id.to_string()), payload)
            .await
            .ok();
    }
    Ok(())
}

/// Handle `node.<id>.msg`: enumerate message services reachable from
/// `id`, deduplicate, and invoke the gateway for any whose channel
/// matches an available field on the message (phone -> twilio,
/// email -> smtp).
pub async fn handle_message(
    store: &dyn NodeStore,
    gateway: &Arc<dyn NotificationGateway>,
    id: Uuid,
    message: &Message,
) -> StoreResult<()> {
    let services = collect_message_services(store, id).await?;

    for service_id in services {
        let service = store.node(service_id).await?;
        let service_type = service.text(point_types::SERVICE, "").unwrap_or("");

        if !message.phone.is_empty() && service_type == "twilio" {
            gateway.send(Channel::Phone, message).await;
        }
        if !message.email.is_empty() && service_type == "smtp" {
            gateway.send(Channel::Email, message).await;
        }
    }
    Ok(())
}
