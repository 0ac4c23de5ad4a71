use crate::item::{Destination, OriginRoute};
use crate::queue::QueueRecord;
use crate::summary::{DropSummary, render_collected, render_summary};
use crate::{FollowupItem, FollowupTurn, QueueMode, TurnKind};
use std::collections::HashSet;

/// State scoped to one drain pass. Never stored on the queue record.
#[derive(Debug, Default)]
pub(crate) struct DrainPass {
    /// Set once queued items were seen heading to different destinations; the rest of
    /// the pass delivers items one at a time.
    pub(crate) force_individual: bool,
}

/// Work taken off a queue for one delivery attempt. On lock contention the same value
/// is handed back to the record.
#[derive(Clone, Debug)]
pub(crate) enum DeliveryUnit {
    Single(FollowupItem),
    Collected {
        items: Vec<FollowupItem>,
        summary: DropSummary,
    },
    Summary(DropSummary),
}

pub(crate) fn has_cross_destination<'a, I>(items: I) -> bool
where
    I: IntoIterator<Item = &'a FollowupItem>,
{
    let mut keys = HashSet::new();
    for item in items {
        match item.route.destination() {
            // Unrouted items reply wherever the batch goes.
            Destination::Unrouted => {}
            Destination::Incomplete => return true,
            Destination::Keyed(key) => {
                keys.insert(key);
            }
        }
    }
    keys.len() > 1
}

pub(crate) fn merged_route(items: &[FollowupItem]) -> OriginRoute {
    let mut route = OriginRoute::default();
    for item in items {
        route.fill_from(&item.route);
    }
    route
}

impl QueueRecord {
    /// Picks the next unit of work and removes it from the record.
    pub(crate) fn take_next_unit(
        &mut self,
        session_key: &str,
        pass: &mut DrainPass,
    ) -> Option<DeliveryUnit> {
        let collect = self.settings.mode == QueueMode::Collect;
        if collect && !pass.force_individual && has_cross_destination(&self.items) {
            pass.force_individual = true;
            tracing::info!(
                session_key,
                queued = self.items.len(),
                "queued follow-ups target different destinations; delivering individually"
            );
        }

        if collect && !pass.force_individual {
            let items: Vec<FollowupItem> = self.items.drain(..).collect();
            let summary = std::mem::take(&mut self.summary);
            if items.is_empty() && summary.is_empty() {
                return None;
            }
            return Some(DeliveryUnit::Collected { items, summary });
        }

        if !self.summary.is_empty() {
            return Some(DeliveryUnit::Summary(std::mem::take(&mut self.summary)));
        }
        self.items.pop_front().map(DeliveryUnit::Single)
    }

    pub(crate) fn turn_for(&self, session_key: &str, unit: &DeliveryUnit) -> FollowupTurn {
        match unit {
            DeliveryUnit::Single(item) => FollowupTurn {
                session_key: session_key.to_string(),
                kind: TurnKind::Single,
                prompt: item.prompt.clone(),
                route: item.route.clone(),
                run: item.run.clone(),
            },
            DeliveryUnit::Collected { items, summary } => FollowupTurn {
                session_key: session_key.to_string(),
                kind: TurnKind::Collected { count: items.len() },
                prompt: render_collected(items, summary),
                route: if items.is_empty() {
                    self.last_route.clone()
                } else {
                    merged_route(items)
                },
                run: items
                    .last()
                    .map(|item| item.run.clone())
                    .unwrap_or_else(|| self.last_run.clone()),
            },
            DeliveryUnit::Summary(summary) => FollowupTurn {
                session_key: session_key.to_string(),
                kind: TurnKind::DropSummary {
                    dropped: summary.dropped_count,
                },
                prompt: render_summary(summary),
                route: self.last_route.clone(),
                run: self.last_run.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunContext;

    fn routed(prompt: &str, route: OriginRoute) -> FollowupItem {
        FollowupItem::new(prompt, RunContext::new("s-1", "agent:main:main")).with_route(route)
    }

    #[test]
    fn has_cross_destination_same_destination_expected_false() {
        let items = [
            routed("A", OriginRoute::new("discord", "chan-1")),
            routed("B", OriginRoute::new("Discord", "chan-1")),
        ];
        assert!(!has_cross_destination(&items));
    }

    #[test]
    fn has_cross_destination_different_channels_expected_true() {
        let items = [
            routed("A", OriginRoute::new("discord", "chan-1")),
            routed("B", OriginRoute::new("slack", "chan-2")),
        ];
        assert!(has_cross_destination(&items));
    }

    #[test]
    fn has_cross_destination_thread_split_expected_true() {
        let items = [
            routed("A", OriginRoute::new("discord", "chan-1").with_thread("t-1")),
            routed("B", OriginRoute::new("discord", "chan-1").with_thread("t-2")),
        ];
        assert!(has_cross_destination(&items));
    }

    #[test]
    fn has_cross_destination_unrouted_items_expected_ignored() {
        let unrouted = [
            routed("A", OriginRoute::default()),
            routed("B", OriginRoute::default()),
        ];
        assert!(!has_cross_destination(&unrouted));

        let mixed = [
            routed("A", OriginRoute::default()),
            routed("B", OriginRoute::new("discord", "chan-1")),
        ];
        assert!(!has_cross_destination(&mixed));

        let split = [
            routed("A", OriginRoute::default()),
            routed("B", OriginRoute::new("discord", "chan-1")),
            routed("C", OriginRoute::new("slack", "chan-2")),
        ];
        assert!(has_cross_destination(&split));
    }

    #[test]
    fn merged_route_expected_first_non_empty_values() {
        let items = [
            routed(
                "A",
                OriginRoute {
                    channel: Some("discord".to_string()),
                    ..OriginRoute::default()
                },
            ),
            routed("B", OriginRoute::new("slack", "chan-2").with_account("acct-9")),
        ];
        let route = merged_route(&items);
        assert_eq!(route.channel.as_deref(), Some("discord"));
        assert_eq!(route.to.as_deref(), Some("chan-2"));
        assert_eq!(route.account_id.as_deref(), Some("acct-9"));
        assert_eq!(route.thread_id, None);
    }
}
