//! # Aggregation Engine
//!
//! The single place that derives an order's status and total. Callers never
//! compute "is everything ready?" themselves; they ask this module, and it
//! always recomputes from the full current set instead of tracking deltas.

use crate::domain::{LineItem, Money, OrderStatus, Ticket, TicketStatus};

/// Derives the aggregate order status from the current ticket statuses.
///
/// Cancelled tickets are excluded from every rule except "all cancelled".
/// The completion rule is checked before the readiness rule because served
/// and completed tickets also count as "ready or later".
pub fn recompute_order_status<'a, I>(statuses: I) -> OrderStatus
where
    I: IntoIterator<Item = &'a TicketStatus>,
{
    let mut any = false;
    let mut live = 0usize;
    let mut ready_or_later = 0usize;
    let mut finished = 0usize;

    for status in statuses {
        any = true;
        if status.is_cancelled() {
            continue;
        }
        live += 1;
        if status.is_ready_or_later() {
            ready_or_later += 1;
        }
        if status.is_finished() {
            finished += 1;
        }
    }

    if !any {
        OrderStatus::New
    } else if live == 0 {
        OrderStatus::Cancelled
    } else if finished == live {
        OrderStatus::Completed
    } else if ready_or_later == live {
        OrderStatus::Ready
    } else {
        OrderStatus::InQueue
    }
}

/// Convenience wrapper over [`recompute_order_status`] for whole tickets.
pub fn order_status_for(tickets: &[Ticket]) -> OrderStatus {
    recompute_order_status(tickets.iter().map(|t| &t.status))
}

/// Sums `unit_price × quantity` over all line items in minor units.
pub fn recompute_order_total(items: &[LineItem]) -> Money {
    items.iter().map(LineItem::subtotal).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewItem;
    use chrono::Utc;
    use TicketStatus::*;

    fn status(tickets: &[TicketStatus]) -> OrderStatus {
        recompute_order_status(tickets)
    }

    #[test]
    fn empty_set_is_new() {
        assert_eq!(status(&[]), OrderStatus::New);
    }

    #[test]
    fn all_cancelled_is_cancelled() {
        assert_eq!(status(&[Cancelled]), OrderStatus::Cancelled);
        assert_eq!(status(&[Cancelled, Cancelled]), OrderStatus::Cancelled);
    }

    #[test]
    fn slowest_live_ticket_wins() {
        assert_eq!(status(&[New, New]), OrderStatus::InQueue);
        assert_eq!(status(&[Ready, New]), OrderStatus::InQueue);
        assert_eq!(status(&[Ready, InQueue, Served]), OrderStatus::InQueue);
        assert_eq!(status(&[Ready, Ready]), OrderStatus::Ready);
        assert_eq!(status(&[Ready, Served, Completed]), OrderStatus::Ready);
    }

    #[test]
    fn cancelled_tickets_are_excluded() {
        assert_eq!(status(&[Ready, Cancelled]), OrderStatus::Ready);
        assert_eq!(status(&[New, Cancelled]), OrderStatus::InQueue);
        assert_eq!(status(&[Served, Cancelled, Completed]), OrderStatus::Completed);
    }

    #[test]
    fn finished_tickets_complete_the_order() {
        assert_eq!(status(&[Served, Completed]), OrderStatus::Completed);
        assert_eq!(status(&[Served]), OrderStatus::Completed);
    }

    #[test]
    fn recomputation_is_pure() {
        let inputs: &[&[TicketStatus]] = &[
            &[],
            &[New],
            &[Ready, Cancelled],
            &[Served, InQueue, Cancelled],
            &[Completed, Completed],
        ];
        for input in inputs {
            assert_eq!(status(input), status(input));
            let mut reversed = input.to_vec();
            reversed.reverse();
            assert_eq!(status(input), status(&reversed), "order of tickets must not matter");
        }
    }

    #[test]
    fn total_is_exact_over_repeated_recomputation() {
        let now = Utc::now();
        let items: Vec<LineItem> = [("Ramen", 1099, 2), ("Gyoza", 650, 1), ("Tea", 199, 3)]
            .into_iter()
            .map(|(name, price, qty)| LineItem::from_new(NewItem::new(name, Money(price), qty), None, now))
            .collect();
        let first = recompute_order_total(&items);
        assert_eq!(first, Money(1099 * 2 + 650 + 199 * 3));
        for _ in 0..100 {
            assert_eq!(recompute_order_total(&items), first);
        }
        assert_eq!(recompute_order_total(&[]), Money::ZERO);
    }
}
