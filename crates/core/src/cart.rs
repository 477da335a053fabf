//! Local/server cart reconciliation.
//!
//! The storefront keeps the cart in the browser first and pushes it to the
//! server opportunistically. Each push carries the timestamp of the last
//! successful sync (`syncedAt`), which is what lets [`reconcile`] tell a line
//! the shopper removed locally apart from a line added on another device.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::round_amount;

/// Upper bound on the quantity of a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Identity of a cart line: the same variant in the same size is one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub product_id: String,
    pub variant_id: String,
    pub size: Option<String>,
}

/// A single cart line as exchanged with the client and stored in
/// `storefront.cart_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[validate(length(min = 1, max = 128))]
    pub product_id: String,
    #[validate(length(min = 1, max = 128))]
    pub variant_id: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub size: Option<String>,
    #[serde(default)]
    #[validate(length(max = 256))]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub unit_price: Decimal,
    #[validate(range(max = 999))]
    pub quantity: u32,
}

impl CartLine {
    /// The line's identity.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            variant_id: self.variant_id.clone(),
            size: self.size.clone(),
        }
    }

    /// `unit_price * quantity`, unrounded.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Aggregate figures shown next to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: u32,
    pub subtotal: Decimal,
}

/// Merge duplicate lines, drop empty ones, and clamp quantities.
///
/// The first occurrence of a key keeps its position and metadata; later
/// duplicates only contribute their quantity.
#[must_use]
pub fn normalize(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut out: Vec<CartLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<LineKey, usize> = HashMap::new();

    for line in lines {
        if line.quantity == 0 {
            continue;
        }
        if let Some(&pos) = index.get(&line.key()) {
            if let Some(existing) = out.get_mut(pos) {
                existing.quantity = clamp_quantity(existing.quantity.saturating_add(line.quantity));
            }
        } else {
            index.insert(line.key(), out.len());
            out.push(CartLine {
                quantity: clamp_quantity(line.quantity),
                ..line
            });
        }
    }

    out
}

/// Combine the client's cart with the stored server cart.
///
/// - `local_synced_at == None`: the local cart has never been synced (a guest
///   cart being adopted at sign-in). The result is the union of both carts,
///   summing quantities for shared lines.
/// - `local_synced_at == Some(t)`: the local cart is authoritative for every
///   line it contains. A line present only on the server survives only when
///   the server cart changed after `t`; otherwise the shopper removed it
///   locally and it is dropped.
///
/// Local lines come first in their original order, followed by surviving
/// server-only lines in server order.
#[must_use]
pub fn reconcile(
    local: Vec<CartLine>,
    local_synced_at: Option<DateTime<Utc>>,
    server: Vec<CartLine>,
    server_updated_at: Option<DateTime<Utc>>,
) -> Vec<CartLine> {
    let mut merged = normalize(local);
    let server = normalize(server);

    let mut index: HashMap<LineKey, usize> = merged
        .iter()
        .enumerate()
        .map(|(pos, line)| (line.key(), pos))
        .collect();

    let keep_server_only = match (local_synced_at, server_updated_at) {
        (None, _) => true,
        (Some(synced), Some(updated)) => updated > synced,
        (Some(_), None) => false,
    };

    for line in server {
        let key = line.key();
        match index.get(&key) {
            Some(&pos) => {
                if local_synced_at.is_none()
                    && let Some(existing) = merged.get_mut(pos)
                {
                    existing.quantity =
                        clamp_quantity(existing.quantity.saturating_add(line.quantity));
                }
            }
            None if keep_server_only => {
                index.insert(key, merged.len());
                merged.push(line);
            }
            None => {}
        }
    }

    merged
}

/// Item count and rounded subtotal.
#[must_use]
pub fn totals(lines: &[CartLine]) -> CartTotals {
    let item_count = lines.iter().map(|line| line.quantity).sum();
    let subtotal = lines.iter().map(CartLine::line_total).sum();
    CartTotals {
        item_count,
        subtotal: round_amount(subtotal),
    }
}

fn clamp_quantity(quantity: u32) -> u32 {
    quantity.min(MAX_LINE_QUANTITY)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(product: &str, variant: &str, size: Option<&str>, qty: u32) -> CartLine {
        CartLine {
            product_id: product.to_string(),
            variant_id: variant.to_string(),
            size: size.map(str::to_string),
            name: format!("{product} {variant}"),
            image_url: None,
            unit_price: Decimal::new(1999, 2),
            quantity: qty,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn keys(lines: &[CartLine]) -> Vec<(String, u32)> {
        lines
            .iter()
            .map(|l| (format!("{}/{}", l.product_id, l.variant_id), l.quantity))
            .collect()
    }

    #[test]
    fn test_normalize_merges_and_drops() {
        let lines = vec![
            line("p1", "v1", Some("M"), 2),
            line("p2", "v1", None, 0),
            line("p1", "v1", Some("M"), 3),
            line("p1", "v1", Some("L"), 1),
        ];
        let out = normalize(lines);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].quantity, 5);
        assert_eq!(out[1].size.as_deref(), Some("L"));
    }

    #[test]
    fn test_normalize_clamps_quantity() {
        let out = normalize(vec![line("p", "v", None, 80), line("p", "v", None, 80)]);
        assert_eq!(out[0].quantity, MAX_LINE_QUANTITY);
        let out = normalize(vec![line("p", "v", None, 500)]);
        assert_eq!(out[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_reconcile_guest_cart_unions() {
        let local = vec![line("a", "1", None, 1), line("b", "1", None, 2)];
        let server = vec![line("b", "1", None, 3), line("c", "1", None, 1)];
        let out = reconcile(local, None, server, Some(at(9)));
        assert_eq!(
            keys(&out),
            vec![("a/1".into(), 1), ("b/1".into(), 5), ("c/1".into(), 1)]
        );
    }

    #[test]
    fn test_reconcile_local_wins_on_shared_lines() {
        let local = vec![line("a", "1", None, 1)];
        let server = vec![line("a", "1", None, 7)];
        let out = reconcile(local, Some(at(10)), server, Some(at(12)));
        assert_eq!(keys(&out), vec![("a/1".into(), 1)]);
    }

    #[test]
    fn test_reconcile_drops_locally_removed_lines() {
        let local = vec![line("a", "1", None, 1)];
        let server = vec![line("a", "1", None, 1), line("b", "1", None, 1)];
        let out = reconcile(local, Some(at(10)), server, Some(at(10)));
        assert_eq!(keys(&out), vec![("a/1".into(), 1)]);
    }

    #[test]
    fn test_reconcile_keeps_lines_added_elsewhere() {
        let local = vec![line("a", "1", None, 1)];
        let server = vec![line("b", "1", None, 2), line("a", "1", None, 4)];
        let out = reconcile(local, Some(at(10)), server, Some(at(11)));
        assert_eq!(keys(&out), vec![("a/1".into(), 1), ("b/1".into(), 2)]);
    }

    #[test]
    fn test_reconcile_without_server_cart() {
        let local = vec![line("a", "1", None, 2)];
        let out = reconcile(local, Some(at(10)), Vec::new(), None);
        assert_eq!(keys(&out), vec![("a/1".into(), 2)]);
    }

    #[test]
    fn test_reconcile_sum_is_clamped() {
        let local = vec![line("a", "1", None, 60)];
        let server = vec![line("a", "1", None, 60)];
        let out = reconcile(local, None, server, None);
        assert_eq!(out[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_totals() {
        let lines = vec![line("a", "1", None, 2), line("b", "1", None, 1)];
        let t = totals(&lines);
        assert_eq!(t.item_count, 3);
        assert_eq!(t.subtotal, Decimal::new(5997, 2));
    }
}
