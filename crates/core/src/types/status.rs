//! Status enums for orders, fulfillment, and account linkage.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Orders move forward only: `pending → processing → shipped → delivered`.
/// Any state that is not final may be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Shipped => 2,
            Self::Delivered => 3,
            Self::Cancelled => 4,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_final() {
            return false;
        }
        match next {
            Self::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// The lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How an order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.fulfillment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMethod {
    Delivery,
    Pickup,
}

impl std::fmt::Display for FulfillmentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery => write!(f, "delivery"),
            Self::Pickup => write!(f, "pickup"),
        }
    }
}

/// Identity provider backing a linked account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.auth_provider", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    /// Email + password.
    Credentials,
    /// Google OAuth.
    Google,
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials => write!(f, "credentials"),
            Self::Google => write!(f, "google"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Shipped));
        assert!(Processing.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_cancellation() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&FulfillmentMethod::Pickup).unwrap(),
            "\"pickup\""
        );
        assert_eq!(
            serde_json::to_string(&AuthProvider::Credentials).unwrap(),
            "\"credentials\""
        );
    }
}
