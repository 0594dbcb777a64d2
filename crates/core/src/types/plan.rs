//! The static plan catalog.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Credits, Price};

/// Stable plan identifier, used in URLs and checkout receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    Basic,
    Pro,
    Premium,
}

impl PlanId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a plan id does not name a catalog entry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown plan: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for PlanId {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "premium" => Ok(Self::Premium),
            other => Err(UnknownPlan(other.to_owned())),
        }
    }
}

/// How often a plan's credits are granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Month,
    Year,
}

impl BillingPeriod {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// A purchasable credit bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub credits: Credits,
    pub price: Price,
    pub period: BillingPeriod,
    pub features: &'static [&'static str],
    pub popular: bool,
}

impl Plan {
    /// Free plans bypass the payment gateway entirely.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.price.is_free()
    }

    /// Label for the plan card's button.
    #[must_use]
    pub const fn button_label(&self) -> &'static str {
        if self.is_free() {
            "Current Plan"
        } else {
            "Choose Plan"
        }
    }

    /// Look up a plan by id.
    #[must_use]
    pub fn get(id: PlanId) -> Self {
        match id {
            PlanId::Basic => Self {
                id,
                name: "Basic Free",
                credits: Credits::new(50),
                price: Price::inr(0),
                period: BillingPeriod::Month,
                features: &["50 Credits/Month", "Basic Support", "Standard Quality"],
                popular: false,
            },
            PlanId::Pro => Self {
                id,
                name: "Pro",
                credits: Credits::new(1000),
                price: Price::inr(80),
                period: BillingPeriod::Month,
                features: &[
                    "1000 Credits/Month",
                    "Priority Support",
                    "HD Quality",
                    "Fast Processing",
                ],
                popular: true,
            },
            PlanId::Premium => Self {
                id,
                name: "Premium",
                credits: Credits::new(12000),
                price: Price::inr(900),
                period: BillingPeriod::Year,
                features: &[
                    "12000 Credits/Year",
                    "24/7 Premium Support",
                    "4K Quality",
                    "Lightning Fast",
                    "Early Access",
                ],
                popular: false,
            },
        }
    }
}

/// All plans, in display order.
#[must_use]
pub fn catalog() -> [Plan; 3] {
    [
        Plan::get(PlanId::Basic),
        Plan::get(PlanId::Pro),
        Plan::get(PlanId::Premium),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_and_credits() {
        let plans = catalog();
        let ids: Vec<_> = plans.iter().map(|p| p.id).collect();
        assert_eq!(ids, [PlanId::Basic, PlanId::Pro, PlanId::Premium]);
        let credits: Vec<_> = plans.iter().map(|p| p.credits.get()).collect();
        assert_eq!(credits, [50, 1000, 12000]);
    }

    #[test]
    fn test_only_basic_is_free() {
        let free: Vec<_> = catalog().into_iter().filter(Plan::is_free).map(|p| p.id).collect();
        assert_eq!(free, [PlanId::Basic]);
        assert_eq!(Plan::get(PlanId::Basic).button_label(), "Current Plan");
        assert_eq!(Plan::get(PlanId::Pro).button_label(), "Choose Plan");
    }

    #[test]
    fn test_prices_in_paise() {
        assert_eq!(Plan::get(PlanId::Pro).price.minor_units(), Some(8000));
        assert_eq!(Plan::get(PlanId::Premium).price.minor_units(), Some(90_000));
    }

    #[test]
    fn test_only_pro_is_popular() {
        assert!(Plan::get(PlanId::Pro).popular);
        assert!(!Plan::get(PlanId::Basic).popular);
        assert!(!Plan::get(PlanId::Premium).popular);
    }

    #[test]
    fn test_plan_id_round_trip_and_unknown() {
        for plan in catalog() {
            assert_eq!(plan.id.as_str().parse::<PlanId>(), Ok(plan.id));
        }
        assert_eq!(
            "enterprise".parse::<PlanId>(),
            Err(UnknownPlan("enterprise".to_owned()))
        );
    }
}
