//! Cart line quantities.
//!
//! Every cart line holds between 1 and [`Quantity::MAX`] units of a variant.
//! Requests that would push a line over the limit are reduced to fit, and a
//! line already at the limit cannot grow at all.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero units were requested.
    #[error("quantity must be at least 1")]
    Zero,
    /// More than the per-line maximum was requested.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
    },
}

/// Number of units of one variant in a cart, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Smallest quantity a cart line can hold.
    pub const MIN: u32 = 1;
    /// Largest quantity a cart line can hold.
    pub const MAX: u32 = 10;

    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity, rejecting values outside `1..=10`.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Zero`] or [`QuantityError::TooLarge`].
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value < Self::MIN {
            Err(QuantityError::Zero)
        } else if value > Self::MAX {
            Err(QuantityError::TooLarge { max: Self::MAX })
        } else {
            Ok(Self(value))
        }
    }

    /// Create a quantity by clamping any value into `1..=10`.
    #[must_use]
    pub const fn clamped(value: u32) -> Self {
        if value < Self::MIN {
            Self(Self::MIN)
        } else if value > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(value)
        }
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Plan how many units can be added to a line that already holds
    /// `existing` units.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Zero`] when `requested` is zero.
    ///
    /// ```
    /// use larkspur_core::{AddPlan, Quantity};
    ///
    /// assert_eq!(Quantity::plan_add(3, 4), Ok(AddPlan::Add(Quantity::new(4).unwrap())));
    /// assert_eq!(Quantity::plan_add(8, 5), Ok(AddPlan::Capped { added: Quantity::new(2).unwrap() }));
    /// assert_eq!(Quantity::plan_add(10, 1), Ok(AddPlan::AtLimit));
    /// ```
    pub fn plan_add(existing: u32, requested: u32) -> Result<AddPlan, QuantityError> {
        if requested == 0 {
            return Err(QuantityError::Zero);
        }

        if existing >= Self::MAX {
            return Ok(AddPlan::AtLimit);
        }

        let room = Self::MAX - existing;
        if requested <= room {
            Ok(AddPlan::Add(Self(requested)))
        } else {
            Ok(AddPlan::Capped { added: Self(room) })
        }
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of [`Quantity::plan_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPlan {
    /// The full request fits.
    Add(Quantity),
    /// Only part of the request fits; `added` brings the line to the limit.
    Capped {
        /// Units that will actually be added.
        added: Quantity,
    },
    /// The line is already at the limit; nothing is added.
    AtLimit,
}

impl AddPlan {
    /// Units this plan adds, or `None` for [`AddPlan::AtLimit`].
    #[must_use]
    pub const fn added(self) -> Option<Quantity> {
        match self {
            Self::Add(quantity) | Self::Capped { added: quantity } => Some(quantity),
            Self::AtLimit => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bounds() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(Quantity::new(10).unwrap().get(), 10);
        assert_eq!(
            Quantity::new(11),
            Err(QuantityError::TooLarge { max: 10 })
        );
    }

    #[test]
    fn test_clamped_stays_in_range() {
        for value in [0, 1, 5, 10, 11, 250, u32::MAX] {
            let q = Quantity::clamped(value).get();
            assert!((Quantity::MIN..=Quantity::MAX).contains(&q));
        }
        assert_eq!(Quantity::clamped(0).get(), 1);
        assert_eq!(Quantity::clamped(42).get(), 10);
    }

    #[test]
    fn test_plan_add_fits() {
        let plan = Quantity::plan_add(0, 3).unwrap();
        assert_eq!(plan, AddPlan::Add(Quantity::new(3).unwrap()));
        assert_eq!(plan.added().unwrap().get(), 3);

        let plan = Quantity::plan_add(7, 3).unwrap();
        assert_eq!(plan, AddPlan::Add(Quantity::new(3).unwrap()));
    }

    #[test]
    fn test_plan_add_capped() {
        let plan = Quantity::plan_add(9, 5).unwrap();
        assert_eq!(
            plan,
            AddPlan::Capped {
                added: Quantity::new(1).unwrap()
            }
        );
    }

    #[test]
    fn test_plan_add_never_exceeds_max() {
        for existing in 0..=12 {
            for requested in 1..=15 {
                let plan = Quantity::plan_add(existing, requested).unwrap();
                let total = existing + plan.added().map_or(0, Quantity::get);
                assert!(
                    total <= Quantity::MAX || plan == AddPlan::AtLimit,
                    "existing={existing} requested={requested}"
                );
            }
        }
    }

    #[test]
    fn test_plan_add_at_limit() {
        assert_eq!(Quantity::plan_add(10, 1).unwrap(), AddPlan::AtLimit);
        assert_eq!(Quantity::plan_add(12, 1).unwrap(), AddPlan::AtLimit);
        assert!(AddPlan::AtLimit.added().is_none());
    }

    #[test]
    fn test_plan_add_zero_rejected() {
        assert_eq!(Quantity::plan_add(2, 0), Err(QuantityError::Zero));
    }

    #[test]
    fn test_serde_validates() {
        let q: Quantity = serde_json::from_str("4").unwrap();
        assert_eq!(q.get(), 4);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("11").is_err());
    }
}
