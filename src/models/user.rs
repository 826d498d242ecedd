use serde::Serialize;

use crate::error::{TicketError, TicketResult};

/// Account holding a non-negative point balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    id: i64,
    name: String,
    points: i64,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            points: 0,
        }
    }

    pub fn restore(id: i64, name: String, points: i64) -> Self {
        Self { id, name, points }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> i64 {
        self.points
    }

    pub fn charge_point(&mut self, amount: i64) -> TicketResult<()> {
        if amount <= 0 {
            return Err(TicketError::IllegalPointAmount);
        }
        // Overflow would wrap the balance negative.
        self.points = self
            .points
            .checked_add(amount)
            .ok_or(TicketError::IllegalPointAmount)?;
        Ok(())
    }

    pub fn use_point(&mut self, amount: i64) -> TicketResult<()> {
        if amount <= 0 {
            return Err(TicketError::IllegalPointAmount);
        }
        if amount > self.points {
            return Err(TicketError::InsufficientPoints);
        }
        self.points -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user_with(points: i64) -> User {
        User::restore(1, "payer".to_string(), points)
    }

    #[test]
    fn charge_then_spend() {
        let mut u = User::new("payer");
        assert_eq!(u.name(), "payer");
        u.charge_point(1500).unwrap();
        u.use_point(1000).unwrap();
        assert_eq!(u.points(), 500);
    }

    #[test]
    fn spending_whole_balance_leaves_zero() {
        let mut u = user_with(1000);
        u.use_point(1000).unwrap();
        assert_eq!(u.points(), 0);
        assert!(matches!(u.use_point(1), Err(TicketError::InsufficientPoints)));
    }

    #[test]
    fn charge_overflow_is_rejected() {
        let mut u = user_with(i64::MAX);
        assert!(matches!(u.charge_point(1), Err(TicketError::IllegalPointAmount)));
        assert_eq!(u.points(), i64::MAX);
    }

    proptest! {
        #[test]
        fn non_positive_charge_is_rejected(balance in 0i64..1_000_000, amount in i64::MIN..=0) {
            let mut u = user_with(balance);
            prop_assert!(matches!(u.charge_point(amount), Err(TicketError::IllegalPointAmount)));
            prop_assert_eq!(u.points(), balance);
        }

        #[test]
        fn non_positive_spend_is_rejected(balance in 0i64..1_000_000, amount in i64::MIN..=0) {
            let mut u = user_with(balance);
            prop_assert!(matches!(u.use_point(amount), Err(TicketError::IllegalPointAmount)));
            prop_assert_eq!(u.points(), balance);
        }

        #[test]
        fn spending_never_goes_negative(balance in 0i64..1_000_000, amounts in proptest::collection::vec(1i64..50_000, 0..40)) {
            let mut u = user_with(balance);
            for amount in amounts {
                let before = u.points();
                match u.use_point(amount) {
                    Ok(()) => prop_assert_eq!(u.points(), before - amount),
                    Err(TicketError::InsufficientPoints) => {
                        prop_assert!(amount > before);
                        prop_assert_eq!(u.points(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
                prop_assert!(u.points() >= 0);
            }
        }
    }
}
