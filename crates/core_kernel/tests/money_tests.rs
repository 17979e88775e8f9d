//! Comprehensive unit tests for the Money module
//!
//! Tests cover money creation, arithmetic operations, summation,
//! currency handling, and edge cases.

use core_kernel::{Currency, Money, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(100.50), Currency::SAR);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::SAR);
    }

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::USD);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_halalas_correctly() {
        let m = Money::from_minor(10050, Currency::SAR);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_negative_amount_is_not_positive() {
        let m = Money::new(dec!(-100.00), Currency::USD);
        assert!(!m.is_positive());
        assert!(!m.is_zero());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(100.25), Currency::SAR);
        let b = Money::new(dec!(49.75), Currency::SAR);
        let total = a.checked_add(&b).unwrap();
        assert_eq!(total.amount(), dec!(150.00));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::new(dec!(100.00), Currency::USD);
        let b = Money::new(dec!(100.00), Currency::EUR);
        assert!(matches!(
            a.checked_add(&b),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::new(dec!(50.00), Currency::SAR);
        let b = Money::new(dec!(80.00), Currency::SAR);
        let diff = a.checked_sub(&b).unwrap();
        assert_eq!(diff.amount(), dec!(-30.00));
    }

    #[test]
    fn test_operator_add() {
        let a = Money::from_minor(10_000, Currency::SAR);
        let b = Money::from_minor(2_550, Currency::SAR);
        assert_eq!((a + b).amount(), dec!(125.50));
    }
}

mod summation {
    use super::*;

    #[test]
    fn test_sum_empty_iterator_is_zero() {
        let total = Money::sum(Currency::SAR, [].iter()).unwrap();
        assert!(total.is_zero());
        assert_eq!(total.currency(), Currency::SAR);
    }

    #[test]
    fn test_sum_many_amounts() {
        let amounts: Vec<Money> = (1..=100)
            .map(|n| Money::from_minor(n, Currency::SAR))
            .collect();
        let total = Money::sum(Currency::SAR, amounts.iter()).unwrap();
        assert_eq!(total.amount(), dec!(50.50));
    }

    #[test]
    fn test_sum_rejects_foreign_currency() {
        let amounts = vec![
            Money::new(dec!(10.00), Currency::SAR),
            Money::new(dec!(10.00), Currency::AED),
        ];
        assert!(Money::sum(Currency::SAR, amounts.iter()).is_err());
    }
}

mod rounding {
    use super::*;

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(10.1250), Currency::SAR).round_to_currency();
        assert_eq!(m.amount(), dec!(10.12));
    }

    #[test]
    fn test_display_uses_currency_places() {
        let m = Money::new(dec!(99.5), Currency::SAR);
        assert_eq!(m.to_string(), "SAR 99.50");
    }
}
