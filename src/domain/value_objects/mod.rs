//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multiplier applied to a unit price to produce `price_with_tax`.
pub const TAX_RATE: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

/// Unit price of a product: two decimal places, at least 1, at most 9999.99.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct UnitPrice(Decimal);

impl UnitPrice {
    pub const MIN: Decimal = Decimal::ONE;
    pub const MAX: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

    pub fn new(value: Decimal) -> Result<Self, PriceError> {
        if value.normalize().scale() > 2 { return Err(PriceError::TooPrecise); }
        if value < Self::MIN { return Err(PriceError::BelowMinimum); }
        if value > Self::MAX { return Err(PriceError::TooLarge); }
        let mut value = value;
        value.rescale(2);
        Ok(Self(value))
    }

    pub fn amount(&self) -> Decimal { self.0 }

    pub fn with_tax(&self) -> Decimal { (self.0 * TAX_RATE).round_dp(2) }

    pub fn times(&self, qty: Quantity) -> Decimal { self.0 * Decimal::from(qty.value()) }
}

impl TryFrom<Decimal> for UnitPrice {
    type Error = PriceError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<UnitPrice> for Decimal {
    fn from(price: UnitPrice) -> Self { price.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PriceError { BelowMinimum, TooLarge, TooPrecise }
impl std::error::Error for PriceError {}
impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimum => write!(f, "Ensure this value is greater than or equal to 1."),
            Self::TooLarge => write!(f, "Ensure that there are no more than 6 digits in total."),
            Self::TooPrecise => write!(f, "Ensure that there are no more than 2 decimal places."),
        }
    }
}

/// Quantity of a product held in a cart or ordered; always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i32) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::NotPositive); }
        Ok(Self(value))
    }
    pub fn value(&self) -> i32 { self.0 }
    pub fn add(&self, other: Quantity) -> Result<Self, QuantityError> {
        self.0.checked_add(other.0).map(Self).ok_or(QuantityError::TooLarge)
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: i32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self { q.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { NotPositive, TooLarge }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositive => write!(f, "Ensure this value is greater than or equal to 1."),
            Self::TooLarge => write!(f, "Ensure this value is less than or equal to {}.", i32::MAX),
        }
    }
}

/// Customer membership tier, stored and serialized as a one letter code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Membership {
    #[default]
    #[serde(rename = "B")] Bronze,
    #[serde(rename = "S")] Silver,
    #[serde(rename = "G")] Gold,
}

impl Membership {
    pub fn code(&self) -> &'static str {
        match self { Self::Bronze => "B", Self::Silver => "S", Self::Gold => "G" }
    }
}

impl FromStr for Membership {
    type Err = CodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "B" => Ok(Self::Bronze), "S" => Ok(Self::Silver), "G" => Ok(Self::Gold), other => Err(CodeError(other.to_string())) }
    }
}

/// Payment state of an order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "P")] Pending,
    #[serde(rename = "C")] Complete,
    #[serde(rename = "F")] Failed,
}

impl PaymentStatus {
    pub fn code(&self) -> &'static str {
        match self { Self::Pending => "P", Self::Complete => "C", Self::Failed => "F" }
    }
}

impl FromStr for PaymentStatus {
    type Err = CodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s { "P" => Ok(Self::Pending), "C" => Ok(Self::Complete), "F" => Ok(Self::Failed), other => Err(CodeError(other.to_string())) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct CodeError(pub String);
impl std::error::Error for CodeError {}
impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "\"{}\" is not a valid choice.", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_price_bounds() {
        assert_eq!(UnitPrice::new(Decimal::new(99, 2)), Err(PriceError::BelowMinimum));
        assert_eq!(UnitPrice::new(Decimal::new(1_000_000, 2)), Err(PriceError::TooLarge));
        assert_eq!(UnitPrice::new(Decimal::new(10_001, 3)), Err(PriceError::TooPrecise));
        assert!(UnitPrice::new(Decimal::new(999_999, 2)).is_ok());
    }

    #[test]
    fn test_unit_price_rescales_to_cents() {
        let p = UnitPrice::new(Decimal::new(10, 0)).unwrap();
        assert_eq!(p.amount().to_string(), "10.00");
        let p = UnitPrice::new(Decimal::new(12_500, 3)).unwrap();
        assert_eq!(p.amount().to_string(), "12.50");
    }

    #[test]
    fn test_price_with_tax() {
        let p = UnitPrice::new(Decimal::new(1999, 2)).unwrap();
        assert_eq!(p.with_tax().to_string(), "21.99");
    }

    #[test]
    fn test_quantity() {
        assert!(Quantity::new(0).is_err());
        let q = Quantity::new(2).unwrap().add(Quantity::new(3).unwrap()).unwrap();
        assert_eq!(q.value(), 5);
        let max = Quantity::new(i32::MAX).unwrap();
        assert_eq!(max.add(Quantity::new(1).unwrap()), Err(QuantityError::TooLarge));
        assert!(serde_json::from_str::<Quantity>("-1").is_err());
    }

    #[test]
    fn test_membership_codes() {
        assert_eq!(serde_json::to_string(&Membership::Gold).unwrap(), "\"G\"");
        assert_eq!("S".parse::<Membership>().unwrap(), Membership::Silver);
        assert!("X".parse::<Membership>().is_err());
        assert_eq!(Membership::default(), Membership::Bronze);
    }
}
