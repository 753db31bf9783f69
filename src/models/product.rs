use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace listing. The core only reads products (ownership and price
/// checks); listing CRUD lives with the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    /// Owning user (the seller).
    pub user_id: i64,
    pub title: String,
    pub price: Decimal,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Available,
    InProcess,
    /// Committed to an exchange
    Trading,
    Sold,
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::InProcess => write!(f, "in_process"),
            Self::Trading => write!(f, "trading"),
            Self::Sold => write!(f, "sold"),
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "in_process" => Ok(Self::InProcess),
            "trading" => Ok(Self::Trading),
            "sold" => Ok(Self::Sold),
            _ => Err(format!("Invalid product status: {s}")),
        }
    }
}
