use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{CoreError, Result};

/// Runtime configuration for the marketplace core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    /// Fraction of an order's total kept by the platform (seller receives
    /// the remainder).
    pub platform_fee_rate: Decimal,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/bazaar_development".to_string(),
            max_db_connections: 10,
            platform_fee_rate: Decimal::new(5, 2), // 0.05
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(max_connections) = std::env::var("BAZAAR_MAX_DB_CONNECTIONS") {
            config.max_db_connections = max_connections.parse().map_err(|e| {
                CoreError::Internal(format!("Invalid max_db_connections: {e}"))
            })?;
        }

        if let Ok(rate) = std::env::var("BAZAAR_PLATFORM_FEE_RATE") {
            let rate = Decimal::from_str(&rate)
                .map_err(|e| CoreError::Internal(format!("Invalid platform_fee_rate: {e}")))?;
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(CoreError::Internal(format!(
                    "platform_fee_rate must be in [0, 1), got {rate}"
                )));
            }
            config.platform_fee_rate = rate;
        }

        Ok(config)
    }
}
