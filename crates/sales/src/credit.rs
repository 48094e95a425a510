//! Customer store credit.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{CreditId, DomainError, DomainResult, Money};

/// Store credit lifecycle. Credits are never deleted, only transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditStatus {
    Active,
    Redeemed,
    Voided,
}

impl CreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Active => "active",
            CreditStatus::Redeemed => "redeemed",
            CreditStatus::Voided => "voided",
        }
    }
}

impl FromStr for CreditStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CreditStatus::Active),
            "redeemed" => Ok(CreditStatus::Redeemed),
            "voided" => Ok(CreditStatus::Voided),
            other => Err(DomainError::validation(format!("unknown credit status '{other}'"))),
        }
    }
}

/// Monetary balance held by a customer, created by accepted returns.
///
/// A customer holds at most one `Active` credit; later returns increase it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCredit {
    pub id: CreditId,
    pub customer_name: String,
    pub credit_amount: Money,
    pub status: CreditStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoreCredit {
    pub fn open(customer_name: impl Into<String>, amount: Money, at: DateTime<Utc>) -> Self {
        Self {
            id: CreditId::new(),
            customer_name: customer_name.into(),
            credit_amount: amount,
            status: CreditStatus::Active,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CreditStatus::Active
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::validation(format!(
                "store credit {} is {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Increase the balance of an active credit.
    pub fn add(&self, amount: Money, at: DateTime<Utc>) -> DomainResult<StoreCredit> {
        self.ensure_active()?;
        Ok(StoreCredit {
            credit_amount: self.credit_amount.checked_add(amount)?,
            updated_at: at,
            ..self.clone()
        })
    }

    /// Consume part or all of an active credit against a purchase.
    ///
    /// A credit whose balance reaches zero becomes `Redeemed`.
    pub fn redeem(&self, amount: Money, at: DateTime<Utc>) -> DomainResult<StoreCredit> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(DomainError::validation("redeemed amount must be greater than zero"));
        }
        if amount > self.credit_amount {
            return Err(DomainError::validation(format!(
                "cannot redeem {amount} from store credit {} with balance {}",
                self.id, self.credit_amount
            )));
        }

        let credit_amount = self.credit_amount.checked_sub(amount)?;
        let status = if credit_amount.is_zero() {
            CreditStatus::Redeemed
        } else {
            CreditStatus::Active
        };
        Ok(StoreCredit {
            credit_amount,
            status,
            updated_at: at,
            ..self.clone()
        })
    }

    pub fn void(&self, at: DateTime<Utc>) -> DomainResult<StoreCredit> {
        self.ensure_active()?;
        Ok(StoreCredit {
            status: CreditStatus::Voided,
            updated_at: at,
            ..self.clone()
        })
    }
}
