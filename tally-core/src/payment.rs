use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Enumerates the accepted payment instruments.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Check,
    Wire,
    Ach,
    CreditCard,
    Cash,
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Check => "check",
            PaymentMethod::Wire => "wire",
            PaymentMethod::Ach => "ach",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check" => Ok(PaymentMethod::Check),
            "wire" => Ok(PaymentMethod::Wire),
            "ach" => Ok(PaymentMethod::Ach),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "cash" => Ok(PaymentMethod::Cash),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}
