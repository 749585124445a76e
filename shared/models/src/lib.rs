use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// An account able to call the API. `company_id` comes from the staff
/// profile and is `None` for users without one (typically superadmins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Active,
    Expired,
}

impl ContractStatus {
    /// Status of a contract ending on `valid_till`, as seen on `today`.
    pub fn for_validity(valid_till: NaiveDate, today: NaiveDate) -> Self {
        if valid_till >= today {
            ContractStatus::Active
        } else {
            ContractStatus::Expired
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "Active",
            ContractStatus::Expired => "Expired",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Active" => Ok(ContractStatus::Active),
            "Expired" => Ok(ContractStatus::Expired),
            other => Err(format!("unknown contract status {other:?}")),
        }
    }
}

/// A validated contract ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContract {
    pub company_id: i64,
    pub client_id: i64,
    pub location_id: i64,
    pub rate_card_id: i64,
    pub contract_no: String,
    pub valid_from: NaiveDate,
    pub valid_till: NaiveDate,
    pub status: ContractStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAttachment {
    pub id: i64,
    pub contract_id: i64,
    /// Path relative to the media root.
    pub file_path: String,
}

/// A stored contract joined with the display names of its related rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: i64,
    pub company_id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub location_id: i64,
    pub location_name: String,
    pub rate_card_id: i64,
    pub rate_card_name: String,
    pub contract_no: String,
    pub valid_from: NaiveDate,
    pub valid_till: NaiveDate,
    pub status: ContractStatus,
    pub attachments: Vec<ContractAttachment>,
}
