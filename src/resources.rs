//! Payday resource catalog
//!
//! Maps a logical resource name to its REST route, its MCP bridge tool and
//! how it is fetched. Resource names are directory names in the Bronze layer
//! and must stay stable.

use chrono::NaiveDate;
use serde::Serialize;

/// How a resource is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Page through the full collection
    Paginated,
    /// One call returning a single object or a small list
    Single,
    /// One call over a date range, from the statement start date to today
    DateRange,
}

/// A Payday resource definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Stable logical name
    pub name: &'static str,
    /// REST route relative to the API base URL
    pub route: &'static str,
    /// MCP bridge tool, if the bridge exposes this resource
    pub tool: Option<&'static str>,
    /// Fetch strategy
    pub strategy: FetchStrategy,
}

/// All known resources
pub const RESOURCES: &[Resource] = &[
    Resource {
        name: "accounts",
        route: "/v1/accounting/accounts",
        tool: Some("payday_get_accounts"),
        strategy: FetchStrategy::Paginated,
    },
    Resource {
        name: "account-statement",
        route: "/v1/accounting/statement",
        tool: Some("payday_get_account_statement"),
        strategy: FetchStrategy::DateRange,
    },
    Resource {
        name: "transactions",
        route: "/v1/accounting/transactions",
        tool: None,
        strategy: FetchStrategy::Paginated,
    },
    Resource {
        name: "company",
        route: "/v1/company",
        tool: Some("payday_get_company"),
        strategy: FetchStrategy::Single,
    },
    Resource {
        name: "customers",
        route: "/v1/customers",
        tool: Some("payday_get_customers"),
        strategy: FetchStrategy::Paginated,
    },
    Resource {
        name: "invoices",
        route: "/v1/invoices",
        tool: Some("payday_get_invoices"),
        strategy: FetchStrategy::Paginated,
    },
    Resource {
        name: "expenses",
        route: "/v1/expenses",
        tool: Some("payday_get_expenses"),
        strategy: FetchStrategy::Paginated,
    },
    Resource {
        name: "expense-accounts",
        route: "/v1/expenses/accounts",
        tool: Some("payday_get_expense_accounts"),
        strategy: FetchStrategy::Single,
    },
    Resource {
        name: "expense-payment-types",
        route: "/v1/expenses/paymenttypes",
        tool: Some("payday_get_expense_payment_types"),
        strategy: FetchStrategy::Single,
    },
    Resource {
        name: "payments",
        route: "/v1/payments",
        tool: Some("payday_get_payments"),
        strategy: FetchStrategy::Paginated,
    },
];

impl Resource {
    /// Find a resource by name
    pub fn lookup(name: &str) -> Option<&'static Resource> {
        RESOURCES.iter().find(|r| r.name == name)
    }

    /// Names of every known resource
    pub fn names() -> impl Iterator<Item = &'static str> {
        RESOURCES.iter().map(|r| r.name)
    }

    /// Name as used in warehouse identifiers (`account-statement` → `account_statement`)
    pub fn table_name(&self) -> String {
        table_name(self.name)
    }
}

/// Convert a resource or directory name to a SQL-safe identifier
pub fn table_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Date window sent with date-range resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// Inclusive start
    pub from: NaiveDate,
    /// Inclusive end
    pub to: NaiveDate,
}

impl DateWindow {
    /// Window from `from` until today (UTC)
    pub fn until_today(from: NaiveDate) -> Self {
        Self {
            from,
            to: chrono::Utc::now().date_naive(),
        }
    }
}
