//! Sale search criteria.
//!
//! Every criterion is optional and they combine with AND. Results are not
//! paginated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_sales::Sale;

/// Filter criteria for listing sales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleFilter {
    /// Exact sale number.
    pub sale_number: Option<i64>,
    /// Case-insensitive substring of the customer name.
    pub customer_name: Option<String>,
    /// Case-insensitive substring of the branch name.
    pub branch_name: Option<String>,
    /// When true only cancelled sales match. False does not filter.
    pub cancelled_only: bool,
    /// Inclusive lower bound on the sale date.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the sale date.
    pub date_to: Option<DateTime<Utc>>,
}

impl SaleFilter {
    /// In-process evaluation. Backends that filter in SQL must agree with this.
    pub fn matches(&self, sale: &Sale) -> bool {
        if let Some(n) = self.sale_number {
            if sale.sale_number() != n {
                return false;
            }
        }
        if let Some(needle) = non_blank(&self.customer_name) {
            if !contains_ignore_case(&sale.customer().name, needle) {
                return false;
            }
        }
        if let Some(needle) = non_blank(&self.branch_name) {
            if !contains_ignore_case(&sale.branch().name, needle) {
                return false;
            }
        }
        if self.cancelled_only && !sale.is_cancelled() {
            return false;
        }
        if let Some(from) = self.date_from {
            if sale.sale_date() < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if sale.sale_date() > to {
                return false;
            }
        }
        true
    }

    pub(crate) fn customer_name_pattern(&self) -> Option<String> {
        non_blank(&self.customer_name).map(like_pattern)
    }

    pub(crate) fn branch_name_pattern(&self) -> Option<String> {
        non_blank(&self.branch_name).map(like_pattern)
    }
}

/// Blank text criteria are ignored.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// `%needle%` with LIKE metacharacters escaped (backslash is the default escape).
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
