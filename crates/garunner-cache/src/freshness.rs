//! Cache freshness policy
//!
//! Reports about a closed period never change, but the provider keeps
//! revising numbers for the current month. A cached response is served when
//! either
//!
//! 1. it was written today, or
//! 2. neither the queried end ("visited") date nor the created-month marker
//!    falls in the current month.
//!
//! "Today" is the full calendar date: an entry written on the same month
//! and day of an earlier year does not count. Months are likewise compared
//! as year and month together. A query without a
//! created-month marker satisfies the created-month half of rule 2.
//! All dates are local calendar days.

use chrono::{Datelike, NaiveDate};
use garunner_core::domain::{MonthMarker, ReportQuery};

/// Returns true if a response written on `modified` may be served for
/// `query` on `today`.
pub fn is_fresh(modified: NaiveDate, query: &ReportQuery, today: NaiveDate) -> bool {
    is_fresh_for(
        modified,
        query.end_date.resolve(today),
        query.created_date,
        today,
    )
}

/// Freshness over already resolved dates.
pub fn is_fresh_for(
    modified: NaiveDate,
    visited: NaiveDate,
    created: Option<MonthMarker>,
    today: NaiveDate,
) -> bool {
    if modified == today {
        return true;
    }

    let created_in_current_month = created.is_some_and(|c| same_month(c.date(), today));
    !same_month(visited, today) && !created_in_current_month
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}
