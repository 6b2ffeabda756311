//! Payment status derivation and financial aggregation.
//!
//! Status is a pure function of (charge amount, payment sum, due date,
//! today). It is recomputed on every read and never written back, so a
//! charge can move between statuses as payments land or the calendar
//! advances without any background job.

use chrono::NaiveDate;

use crate::models::{ChargeWithTotals, PaymentStatus};

/// Comparisons on money happen at cent granularity. Payment sums come out
/// of float aggregation, so half-a-cent of slack absorbs representation
/// noise without ever flipping a real cent.
pub const CENT_EPSILON: f64 = 0.005;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeStatus {
    pub status: PaymentStatus,
    pub total_paid: f64,
    pub remaining_amount: f64,
    pub is_overdue: bool,
}

/// Derives the status of a single charge as of `today`.
///
/// A charge due today is not overdue; a fully paid charge is never
/// overdue regardless of its due date.
pub fn derive(amount: f64, total_paid: f64, due_date: NaiveDate, today: NaiveDate) -> ChargeStatus {
    let total_paid = round2(total_paid);
    let remaining_amount = round2((amount - total_paid).max(0.0));

    let status = if total_paid + CENT_EPSILON >= amount {
        PaymentStatus::Paid
    } else if total_paid > CENT_EPSILON {
        PaymentStatus::PartiallyPaid
    } else {
        PaymentStatus::Unpaid
    };

    ChargeStatus {
        status,
        total_paid,
        remaining_amount,
        is_overdue: status != PaymentStatus::Paid && due_date < today,
    }
}

pub fn derive_for(charge: &ChargeWithTotals, today: NaiveDate) -> ChargeStatus {
    derive(
        charge.charge.amount,
        charge.total_paid,
        charge.charge.due_date,
        today,
    )
}

/// Month bucket key, e.g. "2026-03".
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Optional read-time filters for a charge listing. All present filters
/// must match.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChargeFilters<'a> {
    pub month: Option<&'a str>,
    pub status: Option<PaymentStatus>,
    pub overdue: Option<bool>,
}

pub fn matches(charge: &ChargeWithTotals, derived: ChargeStatus, filters: ChargeFilters) -> bool {
    if let Some(month) = filters.month {
        if month_key(charge.charge.due_date) != month {
            return false;
        }
    }
    if let Some(status) = filters.status {
        if derived.status != status {
            return false;
        }
    }
    if let Some(overdue) = filters.overdue {
        if derived.is_overdue != overdue {
            return false;
        }
    }
    true
}

/// Charges grouped into month buckets, preserving the incoming order
/// (newest due date first) both across and within buckets.
pub fn group_by_month(
    charges: Vec<(ChargeWithTotals, ChargeStatus)>,
) -> Vec<(String, Vec<(ChargeWithTotals, ChargeStatus)>)> {
    let mut groups: Vec<(String, Vec<(ChargeWithTotals, ChargeStatus)>)> = Vec::new();
    for entry in charges {
        let key = month_key(entry.0.charge.due_date);
        match groups.last_mut() {
            Some((current, bucket)) if *current == key => bucket.push(entry),
            _ => groups.push((key, vec![entry])),
        }
    }
    groups
}

/// Outstanding totals over a set of charges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DueTotals {
    /// Remaining amount across all non-paid charges.
    pub total_unpaid: f64,
    /// Remaining amount across the overdue subset.
    pub total_overdue: f64,
}

pub fn due_totals(charges: &[ChargeWithTotals], today: NaiveDate) -> DueTotals {
    let mut totals = DueTotals::default();
    for charge in charges {
        let derived = derive_for(charge, today);
        if derived.status == PaymentStatus::Paid {
            continue;
        }
        totals.total_unpaid += derived.remaining_amount;
        if derived.is_overdue {
            totals.total_overdue += derived.remaining_amount;
        }
    }
    totals.total_unpaid = round2(totals.total_unpaid);
    totals.total_overdue = round2(totals.total_overdue);
    totals
}

/// The next charges a tenant should care about: non-paid charges due
/// today or later, earliest due date first, capped at `limit`. Past-due
/// amounts are reported through `total_overdue`, not here.
pub fn upcoming(
    charges: &[ChargeWithTotals],
    today: NaiveDate,
    limit: usize,
) -> Vec<(ChargeWithTotals, ChargeStatus)> {
    let mut open: Vec<(ChargeWithTotals, ChargeStatus)> = charges
        .iter()
        .filter(|charge| charge.charge.due_date >= today)
        .map(|charge| (charge.clone(), derive_for(charge, today)))
        .filter(|(_, derived)| derived.status != PaymentStatus::Paid)
        .collect();
    open.sort_by(|a, b| {
        a.0.charge
            .due_date
            .cmp(&b.0.charge.due_date)
            .then(a.0.charge.id.cmp(&b.0.charge.id))
    });
    open.truncate(limit);
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Charge, ChargeType};
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn charge(amount: f64, total_paid: f64, due: NaiveDate) -> ChargeWithTotals {
        ChargeWithTotals {
            charge: Charge {
                id: Uuid::new_v4(),
                lease_id: Uuid::new_v4(),
                amount,
                due_date: due,
                charge_type: ChargeType::Rent,
                comment: None,
                attachment_path: None,
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            total_paid,
        }
    }

    fn today() -> NaiveDate {
        date(2026, 3, 15)
    }

    #[test]
    fn no_payments_is_unpaid_with_full_remainder() {
        let derived = derive(800.0, 0.0, date(2026, 4, 1), today());
        assert_eq!(derived.status, PaymentStatus::Unpaid);
        assert_eq!(derived.remaining_amount, 800.0);
        assert!(!derived.is_overdue);
    }

    #[test]
    fn partial_payment_is_partially_paid() {
        let derived = derive(800.0, 300.0, date(2026, 4, 1), today());
        assert_eq!(derived.status, PaymentStatus::PartiallyPaid);
        assert_eq!(derived.remaining_amount, 500.0);
    }

    #[test]
    fn exact_payment_sum_is_paid_despite_float_noise() {
        // 0.1 + 0.2 style sums must still reach "paid".
        let derived = derive(0.3, 0.1 + 0.2, date(2026, 4, 1), today());
        assert_eq!(derived.status, PaymentStatus::Paid);
        assert_eq!(derived.remaining_amount, 0.0);
    }

    #[test]
    fn due_today_is_not_overdue() {
        let derived = derive(100.0, 0.0, today(), today());
        assert!(!derived.is_overdue);

        let derived = derive(100.0, 0.0, today().pred_opt().unwrap(), today());
        assert!(derived.is_overdue);
    }

    #[test]
    fn paid_charge_is_never_overdue() {
        let derived = derive(100.0, 100.0, date(2026, 1, 1), today());
        assert_eq!(derived.status, PaymentStatus::Paid);
        assert!(!derived.is_overdue);
    }

    #[test]
    fn overdue_flag_flips_as_the_calendar_advances() {
        let due = date(2026, 3, 20);
        assert!(!derive(100.0, 0.0, due, date(2026, 3, 20)).is_overdue);
        assert!(derive(100.0, 0.0, due, date(2026, 3, 21)).is_overdue);
    }

    #[test]
    fn status_moves_with_payments_in_both_directions_of_reads() {
        // The same charge read with different payment sums yields
        // different statuses; nothing is cached between reads.
        let due = date(2026, 4, 1);
        assert_eq!(derive(500.0, 0.0, due, today()).status, PaymentStatus::Unpaid);
        assert_eq!(
            derive(500.0, 200.0, due, today()).status,
            PaymentStatus::PartiallyPaid
        );
        assert_eq!(derive(500.0, 500.0, due, today()).status, PaymentStatus::Paid);
    }

    #[test]
    fn groups_preserve_newest_first_order() {
        let charges = vec![
            charge(100.0, 0.0, date(2026, 4, 10)),
            charge(100.0, 0.0, date(2026, 4, 1)),
            charge(100.0, 0.0, date(2026, 3, 5)),
        ];
        let entries: Vec<_> = charges
            .into_iter()
            .map(|c| {
                let derived = derive_for(&c, today());
                (c, derived)
            })
            .collect();
        let groups = group_by_month(entries);

        let keys: Vec<&str> = groups.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["2026-04", "2026-03"]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn filters_compose() {
        let paid = charge(100.0, 100.0, date(2026, 3, 1));
        let overdue = charge(100.0, 0.0, date(2026, 3, 1));
        let upcoming_charge = charge(100.0, 0.0, date(2026, 4, 1));

        let filters = ChargeFilters {
            month: Some("2026-03"),
            status: Some(PaymentStatus::Unpaid),
            overdue: Some(true),
        };

        assert!(!matches(&paid, derive_for(&paid, today()), filters));
        assert!(matches(&overdue, derive_for(&overdue, today()), filters));
        assert!(!matches(
            &upcoming_charge,
            derive_for(&upcoming_charge, today()),
            filters
        ));
    }

    #[test]
    fn due_totals_split_overdue_from_outstanding() {
        let charges = vec![
            charge(800.0, 0.0, date(2026, 3, 1)),    // overdue, 800 open
            charge(120.0, 20.0, date(2026, 3, 10)),  // overdue, 100 open
            charge(800.0, 0.0, date(2026, 4, 1)),    // upcoming, 800 open
            charge(50.0, 50.0, date(2026, 2, 1)),    // paid, ignored
        ];
        let totals = due_totals(&charges, today());
        assert_eq!(totals.total_unpaid, 1700.0);
        assert_eq!(totals.total_overdue, 900.0);
    }

    #[test]
    fn upcoming_lists_open_charges_earliest_first_capped() {
        let charges = vec![
            charge(100.0, 100.0, date(2026, 3, 1)), // paid, excluded
            charge(100.0, 0.0, date(2026, 6, 1)),
            charge(100.0, 0.0, date(2026, 7, 1)), // beyond the cap
            charge(100.0, 0.0, date(2026, 4, 1)),
            charge(100.0, 0.0, date(2026, 5, 1)),
        ];
        let next = upcoming(&charges, today(), 3);
        let dues: Vec<NaiveDate> = next.iter().map(|(c, _)| c.charge.due_date).collect();
        assert_eq!(dues, vec![date(2026, 4, 1), date(2026, 5, 1), date(2026, 6, 1)]);
    }

    #[test]
    fn upcoming_excludes_past_due_charges() {
        // Past-due amounts belong to total_overdue, not the upcoming list.
        let charges = vec![charge(100.0, 0.0, date(2026, 3, 10))];
        assert!(upcoming(&charges, today(), 5).is_empty());

        // Due today is still upcoming.
        let charges = vec![charge(100.0, 0.0, today())];
        assert_eq!(upcoming(&charges, today(), 5).len(), 1);
    }
}
