use std::collections::HashMap;

use chrono::NaiveDate;
use db::models::invoice::{Invoice, InvoiceStatus, PaymentStatus, PaymentTransaction};
use uuid::Uuid;

/// Sum of payments that were not refunded.
pub fn paid_amount(payments: &[PaymentTransaction]) -> i64 {
    payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

/// Derives an invoice status from its payments. A void invoice stays void;
/// otherwise it is paid exactly when the non-refunded payments cover the
/// total.
pub fn compute_invoice_status(
    total: i64,
    payments: &[PaymentTransaction],
    due_date: NaiveDate,
    today: NaiveDate,
    void: bool,
) -> InvoiceStatus {
    if void {
        return InvoiceStatus::Void;
    }
    let paid = paid_amount(payments);
    if paid >= total {
        InvoiceStatus::Paid
    } else if due_date < today {
        InvoiceStatus::Overdue
    } else if paid > 0 {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Unpaid
    }
}

/// Recomputes the status of every listed invoice from `payments`, which
/// may hold the payments of all of them. Returns the invoices whose stored
/// status was stale alongside the refreshed list.
pub fn refresh_statuses(
    invoices: Vec<Invoice>,
    payments: &[PaymentTransaction],
    today: NaiveDate,
) -> (Vec<Invoice>, Vec<(Uuid, InvoiceStatus)>) {
    let mut by_invoice: HashMap<Uuid, Vec<PaymentTransaction>> = HashMap::new();
    for payment in payments {
        by_invoice.entry(payment.invoice_id).or_default().push(payment.clone());
    }

    let mut stale = Vec::new();
    let refreshed = invoices
        .into_iter()
        .map(|mut invoice| {
            let own = by_invoice.get(&invoice.id).map(Vec::as_slice).unwrap_or(&[]);
            let computed = compute_invoice_status(
                invoice.total_amount,
                own,
                invoice.due_date,
                today,
                invoice.status == InvoiceStatus::Void,
            );
            if computed != invoice.status {
                stale.push((invoice.id, computed));
                invoice.status = computed;
            }
            invoice
        })
        .collect();
    (refreshed, stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::invoice::{BillableKind, PaymentMethod};

    fn payment(amount: i64, status: PaymentStatus) -> PaymentTransaction {
        PaymentTransaction {
            id: Uuid::new_v4(),
            invoice_id: Uuid::nil(),
            amount,
            method: PaymentMethod::Cash,
            status,
            reference: None,
            recorded_by: Uuid::nil(),
            paid_at: Utc::now(),
            refunded_at: None,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn paid_once_payments_cover_the_total() {
        let payments = [
            payment(4_000, PaymentStatus::Completed),
            payment(6_000, PaymentStatus::Completed),
        ];
        assert_eq!(
            compute_invoice_status(10_000, &payments, date(1), date(10), false),
            InvoiceStatus::Paid
        );
        let overpaid = [payment(12_000, PaymentStatus::Completed)];
        assert_eq!(
            compute_invoice_status(10_000, &overpaid, date(20), date(10), false),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn refunds_do_not_count() {
        let payments = [
            payment(10_000, PaymentStatus::Refunded),
            payment(2_500, PaymentStatus::Completed),
        ];
        assert_eq!(paid_amount(&payments), 2_500);
        assert_eq!(
            compute_invoice_status(10_000, &payments, date(20), date(10), false),
            InvoiceStatus::PartiallyPaid
        );
    }

    #[test]
    fn overdue_wins_over_partial() {
        let payments = [payment(2_500, PaymentStatus::Completed)];
        assert_eq!(
            compute_invoice_status(10_000, &payments, date(9), date(10), false),
            InvoiceStatus::Overdue
        );
        assert_eq!(
            compute_invoice_status(10_000, &[], date(10), date(10), false),
            InvoiceStatus::Unpaid
        );
    }

    #[test]
    fn void_is_sticky() {
        let payments = [payment(10_000, PaymentStatus::Completed)];
        assert_eq!(
            compute_invoice_status(10_000, &payments, date(1), date(10), true),
            InvoiceStatus::Void
        );
    }

    fn invoice(total: i64, due_day: u32, stored: InvoiceStatus) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            gym_id: Uuid::nil(),
            member_id: Uuid::nil(),
            billable_kind: BillableKind::Service,
            billable_id: None,
            description: None,
            total_amount: total,
            currency: "DZD".to_string(),
            due_date: date(due_day),
            status: stored,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn listed_invoices_show_their_current_status() {
        let past_due = invoice(10_000, 5, InvoiceStatus::Unpaid);
        let settled = invoice(10_000, 5, InvoiceStatus::PartiallyPaid);
        let upcoming = invoice(10_000, 25, InvoiceStatus::Unpaid);
        let voided = invoice(10_000, 1, InvoiceStatus::Void);

        let mut paid = payment(10_000, PaymentStatus::Completed);
        paid.invoice_id = settled.id;
        let mut stray = payment(10_000, PaymentStatus::Completed);
        stray.invoice_id = Uuid::new_v4();

        let ids = [past_due.id, settled.id, upcoming.id, voided.id];
        let (listed, stale) =
            refresh_statuses(vec![past_due, settled, upcoming, voided], &[paid, stray], date(10));

        let statuses: Vec<_> = listed.iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            vec![
                InvoiceStatus::Overdue,
                InvoiceStatus::Paid,
                InvoiceStatus::Unpaid,
                InvoiceStatus::Void
            ]
        );
        assert_eq!(
            stale,
            vec![(ids[0], InvoiceStatus::Overdue), (ids[1], InvoiceStatus::Paid)]
        );
    }
}
