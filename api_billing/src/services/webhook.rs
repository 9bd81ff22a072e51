use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::{
    billing::history_entry,
    models::billing::{AppSubscription, AppSubscriptionStatus, HistoryAction, PlanLevel},
};
use sqlx::{PgConnection, types::Json};
use stripe::{Event, EventObject, EventType, Invoice, Subscription, SubscriptionStatus, Webhook};
use uuid::Uuid;

use super::{plan, status};

/// Metadata key the checkout flow stores on provider subscriptions.
pub const USER_ID_METADATA: &str = "user_id";

/// Creates an event for the webhook based on the request payload and signature.
/// Requires a webhook secret key.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            log::error!("Error constructing webhook event: {}", e);
            Err(AppError::BadRequest(format!("Webhook Error: {}", e)))
        }
    }
}

/// A provider subscription only attaches to a live subscription on a paid
/// plan.
pub fn is_linkable(sub: &AppSubscription, level: PlanLevel) -> bool {
    matches!(
        sub.status,
        AppSubscriptionStatus::Active | AppSubscriptionStatus::Trialing
    ) && level != PlanLevel::Free
}

/// Records a successful charge on a live subscription. Returns whether a
/// trial was converted, or `None` when `sub` is cancelled or expired and
/// was left untouched.
pub fn apply_payment(sub: &mut AppSubscription, now: DateTime<Utc>) -> Option<bool> {
    let converted = match sub.status {
        AppSubscriptionStatus::Trialing => true,
        AppSubscriptionStatus::Active => false,
        AppSubscriptionStatus::Cancelled | AppSubscriptionStatus::Expired => return None,
    };
    if let Some(trial) = sub.trial.as_mut().filter(|_| converted) {
        trial.0.converted_to_paid = true;
    }
    sub.status = AppSubscriptionStatus::Active;
    sub.soft_grace_period = None;
    sub.last_payment_date = Some(now);
    Some(converted)
}

fn timestamp(ts: i64) -> Res<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid timestamp in event: {}", ts)))
}

/// Applies a verified provider event. Unknown events are acknowledged.
pub async fn process_event(conn: &mut PgConnection, event: Event, now: DateTime<Utc>) -> Res<()> {
    log::info!("Processing webhook event: {}", event.type_);

    match (event.type_, event.data.object) {
        (
            EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated,
            EventObject::Subscription(provider_sub),
        ) => sync_subscription(conn, &provider_sub).await,
        (EventType::CustomerSubscriptionDeleted, EventObject::Subscription(provider_sub)) => {
            subscription_deleted(conn, &provider_sub, now).await
        }
        (EventType::InvoicePaymentSucceeded, EventObject::Invoice(invoice)) => {
            payment_succeeded(conn, &invoice, now).await
        }
        (EventType::InvoicePaymentFailed, EventObject::Invoice(invoice)) => {
            payment_failed(conn, &invoice, now).await
        }
        (other, _) => {
            log::info!("Unhandled event type: {}", other);
            Ok(())
        }
    }
}

/// Finds our subscription for a provider one, linking it through the
/// checkout metadata the first time it is seen.
async fn linked_subscription(
    conn: &mut PgConnection,
    provider_sub: &Subscription,
) -> Res<Option<AppSubscription>> {
    let provider_id = provider_sub.id.to_string();
    if let Some(sub) = db::billing::find_by_provider_id(&mut *conn, &provider_id).await? {
        return Ok(Some(sub));
    }

    let Some(user_id) = provider_sub
        .metadata
        .get(USER_ID_METADATA)
        .and_then(|raw| Uuid::parse_str(raw).ok())
    else {
        log::warn!("Provider subscription {} has no user metadata", provider_id);
        return Ok(None);
    };

    let Some(mut sub) = db::billing::find_current_subscription(&mut *conn, user_id).await? else {
        return Ok(None);
    };
    let level = plan::get_plan(&mut *conn, &sub.plan_id).await?.level;
    if !is_linkable(&sub, level) {
        log::warn!(
            "Not linking provider subscription {} to {} ({:?}, {:?} plan)",
            provider_id,
            sub.id,
            sub.status,
            level
        );
        return Ok(None);
    }

    sub.provider = Some("stripe".to_string());
    sub.provider_subscription_id = Some(provider_id);
    Ok(Some(sub))
}

async fn invoice_subscription(conn: &mut PgConnection, invoice: &Invoice) -> Res<Option<AppSubscription>> {
    let Some(provider_id) = invoice.subscription.as_ref().map(|s| s.id().to_string()) else {
        log::info!("Invoice {} is not tied to a subscription", invoice.id);
        return Ok(None);
    };
    let sub = db::billing::find_by_provider_id(&mut *conn, &provider_id).await?;
    if sub.is_none() {
        log::warn!("No subscription linked to provider id {}", provider_id);
    }
    Ok(sub)
}

async fn sync_subscription(conn: &mut PgConnection, provider_sub: &Subscription) -> Res<()> {
    let Some(mut sub) = linked_subscription(conn, provider_sub).await? else {
        return Ok(());
    };

    sub.current_period_start = timestamp(provider_sub.current_period_start)?;
    sub.current_period_end = timestamp(provider_sub.current_period_end)?;
    sub.cancel_at_period_end = provider_sub.cancel_at_period_end;

    match provider_sub.status {
        SubscriptionStatus::Active => sub.status = AppSubscriptionStatus::Active,
        SubscriptionStatus::Trialing => sub.status = AppSubscriptionStatus::Trialing,
        SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired => {
            sub.status = AppSubscriptionStatus::Cancelled;
            sub.end_date = Some(sub.current_period_end.max(sub.start_date));
        }
        // past due and unpaid fall through to the grace rules once the period ends
        _ => {}
    }
    if sub.status == AppSubscriptionStatus::Active && !sub.cancel_at_period_end {
        sub.next_payment_date = Some(sub.current_period_end);
    }

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    log::info!("Synced subscription {} from provider ({:?})", sub.id, sub.status);
    Ok(())
}

async fn subscription_deleted(
    conn: &mut PgConnection,
    provider_sub: &Subscription,
    now: DateTime<Utc>,
) -> Res<()> {
    let Some(mut sub) = linked_subscription(conn, provider_sub).await? else {
        return Ok(());
    };

    sub.status = AppSubscriptionStatus::Cancelled;
    sub.cancelled_at = sub.cancelled_at.or(Some(now));
    sub.end_date = Some(now.max(sub.start_date));
    sub.auto_renew = false;
    sub.next_payment_date = None;

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            HistoryAction::Cancelled,
            None,
            0,
            None,
            Some("Cancelled by payment provider".to_string()),
        ),
    )
    .await?;
    log::info!("Subscription {} cancelled by provider", sub.id);
    Ok(())
}

async fn payment_succeeded(conn: &mut PgConnection, invoice: &Invoice, now: DateTime<Utc>) -> Res<()> {
    let Some(mut sub) = invoice_subscription(conn, invoice).await? else {
        return Ok(());
    };

    let Some(converted) = apply_payment(&mut sub, now) else {
        log::warn!(
            "Ignoring payment for subscription {} in status {:?}",
            sub.id,
            sub.status
        );
        return Ok(());
    };

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    let action = if converted {
        HistoryAction::TrialConverted
    } else {
        HistoryAction::Renewed
    };
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            action,
            None,
            invoice.amount_paid.unwrap_or(0),
            invoice.currency.map(|c| c.to_string().to_uppercase()),
            Some(format!("Invoice {}", invoice.id)),
        ),
    )
    .await?;

    log::info!("Payment recorded for subscription {}", sub.id);
    Ok(())
}

async fn payment_failed(conn: &mut PgConnection, invoice: &Invoice, now: DateTime<Utc>) -> Res<()> {
    let Some(mut sub) = invoice_subscription(conn, invoice).await? else {
        return Ok(());
    };

    if sub.soft_grace().is_some() {
        return Ok(());
    }

    sub.soft_grace_period = Some(Json(status::open_grace(now)));
    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    log::warn!("Payment failed for subscription {}, soft grace opened", sub.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::status::tests::{at, subscription};
    use db::models::billing::{SoftGracePeriod, TrialInfo};

    #[test]
    fn payment_does_not_revive_ended_subscriptions() {
        for ended in [AppSubscriptionStatus::Cancelled, AppSubscriptionStatus::Expired] {
            let mut sub = subscription(at(1, 0), at(31, 0));
            sub.status = ended;
            assert_eq!(apply_payment(&mut sub, at(5, 0)), None);
            assert_eq!(sub.status, ended);
            assert!(sub.last_payment_date.is_none());
        }
    }

    #[test]
    fn payment_renews_and_converts_trials() {
        let mut active = subscription(at(1, 0), at(31, 0));
        active.soft_grace_period = Some(Json(SoftGracePeriod {
            start_date: at(1, 0),
            expires_at: at(1, 6),
        }));
        assert_eq!(apply_payment(&mut active, at(2, 0)), Some(false));
        assert!(active.soft_grace_period.is_none());
        assert_eq!(active.last_payment_date, Some(at(2, 0)));

        let mut trial = subscription(at(1, 0), at(15, 0));
        trial.status = AppSubscriptionStatus::Trialing;
        trial.trial = Some(Json(TrialInfo {
            start_date: at(1, 0),
            end_date: at(15, 0),
            has_used_trial: true,
            converted_to_paid: false,
        }));
        assert_eq!(apply_payment(&mut trial, at(15, 0)), Some(true));
        assert_eq!(trial.status, AppSubscriptionStatus::Active);
        assert!(trial.trial().is_some_and(|t| t.converted_to_paid));
    }

    #[test]
    fn only_live_paid_subscriptions_are_linked() {
        let sub = subscription(at(1, 0), at(31, 0));
        assert!(is_linkable(&sub, PlanLevel::Pro));
        assert!(!is_linkable(&sub, PlanLevel::Free));

        let mut cancelled = subscription(at(1, 0), at(31, 0));
        cancelled.status = AppSubscriptionStatus::Cancelled;
        assert!(!is_linkable(&cancelled, PlanLevel::Pro));
    }
}
