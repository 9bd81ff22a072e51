use db::models::{
    billing::AppSubscription, gym::Gym, invoice::{Invoice, InvoiceStatus},
    membership::MembershipStatus, user::User,
};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    client::{ApiClient, decode},
    error::ClientError,
    models::{
        Blocker, BlockerEnvelope, CancelBody, DowngradeBody, GymsPage, InvoicesPage, LoginBody,
        Member, MembersPage, MySubscription, Region, Session, SubscribeBody, SubscribeOutcome,
    },
};

fn body<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Query string form of a snake_case enum.
fn query_value<T: Serialize>(value: &T) -> Result<String, ClientError> {
    match body(value)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

impl ApiClient {
    // === AUTH ===

    /// Logs in and keeps the returned tokens for later calls.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let payload = body(&LoginBody { email, password })?;
        let res = self.execute(Method::POST, "auth/login", &[], Some(&payload)).await?;
        let session: Session = decode(res).await?;
        self.set_access_token(Some(session.access_token.clone()));
        Ok(session)
    }

    /// Revokes the refresh token server side. Local tokens are dropped even
    /// when the call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let res = self.execute(Method::POST, "auth/logout", &[], None).await;
        self.clear_session();
        decode::<()>(res?).await
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.call(Method::GET, "user/me", &[], None).await
    }

    // === BILLING ===

    /// `None` when the user never subscribed.
    pub async fn my_subscription(&self) -> Result<Option<MySubscription>, ClientError> {
        self.call(Method::GET, "billing/sub/me", &[], None).await
    }

    pub async fn subscribe(&self, req: &SubscribeBody) -> Result<SubscribeOutcome, ClientError> {
        self.call(Method::POST, "billing/sub/subscribe", &[], Some(body(req)?))
            .await
    }

    pub async fn cancel_subscription(&self, reason: Option<&str>) -> Result<AppSubscription, ClientError> {
        self.call(Method::POST, "billing/sub/cancel", &[], Some(body(&CancelBody { reason })?))
            .await
    }

    pub async fn reactivate_subscription(&self) -> Result<AppSubscription, ClientError> {
        self.call(Method::POST, "billing/sub/reactivate", &[], None).await
    }

    pub async fn downgrade(&self, req: &DowngradeBody) -> Result<AppSubscription, ClientError> {
        self.call(Method::POST, "billing/sub/downgrade", &[], Some(body(req)?))
            .await
    }

    pub async fn blocker(&self) -> Result<Option<Blocker>, ClientError> {
        let envelope: BlockerEnvelope = self.call(Method::GET, "billing/sub/blocker", &[], None).await?;
        Ok(envelope.blocker)
    }

    // === GYMS ===

    pub async fn my_gyms(&self) -> Result<Vec<Gym>, ClientError> {
        let page: GymsPage = self.call(Method::GET, "gyms", &[], None).await?;
        Ok(page.gyms)
    }

    pub async fn members(
        &self,
        gym_id: Uuid,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<Member>, ClientError> {
        let mut query = Vec::new();
        if let Some(status) = status {
            query.push(("status", query_value(&status)?));
        }
        let page: MembersPage = self
            .call(Method::GET, &format!("gyms/{}/members", gym_id), &query, None)
            .await?;
        Ok(page.members)
    }

    // === PAYMENTS ===

    pub async fn invoices(
        &self,
        gym_id: Uuid,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, ClientError> {
        let mut query = Vec::new();
        if let Some(status) = status {
            query.push(("status", query_value(&status)?));
        }
        let page: InvoicesPage = self
            .call(Method::GET, &format!("payments/{}/invoices", gym_id), &query, None)
            .await?;
        Ok(page.invoices)
    }

    // === REGION ===

    pub async fn region(&self) -> Result<Region, ClientError> {
        let res = self.execute(Method::GET, "region", &[], None).await?;
        decode(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_filters_use_wire_names() {
        assert_eq!(query_value(&InvoiceStatus::PartiallyPaid).unwrap(), "partially_paid");
        assert_eq!(query_value(&MembershipStatus::Active).unwrap(), "active");
    }
}
