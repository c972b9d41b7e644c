use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, Event, Webhook,
};

/// 一次性托管支付页的参数
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams<'a> {
    pub order_id: i64,
    pub product_name: &'a str,
    /// 折后金额(美分)
    pub amount: i64,
    pub customer_email: Option<&'a str>,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: String,
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
        }
    }

    /// 创建 Stripe Checkout 会话，client_reference_id 为订单 ID，供 webhook 回查
    pub async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams<'_>,
    ) -> AppResult<CheckoutSessionInfo> {
        if params.amount <= 0 {
            return Err(AppError::ValidationError(
                "Checkout amount must be positive".to_string(),
            ));
        }

        let order_ref = params.order_id.to_string();
        let mut metadata = HashMap::new();
        metadata.insert("order_id".to_string(), order_ref.clone());

        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Payment);
        create.success_url = Some(params.success_url);
        create.cancel_url = Some(params.cancel_url);
        create.client_reference_id = Some(order_ref.as_str());
        create.customer_email = params.customer_email;
        create.metadata = Some(metadata);
        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(params.amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: params.product_name.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = CheckoutSession::create(&self.client, create).await?;
        let url = session.url.ok_or_else(|| {
            AppError::ExternalApiError("Stripe checkout session has no URL".to_string())
        })?;

        Ok(CheckoutSessionInfo {
            id: session.id.to_string(),
            url,
        })
    }

    pub fn verify_webhook_signature(&self, payload: &str, signature: &str) -> AppResult<Event> {
        if signature.is_empty() {
            return Err(AppError::AuthError("Invalid webhook signature".to_string()));
        }
        Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::AuthError(format!("Invalid webhook signature: {e}")))
    }
}
