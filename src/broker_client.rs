use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::model::OptionType;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Broker API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BrokerError {
    fn from(e: reqwest::Error) -> Self {
        BrokerError::Network(e.to_string())
    }
}

/// Stock order in broker vocabulary (side/type already mapped).
#[derive(Debug, Clone)]
pub struct StockOrderRequest {
    pub symbol: String,
    pub side: String,
    pub quantity: u32,
    pub order_type: String,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

/// Single-leg option order in broker vocabulary.
#[derive(Debug, Clone)]
pub struct OptionOrderRequest {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub side: String,
    pub quantity: u32,
    pub order_type: String,
    pub limit_price: Option<Decimal>,
}

/// Broker acknowledgment. Presence of `id` is the sole truth of submission
/// success.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub id: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct MarketClock {
    pub is_open: bool,
    pub next_open: Option<DateTime<Utc>>,
    pub next_close: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    fn name(&self) -> &str;

    async fn place_stock_order(&self, order: &StockOrderRequest) -> Result<OrderAck, BrokerError>;

    async fn place_option_order(&self, order: &OptionOrderRequest)
    -> Result<OrderAck, BrokerError>;

    async fn market_clock(&self) -> Result<MarketClock, BrokerError>;
}

/// Build an OCC option symbol: root + YYMMDD + C/P + strike in eighths of
/// a cent, zero-padded to eight digits.
pub fn occ_symbol(
    underlying: &str,
    expiration: NaiveDate,
    option_type: OptionType,
    strike: Decimal,
) -> String {
    let type_code = match option_type {
        OptionType::Call => 'C',
        OptionType::Put => 'P',
    };
    let strike_milli = (strike * Decimal::from(1000)).to_i64().unwrap_or(0);
    format!(
        "{}{}{}{:08}",
        underlying.to_uppercase(),
        expiration.format("%y%m%d"),
        type_code,
        strike_milli
    )
}

/// Stands in when no broker credentials are configured: every call fails
/// with a configuration error. Paper-only deployments run fine on this —
/// the live path errors and the window oracle fails closed.
pub struct UnconfiguredBroker;

#[async_trait]
impl BrokerClient for UnconfiguredBroker {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn place_stock_order(&self, _order: &StockOrderRequest) -> Result<OrderAck, BrokerError> {
        Err(BrokerError::Config("broker credentials are not set".into()))
    }

    async fn place_option_order(
        &self,
        _order: &OptionOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        Err(BrokerError::Config("broker credentials are not set".into()))
    }

    async fn market_clock(&self) -> Result<MarketClock, BrokerError> {
        Err(BrokerError::Config("broker credentials are not set".into()))
    }
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: OrderBody,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    id: Option<serde_json::Value>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClockBody {
    is_open: bool,
    next_open: Option<DateTime<Utc>>,
    next_close: Option<DateTime<Utc>>,
}

/// Thin HTTP client for the primary brokerage's REST API. Wire details are
/// deliberately minimal; everything above this speaks TradeIntent.
pub struct HttpBrokerClient {
    name: String,
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    account_id: String,
}

impl HttpBrokerClient {
    pub fn from_config(cfg: &BrokerConfig) -> Result<Self, BrokerError> {
        let access_token = cfg
            .access_token
            .clone()
            .ok_or_else(|| BrokerError::Config("broker.access_token is not set".into()))?;
        let account_id = cfg
            .account_id
            .clone()
            .ok_or_else(|| BrokerError::Config("broker.account_id is not set".into()))?;
        Ok(Self {
            name: cfg.name.clone().unwrap_or_else(|| "tradier".to_string()),
            http: reqwest::Client::new(),
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://sandbox.tradier.com".to_string()),
            access_token,
            account_id,
        })
    }

    async fn post_order(&self, params: Vec<(&str, String)>) -> Result<OrderAck, BrokerError> {
        let url = format!("{}/v1/accounts/{}/orders", self.base_url, self.account_id);
        debug!(url = %url, "Submitting broker order");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BrokerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: OrderEnvelope = response.json().await?;
        Ok(OrderAck {
            id: envelope.order.id.map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            status: envelope.order.status.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[async_trait]
impl BrokerClient for HttpBrokerClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn place_stock_order(&self, order: &StockOrderRequest) -> Result<OrderAck, BrokerError> {
        let mut params = vec![
            ("class", "equity".to_string()),
            ("symbol", order.symbol.clone()),
            ("side", order.side.clone()),
            ("quantity", order.quantity.to_string()),
            ("type", order.order_type.clone()),
            ("duration", "day".to_string()),
        ];
        if let Some(price) = order.limit_price {
            params.push(("price", price.to_string()));
        }
        if let Some(stop) = order.stop_price {
            params.push(("stop", stop.to_string()));
        }
        self.post_order(params).await
    }

    async fn place_option_order(
        &self,
        order: &OptionOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        let symbol = occ_symbol(
            &order.underlying,
            order.expiration,
            order.option_type,
            order.strike,
        );
        let mut params = vec![
            ("class", "option".to_string()),
            ("symbol", order.underlying.to_uppercase()),
            ("option_symbol", symbol),
            ("side", order.side.clone()),
            ("quantity", order.quantity.to_string()),
            ("type", order.order_type.clone()),
            ("duration", "day".to_string()),
        ];
        if let Some(price) = order.limit_price {
            params.push(("price", price.to_string()));
        }
        self.post_order(params).await
    }

    async fn market_clock(&self) -> Result<MarketClock, BrokerError> {
        let url = format!("{}/v2/clock", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BrokerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ClockBody = response.json().await?;
        Ok(MarketClock {
            is_open: body.is_open,
            next_open: body.next_open,
            next_close: body.next_close,
        })
    }
}
