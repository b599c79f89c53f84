use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::broker::{
    Broker, BrokerPosition, ClosingDeal, OrderReceipt, OrderRequest, PendingOrder, Quote,
};
use crate::config::Config;
use crate::models::{Bar, BarSeries, Tick, Timeframe};

const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
const TOKEN_TTL_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct JwtClaims {
    sub: String,
    iss: String,
    nbf: u64,
    exp: u64,
    uri: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    bid: f64,
    ask: f64,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    tick_volume: f64,
}

#[derive(Debug, Deserialize)]
struct TicksResponse {
    ticks: Vec<RawTick>,
}

#[derive(Debug, Deserialize)]
struct RawTick {
    time_msc: i64,
    bid: f64,
    ask: f64,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    positions: Vec<BrokerPosition>,
}

#[derive(Debug, Deserialize)]
struct DealsResponse {
    deals: Vec<RawDeal>,
}

#[derive(Debug, Deserialize)]
struct RawDeal {
    deal_id: u64,
    position_id: u64,
    price: f64,
    profit: f64,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    orders: Vec<PendingOrder>,
}

#[derive(Debug, Deserialize)]
struct CancelResponse {
    retcode: i64,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
struct PlaceResponse {
    retcode: i64,
    order: u64,
    deal: u64,
    price: f64,
    #[serde(default)]
    comment: String,
}

// MT5 TRADE_RETCODE_DONE / TRADE_RETCODE_PLACED, as the bridge passes them through.
const RETCODE_DONE: i64 = 10009;
const RETCODE_PLACED: i64 = 10008;

/// HTTP client for the MT5 gateway bridge. Each request is authorized with a
/// short-lived HS256 token signed with the shared secret.
pub struct RestBroker {
    client: Client,
    base_url: String,
    shared_secret: String,
    last_request: Mutex<Option<Instant>>,
}

impl RestBroker {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.bridge_base_url.trim_end_matches('/').to_string(),
            shared_secret: cfg.bridge_shared_secret.clone(),
            last_request: Mutex::new(None),
        }
    }

    fn generate_token(&self, method: &str, path: &str) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = JwtClaims {
            sub: "signal-sentry".to_string(),
            iss: "mt5-bridge".to_string(),
            nbf: now,
            exp: now + TOKEN_TTL_SECS,
            uri: format!("{} {}", method, path),
        };

        let key = EncodingKey::from_secret(self.shared_secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key).context("Failed to sign bridge token")
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        self.rate_limit().await;
        let token = self.generate_token("GET", path)?;
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .with_context(|| format!("Bridge GET {} failed", path))?;
        Ok(resp)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        self.rate_limit().await;
        let token = self.generate_token("POST", path)?;
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .with_context(|| format!("Bridge POST {} failed", path))?;
        Ok(resp)
    }
}

fn ensure_success(resp: &reqwest::Response, what: &str) -> Result<()> {
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("Bridge error on {}: {}", what, status);
    }
    Ok(())
}

#[async_trait]
impl Broker for RestBroker {
    async fn best_bid_ask(&self, symbol: &str) -> Result<Option<Quote>> {
        let path = format!("/api/v1/quote/{}", symbol);
        let resp = self.get(&path, &[]).await?;

        // The bridge answers 404 when the symbol has no current tick.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        ensure_success(&resp, "quote")?;

        let data: QuoteResponse = resp.json().await.context("Failed to parse quote")?;
        Ok(Some(Quote {
            bid: data.bid,
            ask: data.ask,
        }))
    }

    async fn bars(
        &self,
        symbol: &str,
        tf: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BarSeries> {
        let path = format!("/api/v1/bars/{}", symbol);
        let query = [
            ("timeframe", tf.mt5_code().to_string()),
            ("from", from.timestamp().to_string()),
            ("to", to.timestamp().to_string()),
        ];
        let resp = self.get(&path, &query).await?;
        ensure_success(&resp, "bars")?;

        let data: BarsResponse = resp.json().await.context("Failed to parse bars")?;
        let bars: Vec<Bar> = data
            .bars
            .into_iter()
            .filter_map(|rb| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp(rb.time, 0)?,
                    open: rb.open,
                    high: rb.high,
                    low: rb.low,
                    close: rb.close,
                    volume: rb.tick_volume,
                })
            })
            .filter(|b| b.is_valid())
            .collect();

        let mut series = BarSeries::new(bars);
        series.sort_by_time();
        Ok(series)
    }

    async fn ticks(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tick>> {
        let path = format!("/api/v1/ticks/{}", symbol);
        let query = [
            ("from", from.timestamp_millis().to_string()),
            ("to", to.timestamp_millis().to_string()),
        ];
        let resp = self.get(&path, &query).await?;
        ensure_success(&resp, "ticks")?;

        let data: TicksResponse = resp.json().await.context("Failed to parse ticks")?;
        let mut ticks: Vec<Tick> = data
            .ticks
            .into_iter()
            .filter_map(|rt| {
                Some(Tick {
                    timestamp: DateTime::from_timestamp_millis(rt.time_msc)?,
                    bid: rt.bid,
                    ask: rt.ask,
                })
            })
            .collect();

        ticks.sort_by_key(|t| t.timestamp);
        Ok(ticks)
    }

    async fn open_positions(&self, ticket: u64) -> Result<Vec<BrokerPosition>> {
        let resp = self
            .get("/api/v1/positions", &[("ticket", ticket.to_string())])
            .await?;
        ensure_success(&resp, "positions")?;
        let data: PositionsResponse = resp.json().await.context("Failed to parse positions")?;
        Ok(data.positions)
    }

    async fn closing_deals(&self, position_id: u64) -> Result<Vec<ClosingDeal>> {
        let resp = self
            .get("/api/v1/deals", &[("position", position_id.to_string())])
            .await?;
        ensure_success(&resp, "deals")?;
        let data: DealsResponse = resp.json().await.context("Failed to parse deals")?;

        let mut deals: Vec<ClosingDeal> = data
            .deals
            .into_iter()
            .filter_map(|rd| {
                Some(ClosingDeal {
                    deal_id: rd.deal_id,
                    position_id: rd.position_id,
                    price: rd.price,
                    profit: rd.profit,
                    closed_at: DateTime::from_timestamp(rd.time, 0)?,
                })
            })
            .collect();

        deals.sort_by_key(|d| d.closed_at);
        Ok(deals)
    }

    async fn open_orders(&self, ticket: u64) -> Result<Vec<PendingOrder>> {
        let resp = self
            .get("/api/v1/orders", &[("ticket", ticket.to_string())])
            .await?;
        ensure_success(&resp, "orders")?;
        let data: OrdersResponse = resp.json().await.context("Failed to parse orders")?;
        Ok(data.orders)
    }

    async fn cancel_order(&self, ticket: u64) -> Result<bool> {
        let path = format!("/api/v1/orders/{}/cancel", ticket);
        let resp = self.post_json(&path, &serde_json::json!({})).await?;
        ensure_success(&resp, "cancel")?;
        let data: CancelResponse = resp.json().await.context("Failed to parse cancel result")?;
        if data.retcode != RETCODE_DONE {
            tracing::warn!(
                "Cancel of order {} refused: retcode={} comment={}",
                ticket,
                data.retcode,
                data.comment
            );
        }
        Ok(data.retcode == RETCODE_DONE)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt> {
        let resp = self.post_json("/api/v1/orders", request).await?;
        ensure_success(&resp, "place order")?;
        let data: PlaceResponse = resp.json().await.context("Failed to parse order result")?;

        Ok(OrderReceipt {
            accepted: data.retcode == RETCODE_DONE || data.retcode == RETCODE_PLACED,
            order: data.order,
            deal: data.deal,
            price: data.price,
            comment: data.comment,
        })
    }
}
