use crate::core::provider::SeriesProvider;
use crate::core::series::{Observation, Series, normalize};
use crate::providers::util::{build_client, get_json};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Window requested from the chart endpoint; comfortably covers the 35
/// trading days kept per series.
const CHART_RANGE: &str = "6mo";

fn to_calendar_date(ts: i64, offset: Option<&FixedOffset>) -> Option<NaiveDate> {
    let utc = DateTime::from_timestamp(ts, 0)?;
    Some(match offset {
        Some(offset) => utc.with_timezone(offset).date_naive(),
        None => utc.date_naive(),
    })
}

fn extract_observations(chart_item: &PriceChartItem) -> Vec<Observation> {
    let (Some(timestamps), Some(closes)) = (
        chart_item.timestamp.as_ref(),
        chart_item
            .indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return Vec::new();
    };

    let offset = chart_item
        .meta
        .as_ref()
        .and_then(|m| m.gmtoffset)
        .and_then(|secs| i32::try_from(secs).ok())
        .and_then(FixedOffset::east_opt);

    timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let close = close.as_f64()?;
            let date = to_calendar_date(*ts, offset.as_ref())?;
            close.is_finite().then(|| Observation::new(date, close))
        })
        .collect()
}

/// Global chart provider keyed by exchange-qualified symbols.
pub struct YahooFinanceProvider {
    base_url: String,
    client: Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout, HeaderMap::new())?,
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/v8/finance/chart/{}", self.base_url, symbol),
            &[("interval", "1d"), ("range", CHART_RANGE)],
        )
        .with_context(|| format!("Invalid chart URL for symbol: {symbol}"))
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    // Missing closes arrive as `null` or as the string "null"
    close: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: Option<PriceChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    gmtoffset: Option<i64>,
}

#[async_trait]
impl SeriesProvider for YahooFinanceProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    #[instrument(name = "YahooSeriesFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_series(&self, symbol: &str) -> Result<Series> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.chart_url(&symbol)?;
        let data: YahooChartResponse = get_json(&self.client, url)
            .await
            .with_context(|| format!("Yahoo chart request failed for {symbol}"))?;

        let item = match data.chart.result.as_deref().and_then(|r| r.first()) {
            Some(item) => item,
            None => {
                debug!("No chart result for symbol: {}", symbol);
                return Ok(Vec::new());
            }
        };

        let observations = extract_observations(item);
        if observations.is_empty() && item.timestamp.is_some() && item.indicators.is_none() {
            return Err(anyhow!("Chart for {} has timestamps but no quotes", symbol));
        }
        debug!("Parsed {} closes for {}", observations.len(), symbol);

        Ok(normalize(observations))
    }
}
