use crate::core::provider::SeriesProvider;
use crate::core::series::{Observation, Series, SERIES_WINDOW, normalize};
use crate::providers::util::{build_client, get_json};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const HISTORY_PATH: &str = "/FundMNewApi/FundMNHisNetList";

/// Domestic fund-history provider keyed by bare fund codes.
pub struct EastmoneyProvider {
    base_url: String,
    client: Client,
}

impl EastmoneyProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(REFERER, HeaderValue::from_static("https://fund.eastmoney.com/"));

        Ok(EastmoneyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout, headers)?,
        })
    }

    fn history_url(&self, code: &str) -> Result<Url> {
        let page_size = SERIES_WINDOW.to_string();
        Url::parse_with_params(
            &format!("{}{}", self.base_url, HISTORY_PATH),
            &[
                ("FCODE", code),
                ("pageIndex", "1"),
                ("pageSize", page_size.as_str()),
                ("appType", "ttjj"),
                ("product", "EFund"),
                ("plat", "Iphone"),
                ("deviceid", "00000000-0000-0000-0000-000000000000"),
                ("Version", "1"),
                ("lf", "1"),
                ("ctoken", ""),
                ("userId", ""),
                ("u", "0"),
                ("UToken", ""),
                ("range", "1m"),
            ],
        )
        .with_context(|| format!("Invalid Eastmoney URL for fund code: {code}"))
    }
}

#[derive(Deserialize, Debug)]
struct HistoryResponse {
    #[serde(rename = "Data")]
    data: Option<HistoryData>,
    #[serde(rename = "Datas")]
    datas: Option<Vec<NavRecord>>,
}

#[derive(Deserialize, Debug)]
struct HistoryData {
    #[serde(rename = "LSJZList")]
    list: Option<Vec<NavRecord>>,
}

#[derive(Deserialize, Debug)]
struct NavRecord {
    #[serde(rename = "FSRQ")]
    date: Option<String>,
    #[serde(rename = "DWJZ")]
    unit_value: Option<Value>,
}

impl NavRecord {
    fn observation(&self) -> Option<Observation> {
        let date = NaiveDate::parse_from_str(self.date.as_deref()?.trim(), "%Y-%m-%d").ok()?;
        let price = match self.unit_value.as_ref()? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        price.is_finite().then(|| Observation::new(date, price))
    }
}

impl HistoryResponse {
    fn into_records(self) -> Vec<NavRecord> {
        match self.data.and_then(|d| d.list) {
            Some(list) if !list.is_empty() => list,
            _ => self.datas.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SeriesProvider for EastmoneyProvider {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    #[instrument(name = "EastmoneySeriesFetch", skip(self), fields(code = %code))]
    async fn fetch_series(&self, code: &str) -> Result<Series> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.history_url(code)?;
        let response: HistoryResponse = get_json(&self.client, url)
            .await
            .with_context(|| format!("Eastmoney history request failed for {code}"))?;

        let records = response.into_records();
        let observations: Vec<Observation> =
            records.iter().filter_map(NavRecord::observation).collect();
        debug!(
            "Parsed {} of {} Eastmoney records for {}",
            observations.len(),
            records.len(),
            code
        );

        Ok(normalize(observations))
    }
}
