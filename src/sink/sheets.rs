//! Google Sheets v4 REST implementation of [`Sink`].
//!
//! Talks directly to the `values` and `batchUpdate` endpoints with a
//! bearer token. Appends use RAW input with INSERT_ROWS and are verified
//! against the response's updated-row count; structural edits (row
//! deletion, filter reset) resolve the worksheet's numeric grid id once
//! and cache it.

use super::{OfferRow, Sink, SinkError, SinkResult, LOG_HEADERS, OFFER_HEADERS};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";
const OFFERS_TAB: &str = "Card Offers";
const LOG_TAB: &str = "Log";

pub struct SheetsSink {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
    offers_gid: Mutex<Option<i64>>,
}

impl SheetsSink {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
            offers_gid: Mutex::new(None),
        }
    }

    /// Point at a non-default API host. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.base_url,
            self.spreadsheet_id,
            urlencode(range),
            suffix
        )
    }

    async fn check(&self, resp: reqwest::Response) -> SinkResult<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn read_range(&self, range: &str) -> SinkResult<Vec<Vec<String>>> {
        let resp = self
            .http
            .get(self.values_url(range, ""))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body = self.check(resp).await?;
        let mut out = Vec::new();
        if let Some(rows) = body.get("values").and_then(Value::as_array) {
            for row in rows {
                let cells = row
                    .as_array()
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|c| c.as_str().unwrap_or_default().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                out.push(cells);
            }
        }
        Ok(out)
    }

    async fn write_range(&self, range: &str, values: Value) -> SinkResult<()> {
        let resp = self
            .http
            .put(self.values_url(range, "?valueInputOption=RAW"))
            .bearer_auth(&self.token)
            .json(&json!({ "values": values }))
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }

    async fn append_range(&self, tab: &str, values: Value, expect_rows: usize) -> SinkResult<()> {
        let resp = self
            .http
            .post(self.values_url(
                &format!("{tab}!A1"),
                ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            ))
            .bearer_auth(&self.token)
            .json(&json!({ "values": values }))
            .send()
            .await?;
        let body = self.check(resp).await?;
        let updated = body
            .pointer("/updates/updatedRows")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        if updated != expect_rows {
            return Err(SinkError::Schema(format!(
                "append to {tab} reported {updated} rows, expected {expect_rows}"
            )));
        }
        Ok(())
    }

    async fn batch_update(&self, requests: Value) -> SinkResult<()> {
        let url = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }

    /// Numeric grid id of the offers worksheet, fetched once.
    async fn offers_grid_id(&self) -> SinkResult<i64> {
        if let Some(gid) = *self.offers_gid.lock().unwrap() {
            return Ok(gid);
        }
        let url = format!(
            "{}/v4/spreadsheets/{}?fields=sheets.properties",
            self.base_url, self.spreadsheet_id
        );
        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        let body = self.check(resp).await?;
        let gid = body
            .get("sheets")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|s| s.get("properties"))
            .find(|p| p.get("title").and_then(Value::as_str) == Some(OFFERS_TAB))
            .and_then(|p| p.get("sheetId"))
            .and_then(Value::as_i64)
            .ok_or_else(|| SinkError::Schema(format!("no worksheet titled '{OFFERS_TAB}'")))?;
        *self.offers_gid.lock().unwrap() = Some(gid);
        Ok(gid)
    }

    async fn ensure_tab_headers(&self, tab: &str, headers: &[&str]) -> SinkResult<()> {
        let last = column_letter(headers.len() - 1);
        let range = format!("{tab}!A1:{last}1");
        let current = self.read_range(&range).await?;
        let matches = current
            .first()
            .is_some_and(|row| row.iter().map(String::as_str).eq(headers.iter().copied()));
        if matches {
            return Ok(());
        }
        tracing::info!("repairing header row of '{tab}'");
        self.write_range(&range, json!([headers])).await
    }
}

fn column_letter(col: usize) -> char {
    // schema is 10 columns wide, well inside A..Z
    (b'A' + col as u8) as char
}

fn urlencode(range: &str) -> String {
    range.replace(' ', "%20")
}

#[async_trait]
impl Sink for SheetsSink {
    async fn append_rows(&self, rows: &[OfferRow]) -> SinkResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let values: Vec<Vec<String>> = rows.iter().map(OfferRow::to_cells).collect();
        self.append_range(OFFERS_TAB, json!(values), rows.len())
            .await
    }

    async fn read_all(&self) -> SinkResult<Vec<Vec<String>>> {
        let last = column_letter(OFFER_HEADERS.len() - 1);
        self.read_range(&format!("{OFFERS_TAB}!A2:{last}")).await
    }

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> SinkResult<()> {
        // +2: one for the header row, one for 1-based A1 notation
        let range = format!("{OFFERS_TAB}!{}{}", column_letter(col), row + 2);
        self.write_range(&range, json!([[value]])).await
    }

    async fn delete_rows(&self, start: usize, end: usize) -> SinkResult<()> {
        let gid = self.offers_grid_id().await?;
        // +1 skips the header row in sheet coordinates
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": gid,
                    "dimension": "ROWS",
                    "startIndex": start + 1,
                    "endIndex": end + 1,
                }
            }
        }]))
        .await
    }

    async fn reset_filter(&self, rows: usize) -> SinkResult<()> {
        let gid = self.offers_grid_id().await?;
        self.batch_update(json!([
            { "clearBasicFilter": { "sheetId": gid } },
            { "setBasicFilter": { "filter": { "range": {
                "sheetId": gid,
                "startRowIndex": 0,
                "endRowIndex": rows + 1,
                "startColumnIndex": 0,
                "endColumnIndex": OFFER_HEADERS.len(),
            }}}},
        ]))
        .await
    }

    async fn ensure_headers(&self) -> SinkResult<()> {
        self.ensure_tab_headers(OFFERS_TAB, &OFFER_HEADERS).await?;
        self.ensure_tab_headers(LOG_TAB, &LOG_HEADERS).await
    }

    async fn append_log(&self, level: &str, func: &str, msg: &str) -> SinkResult<()> {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.append_range(LOG_TAB, json!([[stamp, level, func, msg]]), 1)
            .await
    }
}
