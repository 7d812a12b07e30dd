use crate::core::Storage;
use crate::domain::model::{format_money, Transaction};
use crate::utils::error::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const STATEMENT_FILE: &str = "statement.zip";

#[derive(Debug, Clone, Serialize)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub total: f64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub transactions: Vec<Transaction>,
    pub period_total: f64,
    pub today_total: f64,
    pub next_payout: NaiveDate,
}

impl WalletSummary {
    /// 只計算已完成的交易；日期以 UTC 日曆日為準
    pub fn build(mut transactions: Vec<Transaction>, today: NaiveDate) -> Self {
        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        let period_total = transactions
            .iter()
            .filter(|t| t.is_completed())
            .map(|t| t.amount)
            .sum();
        let today_total = transactions
            .iter()
            .filter(|t| t.is_completed() && t.date.date_naive() == today)
            .map(|t| t.amount)
            .sum();

        Self {
            transactions,
            period_total,
            today_total,
            next_payout: next_payout_date(today),
        }
    }

    /// Newest day first.
    pub fn by_day(&self) -> Vec<DayGroup> {
        let mut groups: Vec<DayGroup> = Vec::new();
        for tx in &self.transactions {
            let day = tx.date.date_naive();
            match groups.last_mut() {
                Some(group) if group.day == day => {
                    if tx.is_completed() {
                        group.total += tx.amount;
                    }
                    group.transactions.push(tx.clone());
                }
                _ => groups.push(DayGroup {
                    day,
                    total: if tx.is_completed() { tx.amount } else { 0.0 },
                    transactions: vec![tx.clone()],
                }),
            }
        }
        groups
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["id", "date", "type", "status", "description", "amount", "distance"])?;
        for tx in &self.transactions {
            let date = tx.date.to_rfc3339();
            let kind = json_label(&tx.kind)?;
            let status = json_label(&tx.status)?;
            let amount = format!("{:.2}", tx.amount);
            writer.write_record([
                tx.id.as_str(),
                date.as_str(),
                kind.as_str(),
                status.as_str(),
                tx.restaurant.as_str(),
                amount.as_str(),
                tx.distance.as_deref().unwrap_or(""),
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| crate::utils::error::CourierError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Writes `statement.zip` (CSV + JSON) to storage and returns its key.
    pub async fn export_statement<S: Storage>(&self, storage: &S) -> Result<String> {
        let csv_output = self.to_csv()?;
        let json_output = serde_json::to_string_pretty(&self.transactions)?;

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            zip.start_file::<_, ()>("statement.csv", FileOptions::default())?;
            zip.write_all(csv_output.as_bytes())?;

            zip.start_file::<_, ()>("statement.json", FileOptions::default())?;
            zip.write_all(json_output.as_bytes())?;

            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing statement ({} bytes) to storage", zip_data.len());
        storage.write_file(STATEMENT_FILE, &zip_data).await?;
        tracing::info!(
            "📁 Statement exported: {} transactions, period total {}",
            self.transactions.len(),
            format_money(self.period_total)
        );
        Ok(STATEMENT_FILE.to_string())
    }
}

/// 每週三撥款；當天是週三時順延到下週
pub fn next_payout_date(today: NaiveDate) -> NaiveDate {
    let from_monday = today.weekday().num_days_from_monday() as i64;
    let wednesday = Weekday::Wed.num_days_from_monday() as i64;
    let mut days = (wednesday - from_monday).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    today + Duration::days(days)
}

fn json_label<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_value(value)?
        .as_str()
        .unwrap_or_default()
        .to_string())
}
