use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::debug;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::price::parse_price;
use crate::error::MonitorError;

/// 12-hour clock without a meridiem, as existing ledgers are written.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M:%S";
pub const IN_PROGRESS_FLAG: &str = "IT";
const DELIMITER: char = '|';

/// One observation in the ledger: `<timestamp>|<price>[|IT]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Kept as written so older ledgers round-trip untouched.
    pub timestamp: String,
    /// Display string exactly as it was sampled.
    pub price: String,
    pub in_progress: bool,
}

impl HistoryEntry {
    pub fn new(now: NaiveDateTime, price: impl Into<String>, in_progress: bool) -> Self {
        Self {
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            price: price.into(),
            in_progress,
        }
    }

    pub fn parse_line(line: &str) -> Result<Self, MonitorError> {
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        if fields.len() != 2 && fields.len() != 3 {
            return Err(MonitorError::NotFound(format!(
                "expected 2 or 3 fields, got {} in '{}'",
                fields.len(),
                line
            )));
        }

        let price = fields[1];
        parse_price(price)?;

        Ok(Self {
            timestamp: fields[0].to_string(),
            price: price.to_string(),
            in_progress: fields.get(2).map_or(false, |flag| *flag == IN_PROGRESS_FLAG),
        })
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.timestamp, DELIMITER, self.price)?;
        if self.in_progress {
            write!(f, "{}{}", DELIMITER, IN_PROGRESS_FLAG)?;
        }
        Ok(())
    }
}

/// Append-only history file. Existing lines are never rewritten.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the final non-empty line, the sole input to the next decision.
    pub async fn read_last(&self) -> Result<HistoryEntry, MonitorError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let last = contents
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .last()
            .ok_or_else(|| {
                MonitorError::NotFound(format!("ledger {} is empty", self.path.display()))
            })?;

        let entry = HistoryEntry::parse_line(last)?;
        debug!("Last ledger entry: {}", entry);
        Ok(entry)
    }

    /// Writes `\n<entry>` at the end of the file. The file must already exist.
    pub async fn append(&self, entry: &HistoryEntry) -> Result<(), MonitorError> {
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(format!("\n{}", entry).as_bytes()).await?;
        file.flush().await?;

        debug!("Appended to {}: {}", self.path.display(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn temp_ledger(contents: &str) -> Ledger {
        let path = std::env::temp_dir().join(format!("pricewatch-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        Ledger::new(path)
    }

    fn afternoon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_parse_line_without_flag() {
        let entry = HistoryEntry::parse_line("2024-01-01 10:00:00|$10,000").unwrap();
        assert_eq!(entry.timestamp, "2024-01-01 10:00:00");
        assert_eq!(entry.price, "$10,000");
        assert!(!entry.in_progress);
    }

    #[test]
    fn test_parse_line_with_flag() {
        let entry = HistoryEntry::parse_line("2024-01-01 10:00:00|$10,050|IT").unwrap();
        assert!(entry.in_progress);

        let other = HistoryEntry::parse_line("2024-01-01 10:00:00|$10,050|XX").unwrap();
        assert!(!other.in_progress);
    }

    #[test]
    fn test_parse_line_rejects_bad_field_count() {
        assert!(matches!(
            HistoryEntry::parse_line("just a header"),
            Err(MonitorError::NotFound(_))
        ));
        assert!(matches!(
            HistoryEntry::parse_line("a|$1|IT|extra"),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_line_rejects_bad_price() {
        assert!(matches!(
            HistoryEntry::parse_line("2024-01-01 10:00:00|n/a"),
            Err(MonitorError::Parse(_))
        ));
    }

    #[test]
    fn test_timestamp_uses_twelve_hour_clock() {
        let morning = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(1, 5, 9)
            .unwrap();
        assert_eq!(
            HistoryEntry::new(afternoon(), "$1", false).timestamp,
            HistoryEntry::new(morning, "$1", false).timestamp
        );
        assert_eq!(HistoryEntry::new(afternoon(), "$1", false).timestamp, "2024-01-01 01:05:09");
    }

    #[test]
    fn test_display_matches_ledger_format() {
        assert_eq!(
            HistoryEntry::new(afternoon(), "$10,050", true).to_string(),
            "2024-01-01 01:05:09|$10,050|IT"
        );
        assert_eq!(
            HistoryEntry::new(afternoon(), "$10,050", false).to_string(),
            "2024-01-01 01:05:09|$10,050"
        );
    }

    #[tokio::test]
    async fn test_read_last_skips_trailing_blank_lines() {
        let ledger = temp_ledger("2024-01-01 09:00:00|$9,990\r\n2024-01-01 10:00:00|$10,000\n\n");
        let entry = ledger.read_last().await.unwrap();
        assert_eq!(entry.price, "$10,000");
        std::fs::remove_file(ledger.path()).ok();
    }

    #[tokio::test]
    async fn test_read_last_empty_ledger() {
        let ledger = temp_ledger("\n  \n");
        assert!(matches!(ledger.read_last().await, Err(MonitorError::NotFound(_))));
        std::fs::remove_file(ledger.path()).ok();
    }

    #[tokio::test]
    async fn test_read_last_missing_file() {
        let ledger = Ledger::new(std::env::temp_dir().join("pricewatch-does-not-exist.txt"));
        assert!(matches!(ledger.read_last().await, Err(MonitorError::Io(_))));
    }

    #[tokio::test]
    async fn test_append_then_read_last() {
        let ledger = temp_ledger("2024-01-01 10:00:00|$10,000");
        let entry = HistoryEntry::new(afternoon(), "$10,050", true);
        ledger.append(&entry).await.unwrap();

        let last = ledger.read_last().await.unwrap();
        assert_eq!(last.price, entry.price);
        assert_eq!(last.in_progress, entry.in_progress);

        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw, "2024-01-01 10:00:00|$10,000\n2024-01-01 01:05:09|$10,050|IT");
        std::fs::remove_file(ledger.path()).ok();
    }

    #[tokio::test]
    async fn test_append_does_not_create_missing_ledger() {
        let path = std::env::temp_dir().join(format!("pricewatch-{}.txt", uuid::Uuid::new_v4()));
        let ledger = Ledger::new(&path);
        let result = ledger.append(&HistoryEntry::new(afternoon(), "$1", false)).await;
        assert!(matches!(result, Err(MonitorError::Io(_))));
        assert!(!path.exists());
    }
}
