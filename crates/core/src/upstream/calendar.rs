use crate::domain::company::EarningsCalendarItem;
use crate::error::EarningsError;

pub const DEFAULT_HORIZON: &str = "3month";
const HORIZONS: [&str; 3] = ["3month", "6month", "12month"];
const DEFAULT_CURRENCY: &str = "USD";

pub fn validate_horizon(horizon: &str) -> Result<&'static str, EarningsError> {
    let h = horizon.trim().to_ascii_lowercase();
    HORIZONS
        .iter()
        .copied()
        .find(|known| *known == h)
        .ok_or_else(|| {
            EarningsError::invalid_input(format!(
                "horizon must be one of 3month, 6month, 12month (got {horizon:?})"
            ))
        })
}

pub fn parse_calendar_csv(text: &str) -> Vec<EarningsCalendarItem> {
    let mut lines = text.trim().lines();
    if lines.next().is_none() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
        if fields.len() < 4 {
            continue;
        }

        let estimate = fields
            .get(4)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let currency = fields
            .get(5)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string();

        out.push(EarningsCalendarItem {
            symbol: fields[0].trim().to_string(),
            name: fields[1].trim().to_string(),
            report_date: fields[2].trim().to_string(),
            fiscal_date_ending: fields[3].trim().to_string(),
            estimate,
            currency,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const HEADER: &str = "symbol,name,reportDate,fiscalDateEnding,estimate,currency";

    #[test]
    fn parses_full_row() {
        let csv = format!("{HEADER}\nAAPL,Apple Inc,2025-01-30,2024-12-31,2.35,USD\n");
        let items = parse_calendar_csv(&csv);
        assert_eq!(
            items,
            vec![EarningsCalendarItem {
                symbol: "AAPL".into(),
                name: "Apple Inc".into(),
                report_date: "2025-01-30".into(),
                fiscal_date_ending: "2024-12-31".into(),
                estimate: Some("2.35".into()),
                currency: "USD".into(),
            }]
        );
    }

    #[test]
    fn skips_short_rows_and_defaults_trailing_fields() {
        let csv = format!(
            "{HEADER}\r\nAAPL,Apple Inc,2025-01-30\r\nSAP,SAP SE,2025-01-28,2024-12-31\r\nRY,Royal Bank,2025-02-26,2025-01-31,,CAD\r\n"
        );
        let items = parse_calendar_csv(&csv);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].symbol, "SAP");
        assert_eq!(items[0].estimate, None);
        assert_eq!(items[0].currency, "USD");

        assert_eq!(items[1].symbol, "RY");
        assert_eq!(items[1].estimate, None);
        assert_eq!(items[1].currency, "CAD");
    }

    #[test]
    fn header_only_or_empty_yields_nothing() {
        assert!(parse_calendar_csv(HEADER).is_empty());
        assert!(parse_calendar_csv("").is_empty());
    }

    #[test]
    fn horizon_is_validated() {
        assert_eq!(validate_horizon("6MONTH").unwrap(), "6month");
        assert_eq!(
            validate_horizon("1week").unwrap_err().kind,
            ErrorKind::InvalidInput
        );
    }
}
