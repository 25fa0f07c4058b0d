/// Render a minor-unit amount for humans: `15000` + `GBP` -> `£150.00`.
///
/// All money in the platform is carried as integer minor units (pence) and
/// only formatted at the edges (email snapshots, admin views, logs).
pub fn format_minor(amount_minor: i64, currency: &str) -> String {
    let symbol = match currency.to_ascii_uppercase().as_str() {
        "GBP" => "£".to_string(),
        "EUR" => "€".to_string(),
        "USD" => "$".to_string(),
        other => format!("{} ", other),
    };

    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{}{}{}.{:02}", sign, symbol, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_currencies() {
        assert_eq!(format_minor(15000, "GBP"), "£150.00");
        assert_eq!(format_minor(99, "gbp"), "£0.99");
        assert_eq!(format_minor(120050, "EUR"), "€1200.50");
        assert_eq!(format_minor(500, "USD"), "$5.00");
    }

    #[test]
    fn formats_unknown_currency_with_code() {
        assert_eq!(format_minor(2500, "NOK"), "NOK 25.00");
    }

    #[test]
    fn formats_negative_amounts() {
        assert_eq!(format_minor(-7500, "GBP"), "-£75.00");
    }
}
