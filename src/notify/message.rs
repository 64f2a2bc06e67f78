//! Deal summary rendering.

use std::fmt::Write;

use crate::types::{Alert, Deal};

/// Render the plain-text summary for a batch of deals.
///
/// `deals` is the capped list actually shown; `total_matches` the pre-cap
/// match count. When the cap truncated the list, a trailing "+N more" line
/// says so explicitly.
pub fn render_deal_summary(alert: &Alert, deals: &[Deal], total_matches: usize) -> String {
    let stay = alert.property_name.as_deref().unwrap_or(&alert.location);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Price alert: {} deal(s) for {} ({} → {}, {} guests) at or under ${}/night",
        total_matches,
        stay,
        alert.check_in,
        alert.check_out,
        alert.guests,
        alert.max_price,
    );

    for (i, deal) in deals.iter().enumerate() {
        let quote = &deal.quote;
        let _ = write!(
            out,
            "{}. {} — {} {}/night ({})",
            i + 1,
            quote.hotel_name,
            quote.price_per_night,
            quote.currency,
            quote.platform,
        );
        if let Some(rating) = quote.rating {
            let _ = write!(out, " ★{rating}");
        }
        if let Some(url) = &quote.booking_url {
            let _ = write!(out, " <{url}>");
        }
        out.push('\n');
    }

    let truncated = total_matches.saturating_sub(deals.len());
    if truncated > 0 {
        let _ = writeln!(out, "+{truncated} more under your threshold");
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceQuote;
    use rust_decimal_macros::dec;

    fn deal(alert: &Alert, name: &str, price: rust_decimal::Decimal) -> Deal {
        Deal {
            alert_id: alert.id,
            quote: PriceQuote {
                platform: "booking".to_string(),
                hotel_name: name.to_string(),
                price_per_night: price,
                currency: "USD".to_string(),
                total_price: None,
                rating: Some(dec!(4.3)),
                booking_url: Some("https://example.com/h1".to_string()),
            },
        }
    }

    #[test]
    fn test_summary_lists_deals_in_order() {
        let alert = Alert::sample();
        let deals = vec![
            deal(&alert, "Cheap Stay", dec!(120)),
            deal(&alert, "Mid Stay", dec!(160)),
        ];

        let text = render_deal_summary(&alert, &deals, 2);
        let cheap = text.find("1. Cheap Stay").unwrap();
        let mid = text.find("2. Mid Stay").unwrap();
        assert!(cheap < mid);
        assert!(text.contains("120 USD/night"));
        assert!(text.contains("★4.3"));
        assert!(text.contains("<https://example.com/h1>"));
    }

    #[test]
    fn test_summary_header_mentions_stay_and_threshold() {
        let alert = Alert::sample();
        let deals = vec![deal(&alert, "Cheap Stay", dec!(120))];
        let text = render_deal_summary(&alert, &deals, 1);
        assert!(text.contains("Paris"));
        assert!(text.contains("$200/night"));
        assert!(text.contains("2 guests"));
    }

    #[test]
    fn test_truncation_line_when_capped() {
        let alert = Alert::sample();
        let deals = vec![
            deal(&alert, "A", dec!(100)),
            deal(&alert, "B", dec!(110)),
        ];

        let text = render_deal_summary(&alert, &deals, 7);
        assert!(text.contains("+5 more"));
    }

    #[test]
    fn test_no_truncation_line_when_all_shown() {
        let alert = Alert::sample();
        let deals = vec![deal(&alert, "A", dec!(100))];
        let text = render_deal_summary(&alert, &deals, 1);
        assert!(!text.contains("more under"));
    }

    #[test]
    fn test_property_name_preferred_over_location() {
        let mut alert = Alert::sample();
        alert.property_name = Some("Memmo Alfama".to_string());
        let text = render_deal_summary(&alert, &[], 0);
        assert!(text.contains("Memmo Alfama"));
    }
}
