//! Deal filtering.
//!
//! Decides which price quotes count as deals for an alert. The pricing
//! source already applies rating/amenity/cancellation criteria server-side;
//! the price threshold is enforced here, and the rating floor is re-checked
//! against quotes that carry one.

use rust_decimal::Decimal;

use crate::types::{Alert, Deal, PriceQuote};

/// Keep the quotes that satisfy the alert's thresholds.
///
/// Order-preserving: the pricing source sorts by price, so callers may rely
/// on "best deal first". Empty input yields empty output.
pub fn filter_deals(alert: &Alert, quotes: &[PriceQuote]) -> Vec<Deal> {
    quotes
        .iter()
        .filter(|q| accepts(alert, q))
        .map(|q| Deal {
            alert_id: alert.id,
            quote: q.clone(),
        })
        .collect()
}

fn accepts(alert: &Alert, quote: &PriceQuote) -> bool {
    if quote.price_per_night > alert.max_price {
        return false;
    }

    // Rating floor, re-applied for quotes that report one.
    if alert.min_rating > Decimal::ZERO {
        if let Some(rating) = quote.rating {
            if rating < alert.min_rating {
                return false;
            }
        }
    }

    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(name: &str, price: Decimal, rating: Option<Decimal>) -> PriceQuote {
        PriceQuote {
            platform: "booking".to_string(),
            hotel_name: name.to_string(),
            price_per_night: price,
            currency: "USD".to_string(),
            total_price: None,
            rating,
            booking_url: None,
        }
    }

    #[test]
    fn test_accepts_at_or_under_threshold() {
        let alert = Alert::sample(); // max_price 200
        let quotes = vec![
            quote("under", dec!(180), None),
            quote("over", dec!(250), None),
            quote("exact", dec!(200), None),
        ];

        let deals = filter_deals(&alert, &quotes);
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].quote.hotel_name, "under");
        assert_eq!(deals[1].quote.hotel_name, "exact");
    }

    #[test]
    fn test_preserves_input_order() {
        let alert = Alert::sample();
        let quotes = vec![
            quote("cheapest", dec!(150), None),
            quote("middle", dec!(180), None),
            quote("priciest-in", dec!(199), None),
        ];

        let deals = filter_deals(&alert, &quotes);
        let names: Vec<_> = deals.iter().map(|d| d.quote.hotel_name.as_str()).collect();
        assert_eq!(names, vec!["cheapest", "middle", "priciest-in"]);
    }

    #[test]
    fn test_never_exceeds_input_len() {
        let alert = Alert::sample();
        let quotes = vec![
            quote("a", dec!(100), None),
            quote("b", dec!(300), None),
        ];
        assert!(filter_deals(&alert, &quotes).len() <= quotes.len());
    }

    #[test]
    fn test_rating_floor_rejects_low_rated() {
        let mut alert = Alert::sample();
        alert.min_rating = dec!(4);
        let quotes = vec![
            quote("good", dec!(150), Some(dec!(4.5))),
            quote("poor", dec!(140), Some(dec!(3.1))),
        ];

        let deals = filter_deals(&alert, &quotes);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].quote.hotel_name, "good");
    }

    #[test]
    fn test_rating_floor_keeps_unrated() {
        // A quote with no rating is not rejected by the floor — the pricing
        // source applied the criterion server-side where it could.
        let mut alert = Alert::sample();
        alert.min_rating = dec!(4);
        let quotes = vec![quote("unrated", dec!(150), None)];
        assert_eq!(filter_deals(&alert, &quotes).len(), 1);
    }

    #[test]
    fn test_zero_min_rating_disables_floor() {
        let alert = Alert::sample(); // min_rating 0
        let quotes = vec![quote("one-star", dec!(90), Some(dec!(1)))];
        assert_eq!(filter_deals(&alert, &quotes).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let alert = Alert::sample();
        assert!(filter_deals(&alert, &[]).is_empty());
    }

    #[test]
    fn test_deal_carries_alert_back_reference() {
        let alert = Alert::sample();
        let quotes = vec![quote("a", dec!(100), None)];
        let deals = filter_deals(&alert, &quotes);
        assert_eq!(deals[0].alert_id, alert.id);
    }
}
