use crate::models::{CandidateListing, Watch};

/// Subject and body of an availability alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Alert for a watch whose property just showed up as bookable.
    ///
    /// The matched listing's price is fresher than the one stored at
    /// creation, so it wins when present.
    pub fn property_available(watch: &Watch, matched: Option<&CandidateListing>) -> Self {
        let price = matched
            .and_then(CandidateListing::known_price)
            .unwrap_or(watch.price.as_str());

        let body = format!(
            "Good news! The property you're watching is now available!

Property: {name}
Location: {location}
Dates: {check_in} to {check_out}
Guests: {guests}
Price: {price}

View property: {url}

Book now before it's gone!
",
            name = watch.property_name,
            location = watch.location,
            check_in = watch.check_in_date,
            check_out = watch.check_out_date,
            guests = watch.guests,
            url = watch.property_url,
        );

        Self {
            subject: format!("Property Available: {}", watch.property_name),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::watch::tests::sample_watch;

    #[test]
    fn embeds_watch_details() {
        let watch = sample_watch("w1", "u1");
        let message = AlertMessage::property_available(&watch, None);

        assert_eq!(message.subject, "Property Available: Loft with City Views");
        assert!(message.body.contains("Location: Austin, TX"));
        assert!(message.body.contains("Dates: 2024-06-15 to 2024-06-18"));
        assert!(message.body.contains("Guests: 2"));
        assert!(message.body.contains("Price: $180"));
        assert!(message.body.contains("View property: https://www.airbnb.com/rooms/222"));
    }

    #[test]
    fn prefers_matched_listing_price() {
        let watch = sample_watch("w1", "u1");
        let listing = CandidateListing {
            property_id: "222".to_string(),
            name: "Loft".to_string(),
            url: "https://www.airbnb.com/rooms/222?x=1".to_string(),
            location: "Austin, TX".to_string(),
            price: "$205".to_string(),
            guests: 2,
            image_url: None,
        };
        let message = AlertMessage::property_available(&watch, Some(&listing));
        assert!(message.body.contains("Price: $205"));
    }

    #[test]
    fn placeholder_listing_price_falls_back_to_watch_price() {
        let watch = sample_watch("w1", "u1");
        for placeholder in ["Price not available", "$0", "  "] {
            let listing = CandidateListing {
                property_id: "222".to_string(),
                name: "Loft".to_string(),
                url: "https://www.airbnb.com/rooms/222".to_string(),
                location: "Austin, TX".to_string(),
                price: placeholder.to_string(),
                guests: 2,
                image_url: None,
            };
            let message = AlertMessage::property_available(&watch, Some(&listing));
            assert!(message.body.contains("Price: $180"), "{placeholder:?}");
        }
    }
}
