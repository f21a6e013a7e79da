//! Mapping from bank-released consumer data to credential attributes.

use chrono::{DateTime, Months, TimeZone, Utc};
use std::collections::BTreeMap;

use super::transaction::{ConsumerAttributes, Purpose};

/// Credential expiry dates are rounded down to whole weeks since the epoch.
const EPOCH_BOUNDARY_SECS: i64 = 7 * 24 * 60 * 60;
const VALIDITY_MONTHS: u32 = 12;

const SAML_PREFIX: &str = "urn:nl:bvn:bankid:1.0:consumer.";

pub fn floor_to_epoch_boundary(at: DateTime<Utc>) -> DateTime<Utc> {
    let secs = at.timestamp();
    let floored = secs - secs.rem_euclid(EPOCH_BOUNDARY_SECS);
    Utc.timestamp_opt(floored, 0).single().unwrap_or(at)
}

/// Expiry of a credential issued at `now`: one year ahead, on an epoch
/// boundary.
pub fn credential_validity(now: DateTime<Utc>) -> DateTime<Utc> {
    let year_ahead = now
        .checked_add_months(Months::new(VALIDITY_MONTHS))
        .unwrap_or(now);
    floor_to_epoch_boundary(year_ahead)
}

/// Attributes of the credential issued for a finished transaction.
pub fn attributes_for(purpose: Purpose, consumer: &ConsumerAttributes) -> BTreeMap<String, String> {
    match purpose {
        Purpose::Identity => identity_attributes(consumer),
        Purpose::Authentication | Purpose::Donation => payment_attributes(consumer),
    }
}

fn payment_attributes(consumer: &ConsumerAttributes) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("fullname".to_string(), consumer.name.clone()),
        ("iban".to_string(), consumer.iban.clone()),
        ("bic".to_string(), consumer.bic.clone()),
    ])
}

fn identity_attributes(consumer: &ConsumerAttributes) -> BTreeMap<String, String> {
    let saml = |name: &str| -> String {
        consumer
            .identity
            .get(&format!("{}{}", SAML_PREFIX, name))
            .cloned()
            .unwrap_or_default()
    };

    BTreeMap::from([
        ("initials".to_string(), saml("initials")),
        ("familyname".to_string(), saml("legallastname")),
        ("prefix".to_string(), saml("legallastnameprefix")),
        ("dateofbirth".to_string(), map_date_of_birth(&saml("dateofbirth"))),
        ("gender".to_string(), map_gender(&saml("gender"))),
        (
            "address".to_string(),
            format!("{} {}", saml("street"), saml("houseno")),
        ),
        ("zipcode".to_string(), saml("postalcode")),
        ("city".to_string(), saml("city")),
        ("country".to_string(), saml("country")),
    ])
}

/// `YYYYMMDD` to `DD-MM-YYYY`. Anything else maps to an empty string.
pub fn map_date_of_birth(raw: &str) -> String {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return String::new();
    }
    format!("{}-{}-{}", &raw[6..8], &raw[4..6], &raw[..4])
}

/// ISO/IEC 5218 sex code to the credential's wording.
pub fn map_gender(iso_code: &str) -> String {
    match iso_code {
        "0" => "unknown",
        "1" => "male",
        "2" => "female",
        "9" => "not applicable",
        _ => "",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_payment_attributes() {
        let consumer = ConsumerAttributes {
            name: "J. de Vries".to_string(),
            iban: "NL44RABO0123456789".to_string(),
            bic: "RABONL2U".to_string(),
            ..Default::default()
        };
        let attrs = attributes_for(Purpose::Authentication, &consumer);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["fullname"], "J. de Vries");
        assert_eq!(attrs["iban"], "NL44RABO0123456789");
        assert_eq!(attrs["bic"], "RABONL2U");
    }

    #[test]
    fn test_identity_attributes() {
        let mut consumer = ConsumerAttributes::default();
        for (key, value) in [
            ("initials", "J.P."),
            ("legallastname", "Vries"),
            ("legallastnameprefix", "de"),
            ("dateofbirth", "19800131"),
            ("gender", "2"),
            ("street", "Kerkstraat"),
            ("houseno", "12a"),
            ("postalcode", "1234AB"),
            ("city", "Utrecht"),
            ("country", "NL"),
        ] {
            consumer
                .identity
                .insert(format!("{}{}", SAML_PREFIX, key), value.to_string());
        }

        let attrs = attributes_for(Purpose::Identity, &consumer);
        assert_eq!(attrs["initials"], "J.P.");
        assert_eq!(attrs["familyname"], "Vries");
        assert_eq!(attrs["prefix"], "de");
        assert_eq!(attrs["dateofbirth"], "31-01-1980");
        assert_eq!(attrs["gender"], "female");
        assert_eq!(attrs["address"], "Kerkstraat 12a");
        assert_eq!(attrs["zipcode"], "1234AB");
        assert_eq!(attrs["city"], "Utrecht");
        assert_eq!(attrs["country"], "NL");
    }

    #[test]
    fn test_malformed_date_of_birth() {
        assert_eq!(map_date_of_birth(""), "");
        assert_eq!(map_date_of_birth("1980-01"), "");
        assert_eq!(map_date_of_birth("1980013x"), "");
    }

    #[test]
    fn test_gender_codes() {
        assert_eq!(map_gender("0"), "unknown");
        assert_eq!(map_gender("1"), "male");
        assert_eq!(map_gender("9"), "not applicable");
        assert_eq!(map_gender("3"), "");
    }

    #[test]
    fn test_validity_is_floored_to_epoch_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 15, 30, 0).unwrap();
        let validity = credential_validity(now);

        assert_eq!(validity.timestamp() % EPOCH_BOUNDARY_SECS, 0);
        assert!(validity <= now + Duration::days(366));
        assert!(validity > now + Duration::days(358));
    }
}
