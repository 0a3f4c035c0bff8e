//! The subset of the Directions API response that carries a trip's distance.
//!
//! Only `routes[0].legs[0].distance.value` matters. Everything else in the
//! payload is ignored, and missing or `null` arrays are treated as empty so
//! that a sparse response yields a domain error rather than a decode error.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer};

const STATUS_OK: &str = "OK";
const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectionsResponse {
    /// Top-level status code. Absent in hand-written fixtures, which is
    /// treated as `OK`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Route {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Leg {
    pub distance: Distance,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Distance {
    /// Meters.
    pub value: u64,
    /// Human readable form, e.g. `"3.4 km"`.
    #[serde(default)]
    pub text: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> core::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl DirectionsResponse {
    /// Distance in meters of the first leg of the first route.
    ///
    /// # Errors
    ///
    /// - [`Error::Upstream`] if the API reported a status other than `OK` or
    ///   `ZERO_RESULTS`.
    /// - [`Error::NoRoute`] if there are no routes.
    /// - [`Error::NoLegs`] if the first route has no legs.
    pub fn distance(&self) -> Result<u64> {
        if let Some(status) = self.status.as_deref() {
            if status != STATUS_OK && status != STATUS_ZERO_RESULTS {
                return Err(Error::Upstream {
                    status: status.to_string(),
                    message: self.error_message.clone().unwrap_or_default(),
                });
            }
        }

        let route = self.routes.first().ok_or(Error::NoRoute)?;
        let leg = route.legs.first().ok_or(Error::NoLegs)?;
        Ok(leg.distance.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> DirectionsResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn zero_routes_is_no_route() {
        let res = parse(json!({ "routes": [] }));
        assert!(matches!(res.distance(), Err(Error::NoRoute)));

        let res = parse(json!({ "status": "ZERO_RESULTS", "routes": [] }));
        assert!(matches!(res.distance(), Err(Error::NoRoute)));

        let res = parse(json!({ "status": "ZERO_RESULTS", "routes": null }));
        assert!(matches!(res.distance(), Err(Error::NoRoute)));

        let res = parse(json!({}));
        assert!(matches!(res.distance(), Err(Error::NoRoute)));
    }

    #[test]
    fn route_without_legs_is_no_legs() {
        let res = parse(json!({ "routes": [{ "legs": [] }] }));
        assert!(matches!(res.distance(), Err(Error::NoLegs)));

        let res = parse(json!({ "routes": [{}] }));
        assert!(matches!(res.distance(), Err(Error::NoLegs)));

        let res = parse(json!({ "routes": [{ "legs": null }] }));
        assert!(matches!(res.distance(), Err(Error::NoLegs)));
    }

    #[test]
    fn first_leg_of_first_route_wins() {
        let res = parse(json!({
            "status": "OK",
            "routes": [
                { "legs": [
                    { "distance": { "value": 1234, "text": "1.2 km" } },
                    { "distance": { "value": 99 } }
                ] },
                { "legs": [{ "distance": { "value": 5 } }] }
            ]
        }));
        assert_eq!(res.distance().unwrap(), 1234);
    }

    #[test]
    fn non_ok_status_is_an_upstream_error() {
        let res = parse(json!({
            "status": "OVER_QUERY_LIMIT",
            "error_message": "You have exceeded your rate-limit for this API.",
            "routes": []
        }));
        match res.distance() {
            Err(Error::Upstream { status, message }) => {
                assert_eq!(status, "OVER_QUERY_LIMIT");
                assert!(message.contains("rate-limit"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn leg_without_distance_fails_to_decode() {
        let res = serde_json::from_value::<DirectionsResponse>(json!({
            "routes": [{ "legs": [{}] }]
        }));
        assert!(res.is_err());
    }
}
