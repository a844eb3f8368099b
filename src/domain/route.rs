use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::codec::{self, CodecError};

/// Query parameter carrying encoded route data
pub const DATA_KEY: &str = "data";

/// Identity of a destination in the routing table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for RouteKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A typed destination.
///
/// Routes without payload are unit structs that opt out of carrying data:
///
/// ```
/// use navigator::domain::route::{Route, Target};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Products;
///
/// impl Route for Products {
///     const NAME: &'static str = "products";
///     const CARRIES_DATA: bool = false;
/// }
///
/// let target = Target::of(&Products).unwrap();
/// assert_eq!(target.uri(), "products");
/// assert!(target.args::<Products>().is_some());
/// ```
pub trait Route: Serialize + DeserializeOwned {
    const NAME: &'static str;
    const CARRIES_DATA: bool = true;

    fn route_key() -> RouteKey {
        RouteKey::from(Self::NAME)
    }

    /// Pattern registered with the routing table, e.g. `product_detail?data={data}`
    fn route_pattern() -> String {
        format!("{}?{DATA_KEY}={{{DATA_KEY}}}", Self::NAME)
    }
}

/// Where a navigation intent points: a route plus its encoded data, if any
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    route: RouteKey,
    data: Option<String>,
}

impl Target {
    /// A target with no data, addressed by name only
    pub fn named(name: impl Into<RouteKey>) -> Self {
        Self {
            route: name.into(),
            data: None,
        }
    }

    pub fn of<R: Route>(route: &R) -> Result<Self, CodecError> {
        let data = if R::CARRIES_DATA {
            Some(codec::encode_arg(route)?)
        } else {
            None
        };
        Ok(Self {
            route: R::route_key(),
            data,
        })
    }

    pub fn route(&self) -> &RouteKey {
        &self.route
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn uri(&self) -> String {
        match &self.data {
            Some(data) => format!("{}?{DATA_KEY}={data}", self.route),
            None => self.route.to_string(),
        }
    }

    /// Inverse of [`Target::uri`]
    pub fn parse_uri(uri: &str) -> Self {
        let prefix = format!("?{DATA_KEY}=");
        match uri.split_once(prefix.as_str()) {
            Some((route, data)) if !data.is_empty() => Self {
                route: RouteKey::from(route),
                data: Some(data.to_string()),
            },
            Some((route, _)) => Self::named(route),
            None => Self::named(uri),
        }
    }

    /// Decode the arguments this target carries as route `R`
    pub fn args<R: Route>(&self) -> Option<R> {
        if self.route != R::route_key() {
            log::error!(
                "Route mismatch: target \"{}\" decoded as \"{}\"",
                self.route,
                R::NAME
            );
            return None;
        }
        if !R::CARRIES_DATA {
            return serde_json::from_value(serde_json::Value::Null).ok();
        }
        match &self.data {
            Some(data) => codec::decode_arg(data),
            None => {
                log::error!(
                    "Expecting navigation route data for \"{}\" but got none",
                    R::route_pattern()
                );
                None
            }
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<RouteKey> for Target {
    fn from(route: RouteKey) -> Self {
        Self::named(route)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::*;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Products;

    impl Route for Products {
        const NAME: &'static str = "products";
        const CARRIES_DATA: bool = false;
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ProductDetail {
        id: u64,
        title: String,
    }

    impl Route for ProductDetail {
        const NAME: &'static str = "product_detail";
    }

    #[fixture]
    fn detail() -> ProductDetail {
        ProductDetail {
            id: 7,
            title: "iPhone 9".to_string(),
        }
    }

    #[test]
    fn test_route_pattern() {
        assert_eq!(ProductDetail::route_pattern(), "product_detail?data={data}");
    }

    #[test]
    fn test_dataless_route_has_plain_uri() -> Result<(), CodecError> {
        let target = Target::of(&Products)?;
        assert_eq!(target.uri(), "products");
        assert_eq!(target.data(), None);
        assert_eq!(target.args::<Products>(), Some(Products));
        Ok(())
    }

    #[rstest]
    fn test_data_route_round_trips_through_uri(detail: ProductDetail) -> Result<(), CodecError> {
        let target = Target::of(&detail)?;
        assert!(target.uri().starts_with("product_detail?data="));

        let parsed = Target::parse_uri(&target.uri());
        assert_eq!(parsed, target);
        assert_eq!(parsed.args::<ProductDetail>(), Some(detail));
        Ok(())
    }

    #[test]
    fn test_missing_data_is_absent() {
        let target = Target::named("product_detail");
        assert_eq!(target.args::<ProductDetail>(), None);
    }

    #[rstest]
    fn test_mismatched_route_is_absent(detail: ProductDetail) -> Result<(), CodecError> {
        let target = Target::of(&detail)?;
        assert_eq!(target.args::<Products>(), None);
        Ok(())
    }

    #[rstest]
    #[case("users", Target::named("users"))]
    #[case("users?data=", Target::named("users"))]
    fn test_parse_uri_without_data(#[case] uri: &str, #[case] expected: Target) {
        assert_eq!(Target::parse_uri(uri), expected);
    }
}
