use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::time::Duration;

/// Client-side limit for a single model call.
///
/// Written in the config either as whole seconds (`90`) or as a string with
/// an `s` or `m` suffix (`"90s"`, `"2m"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTimeout(Duration);

impl RequestTimeout {
    pub fn from_secs(secs: u64) -> Self {
        RequestTimeout(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for RequestTimeout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RequestTimeoutVisitor)
    }
}

struct RequestTimeoutVisitor;

impl<'de> de::Visitor<'de> for RequestTimeoutVisitor {
    type Value = RequestTimeout;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number of seconds or a string ending with 's' or 'm'")
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u64::try_from(v)
            .map(RequestTimeout::from_secs)
            .map_err(|_| E::custom("timeout cannot be negative"))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(RequestTimeout::from_secs(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let v = v.trim();
        let (number, multiplier) = if let Some(minutes) = v.strip_suffix(['m', 'M']) {
            (minutes, 60)
        } else if let Some(seconds) = v.strip_suffix(['s', 'S']) {
            (seconds, 1)
        } else {
            (v, 1)
        };
        number
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .map(RequestTimeout::from_secs)
            .ok_or_else(|| E::custom(format!("invalid timeout: {:?}", v)))
    }
}

impl Serialize for RequestTimeout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs = self.0.as_secs();
        if secs != 0 && secs % 60 == 0 {
            serializer.serialize_str(&format!("{}m", secs / 60))
        } else {
            serializer.serialize_str(&format!("{}s", secs))
        }
    }
}
