use std::fmt;
use std::result::Result as StdResult;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};

use errors::{Error, ErrorKind, Result};
use protocol::ApiVersion;

/// Broker version the client assumes when picking request versions and the
/// message format; there is no version negotiation on the wire.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KafkaVersion {
    KAFKA_0_8_0,
    KAFKA_0_8_1,
    KAFKA_0_8_2,
    KAFKA_0_9_0,
    KAFKA_0_10_0,
}

impl KafkaVersion {
    pub fn version(&self) -> &'static str {
        match *self {
            KafkaVersion::KAFKA_0_8_0 => "0.8.0",
            KafkaVersion::KAFKA_0_8_1 => "0.8.1",
            KafkaVersion::KAFKA_0_8_2 => "0.8.2",
            KafkaVersion::KAFKA_0_9_0 => "0.9.0",
            KafkaVersion::KAFKA_0_10_0 => "0.10.0",
        }
    }

    pub fn produce_api_version(&self) -> ApiVersion {
        match *self {
            KafkaVersion::KAFKA_0_8_0 |
            KafkaVersion::KAFKA_0_8_1 |
            KafkaVersion::KAFKA_0_8_2 => 0,
            KafkaVersion::KAFKA_0_9_0 => 1,
            KafkaVersion::KAFKA_0_10_0 => 2,
        }
    }

    pub fn fetch_api_version(&self) -> ApiVersion {
        match *self {
            KafkaVersion::KAFKA_0_8_0 |
            KafkaVersion::KAFKA_0_8_1 |
            KafkaVersion::KAFKA_0_8_2 => 0,
            KafkaVersion::KAFKA_0_9_0 => 1,
            KafkaVersion::KAFKA_0_10_0 => 2,
        }
    }

    /// Magic byte of the on-wire message format.
    pub fn message_version(&self) -> ApiVersion {
        match *self {
            KafkaVersion::KAFKA_0_10_0 => 1,
            _ => 0,
        }
    }
}

impl Default for KafkaVersion {
    fn default() -> Self {
        KafkaVersion::KAFKA_0_9_0
    }
}

impl FromStr for KafkaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0.8.0" => Ok(KafkaVersion::KAFKA_0_8_0),
            "0.8.1" => Ok(KafkaVersion::KAFKA_0_8_1),
            "0.8.2" => Ok(KafkaVersion::KAFKA_0_8_2),
            "0.9.0" => Ok(KafkaVersion::KAFKA_0_9_0),
            "0.10.0" => Ok(KafkaVersion::KAFKA_0_10_0),
            _ => bail!(ErrorKind::Msg(format!("unknown kafka version: {}", s))),
        }
    }
}

impl fmt::Display for KafkaVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.version())
    }
}

impl Serialize for KafkaVersion {
    fn serialize<S>(&self, serializer: S) -> StdResult<S::Ok, S::Error>
        where S: Serializer
    {
        serializer.serialize_str(self.version())
    }
}

impl<'de> Deserialize<'de> for KafkaVersion {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
        where D: Deserializer<'de>
    {
        struct KafkaVersionVistor;

        impl<'de> Visitor<'de> for KafkaVersionVistor {
            type Value = KafkaVersion;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("Valid values are: 0.10.0, 0.9.0, 0.8.2, 0.8.1, 0.8.0.")
            }

            fn visit_str<E>(self, v: &str) -> StdResult<Self::Value, E>
                where E: de::Error
            {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(KafkaVersionVistor)
    }
}
