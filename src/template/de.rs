use std::fmt;

use serde::de::{self, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;

/// Failure turning the captures of a template match into a caller type.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CaptureDeserializationError {
    #[error("{0}")]
    Message(String),
    #[error("capture {0:?} has no value")]
    MissingCapture(String),
    #[error("capture {0:?} does not parse as {1}: {2}")]
    UnparseableCapture(String, &'static str, String),
}

impl de::Error for CaptureDeserializationError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CaptureDeserializationError::Message(msg.to_string())
    }
}

/// Deserializes the `(name, value)` captures of a template match. A
/// struct takes fields by capture name, a tuple takes values in
/// declaration order, and scalar fields parse from their string form.
#[derive(Debug)]
pub struct CapturesDeserializer<'de> {
    captures: &'de [(String, Option<String>)],
}

impl<'de> CapturesDeserializer<'de> {
    pub fn new(captures: &'de [(String, Option<String>)]) -> Self {
        CapturesDeserializer { captures }
    }
}

impl<'de> de::Deserializer<'de> for CapturesDeserializer<'de> {
    type Error = CaptureDeserializationError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(CapturesMap {
            iter: self.captures.iter(),
            value: None,
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(CapturesSeq {
            iter: self.captures.iter(),
        })
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct enum identifier
        ignored_any
    }
}

struct CapturesMap<'de> {
    iter: std::slice::Iter<'de, (String, Option<String>)>,
    value: Option<ValueDeserializer<'de>>,
}

impl<'de> MapAccess<'de> for CapturesMap<'de> {
    type Error = CaptureDeserializationError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        // captures without a value are left out, so an Option field of
        // the target falls back to None
        for (name, value) in self.iter.by_ref() {
            if let Some(value) = value {
                self.value = Some(ValueDeserializer {
                    name: name.as_str(),
                    value: Some(value.as_str()),
                });
                return seed
                    .deserialize(de::value::StrDeserializer::<CaptureDeserializationError>::new(
                        name.as_str(),
                    ))
                    .map(Some);
            }
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        match self.value.take() {
            Some(value) => seed.deserialize(value),
            None => Err(de::Error::custom("a value was requested before its key")),
        }
    }
}

struct CapturesSeq<'de> {
    iter: std::slice::Iter<'de, (String, Option<String>)>,
}

impl<'de> SeqAccess<'de> for CapturesSeq<'de> {
    type Error = CaptureDeserializationError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((name, value)) => seed
                .deserialize(ValueDeserializer {
                    name: name.as_str(),
                    value: value.as_deref(),
                })
                .map(Some),
            None => Ok(None),
        }
    }
}

struct ValueDeserializer<'de> {
    name: &'de str,
    value: Option<&'de str>,
}

impl<'de> ValueDeserializer<'de> {
    fn require(&self) -> Result<&'de str, CaptureDeserializationError> {
        self.value
            .ok_or_else(|| CaptureDeserializationError::MissingCapture(self.name.to_string()))
    }
}

macro_rules! parse_capture {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            let raw = self.require()?;
            let parsed = raw.parse::<$ty>().map_err(|e| {
                CaptureDeserializationError::UnparseableCapture(
                    self.name.to_string(),
                    stringify!($ty),
                    e.to_string(),
                )
            })?;
            visitor.$visit(parsed)
        }
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = CaptureDeserializationError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(self.require()?)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Some(_) => visitor.visit_some(self),
            None => visitor.visit_none(),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(self.require()?.into_deserializer())
    }

    parse_capture!(deserialize_bool, visit_bool, bool);
    parse_capture!(deserialize_i8, visit_i8, i8);
    parse_capture!(deserialize_i16, visit_i16, i16);
    parse_capture!(deserialize_i32, visit_i32, i32);
    parse_capture!(deserialize_i64, visit_i64, i64);
    parse_capture!(deserialize_i128, visit_i128, i128);
    parse_capture!(deserialize_u8, visit_u8, u8);
    parse_capture!(deserialize_u16, visit_u16, u16);
    parse_capture!(deserialize_u32, visit_u32, u32);
    parse_capture!(deserialize_u64, visit_u64, u64);
    parse_capture!(deserialize_u128, visit_u128, u128);
    parse_capture!(deserialize_f32, visit_f32, f32);
    parse_capture!(deserialize_f64, visit_f64, f64);
    parse_capture!(deserialize_char, visit_char, char);

    forward_to_deserialize_any! {
        str string bytes byte_buf unit unit_struct seq tuple tuple_struct map
        struct identifier ignored_any
    }
}

#[cfg(test)]
mod test {
    use serde::Deserialize;

    use super::*;

    fn caps(pairs: &[(&str, Option<&str>)]) -> Vec<(String, Option<String>)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn tuples_take_values_in_order() {
        let captures = caps(&[("user", Some("ada")), ("file", Some("17"))]);
        let got: (String, u16) =
            Deserialize::deserialize(CapturesDeserializer::new(&captures)).unwrap();
        assert_eq!(got, ("ada".to_string(), 17));
    }

    #[test]
    fn structs_take_fields_by_name() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Coords {
            x: i32,
            y: i32,
        }

        let captures = caps(&[("y", Some("2")), ("x", Some("1"))]);
        let got: Coords = Deserialize::deserialize(CapturesDeserializer::new(&captures)).unwrap();
        assert_eq!(got, Coords { x: 1, y: 2 });
    }

    #[test]
    fn absent_captures_become_none() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Search {
            q: String,
            lang: Option<String>,
        }

        let captures = caps(&[("q", Some("rust")), ("lang", None)]);
        let got: Search = Deserialize::deserialize(CapturesDeserializer::new(&captures)).unwrap();
        assert_eq!(
            got,
            Search {
                q: "rust".to_string(),
                lang: None,
            }
        );
    }

    #[test]
    fn unparseable_scalars_report_the_capture() {
        let captures = caps(&[("n", Some("many"))]);
        let got: Result<(u8,), _> = Deserialize::deserialize(CapturesDeserializer::new(&captures));
        assert!(matches!(
            got,
            Err(CaptureDeserializationError::UnparseableCapture(name, "u8", _)) if name == "n"
        ));
    }

    #[test]
    fn missing_scalar_in_a_tuple_is_an_error() {
        let captures = caps(&[("q", None)]);
        let got: Result<(String,), _> =
            Deserialize::deserialize(CapturesDeserializer::new(&captures));
        assert!(matches!(
            got,
            Err(CaptureDeserializationError::MissingCapture(name)) if name == "q"
        ));
    }

    #[test]
    fn optional_tuple_slots_are_allowed() {
        let captures = caps(&[("q", Some("rust")), ("lang", None)]);
        let got: (String, Option<String>) =
            Deserialize::deserialize(CapturesDeserializer::new(&captures)).unwrap();
        assert_eq!(got, ("rust".to_string(), None));
    }
}
