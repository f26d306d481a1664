use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::index::{IndexKey, SearchMode, TermIndex};
use crate::occurrences::DocIdSet;

/// A bijection between the key type an index presents and the key type it
/// stores, defined on the canonical subset of the outer type. `encode`
/// answers `None` outside that subset; a proxied operation treats such a
/// key as matching nothing.
pub trait KeyCodec {
    type Outer: IndexKey;
    type Inner: IndexKey;

    const NAME: &'static str;

    fn encode(outer: &Self::Outer) -> Option<Self::Inner>;
    fn decode(inner: &Self::Inner) -> Self::Outer;
}

/// Key-conversion proxy: presents `C::Outer` while delegating every
/// operation to an inner index keyed by `C::Inner`. Composable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "I: Serialize", deserialize = "I: Deserialize<'de>"))]
pub struct KeyedIndex<C, I> {
    inner: I,
    #[serde(skip)]
    codec: PhantomData<C>,
}

impl<C, I: Default> Default for KeyedIndex<C, I> {
    fn default() -> Self {
        KeyedIndex { inner: I::default(), codec: PhantomData }
    }
}

impl<C, I> KeyedIndex<C, I> {
    pub fn new(inner: I) -> Self {
        KeyedIndex { inner, codec: PhantomData }
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<C, I> TermIndex for KeyedIndex<C, I>
where
    C: KeyCodec,
    I: TermIndex<Key = C::Inner>,
{
    type Key = C::Outer;
    type Value = I::Value;

    fn insert_list(&mut self, entries: Vec<(Self::Key, Self::Value)>) {
        let entries = entries
            .into_iter()
            .filter_map(|(key, value)| C::encode(&key).map(|key| (key, value)))
            .collect();
        self.inner.insert_list(entries);
    }

    fn delete_docs(&mut self, docs: &DocIdSet) {
        self.inner.delete_docs(docs);
    }

    fn search(&self, mode: SearchMode, key: &Self::Key) -> Vec<(Self::Key, Self::Value)> {
        match C::encode(key) {
            Some(inner_key) => self
                .inner
                .search(mode, &inner_key)
                .into_iter()
                .map(|(key, value)| (C::decode(&key), value))
                .collect(),
            None => Vec::new(),
        }
    }

    fn lookup_range(&self, lo: &Self::Key, hi: &Self::Key) -> Vec<(Self::Key, Self::Value)> {
        match (C::encode(lo), C::encode(hi)) {
            (Some(lo), Some(hi)) => self
                .inner
                .lookup_range(&lo, &hi)
                .into_iter()
                .map(|(key, value)| (C::decode(&key), value))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn keys(&self) -> Vec<Self::Key> {
        self.inner.keys().iter().map(C::decode).collect()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn to_list(&self) -> Vec<(Self::Key, Self::Value)> {
        self.inner
            .to_list()
            .into_iter()
            .map(|(key, value)| (C::decode(&key), value))
            .collect()
    }
}

/// Unicode text over a byte-keyed inner index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec;

impl KeyCodec for TextCodec {
    type Outer = String;
    type Inner = Vec<u8>;

    const NAME: &'static str = "text";

    fn encode(outer: &String) -> Option<Vec<u8>> {
        Some(outer.as_bytes().to_vec())
    }

    fn decode(inner: &Vec<u8>) -> String {
        String::from_utf8_lossy(inner).into_owned()
    }
}

/// Canonical decimal text over native `i64` keys, so that key order is
/// numeric order and ranges behave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntCodec;

impl KeyCodec for IntCodec {
    type Outer = String;
    type Inner = i64;

    const NAME: &'static str = "int";

    fn encode(outer: &String) -> Option<i64> {
        outer.parse().ok()
    }

    fn decode(inner: &i64) -> String {
        inner.to_string()
    }
}

/// Zero-padded `YYYY[-MM[-DD]]` text over byte keys. Lexicographic order
/// on the canonical form is chronological order, and a year or year-month
/// key works as a prefix. Calendar validation is the analyzer's job; the
/// codec only rejects keys that are not date-shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateCodec;

impl KeyCodec for DateCodec {
    type Outer = String;
    type Inner = Vec<u8>;

    const NAME: &'static str = "date";

    fn encode(outer: &String) -> Option<Vec<u8>> {
        let date_shaped = !outer.is_empty()
            && outer.chars().all(|c| c.is_ascii_digit() || c == '-');
        date_shaped.then(|| outer.as_bytes().to_vec())
    }

    fn decode(inner: &Vec<u8>) -> String {
        String::from_utf8_lossy(inner).into_owned()
    }
}

const GEO_BITS: u32 = 20;

fn quantize(value: f64, min: f64, max: f64) -> u32 {
    let steps = ((1u32 << GEO_BITS) - 1) as f64;
    (((value - min) / (max - min)) * steps).round() as u32
}

fn dequantize(cell: u32, min: f64, max: f64) -> f64 {
    let steps = ((1u32 << GEO_BITS) - 1) as f64;
    min + (cell as f64 / steps) * (max - min)
}

pub(crate) fn parse_geo(text: &str) -> Option<(f64, f64)> {
    let (lat, lon) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    let in_range = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
    in_range.then_some((lat, lon))
}

/// `lat,lon` text over a bit-interleaved key, one byte per bit. Keys that
/// are spatially close share long prefixes, so prefix and range lookups
/// select grid cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCodec;

impl KeyCodec for PositionCodec {
    type Outer = String;
    type Inner = Vec<u8>;

    const NAME: &'static str = "position";

    fn encode(outer: &String) -> Option<Vec<u8>> {
        let (lat, lon) = parse_geo(outer)?;
        let lat = quantize(lat, -90.0, 90.0);
        let lon = quantize(lon, -180.0, 180.0);
        let mut bits = Vec::with_capacity(2 * GEO_BITS as usize);
        for shift in (0..GEO_BITS).rev() {
            bits.push(if lat >> shift & 1 == 1 { b'1' } else { b'0' });
            bits.push(if lon >> shift & 1 == 1 { b'1' } else { b'0' });
        }
        Some(bits)
    }

    fn decode(inner: &Vec<u8>) -> String {
        let mut lat = 0u32;
        let mut lon = 0u32;
        for pair in inner.chunks(2) {
            lat = lat << 1 | u32::from(pair[0] == b'1');
            if pair.len() > 1 {
                lon = lon << 1 | u32::from(pair[1] == b'1');
            }
        }
        let lat = dequantize(lat, -90.0, 90.0);
        let lon = dequantize(lon, -180.0, 180.0);
        format!("{lat:.5},{lon:.5}")
    }
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::index::BTreeIndex;
    use crate::occurrences::Occurrences;

    type Inner = BTreeIndex<i64, Occurrences>;

    fn int_index(values: &[(i64, u32)]) -> KeyedIndex<IntCodec, Inner> {
        let mut index = KeyedIndex::<IntCodec, Inner>::default();
        let entries = values
            .iter()
            .map(|(value, doc)| (value.to_string(), Occurrences::singleton(*doc, 0)))
            .collect();
        index.insert_list(entries);
        index
    }

    #[test]
    fn observations_survive_the_coordinate_change() {
        let mut proxied = int_index(&[(3, 1), (-2, 2), (40, 3)]);
        let mut plain = Inner::default();
        plain.insert_list(vec![
            (3, Occurrences::singleton(1, 0)),
            (-2, Occurrences::singleton(2, 0)),
            (40, Occurrences::singleton(3, 0)),
        ]);

        let through: Vec<(i64, Occurrences)> = proxied
            .lookup_range(&S("-5"), &S("10"))
            .into_iter()
            .map(|(key, value)| (key.parse().unwrap(), value))
            .collect();
        assert_eq!(through, plain.lookup_range(&-5, &10));

        let mut docs = DocIdSet::new();
        docs.insert(2);
        proxied.delete_docs(&docs);
        plain.delete_docs(&docs);
        assert_eq!(proxied.len(), plain.len());
        assert_eq!(proxied.keys(), vec![S("3"), S("40")]);
    }

    #[test]
    fn ranges_are_numeric_not_lexicographic() {
        let index = int_index(&[(2, 1), (10, 2), (30, 3)]);
        let found: Vec<String> =
            index.lookup_range(&S("2"), &S("10")).into_iter().map(|(key, _)| key).collect();
        assert_eq!(found, vec![S("2"), S("10")]);
    }

    #[test]
    fn non_canonical_keys_match_nothing() {
        let mut index = int_index(&[(2, 1)]);
        assert!(index.search(SearchMode::Case, &S("two")).is_empty());
        index.insert_list(vec![(S("two"), Occurrences::singleton(9, 0))]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn date_codec_accepts_prefixes() {
        assert!(DateCodec::encode(&S("2014-01-15")).is_some());
        assert!(DateCodec::encode(&S("2014")).is_some());
        assert!(DateCodec::encode(&S("yesterday")).is_none());
    }

    #[test]
    fn position_codec_round_trips_the_grid() {
        let key = PositionCodec::encode(&S("53.55000,10.00000")).unwrap();
        let rendered = PositionCodec::decode(&key);
        assert_eq!(PositionCodec::encode(&rendered).unwrap(), key);
    }

    #[test]
    fn position_codec_rejects_out_of_range_values() {
        assert!(PositionCodec::encode(&S("91.0,0.0")).is_none());
        assert!(PositionCodec::encode(&S("0.0,181.0")).is_none());
        assert!(PositionCodec::encode(&S("somewhere")).is_none());
    }
}
