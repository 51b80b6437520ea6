//! Application enums stored as SQL enum types.
//!
//! Each enum type is described by a static [`EnumType`] table listing its
//! stored representations in declaration order. Conversions in both
//! directions go through a lookup built once per type; Rust enums tie their
//! variants to the table with the [`SqlEnum`] trait.

use crate::domain::error::GtaError;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Static description of a stored enum type.
pub struct EnumType {
    pub name: &'static str,
    pub members: &'static [&'static str],
    lookup: OnceLock<HashMap<&'static str, usize>>,
}

impl EnumType {
    pub const fn new(name: &'static str, members: &'static [&'static str]) -> Self {
        Self {
            name,
            members,
            lookup: OnceLock::new(),
        }
    }

    fn by_stored(&self) -> &HashMap<&'static str, usize> {
        self.lookup.get_or_init(|| {
            self.members
                .iter()
                .enumerate()
                .map(|(ordinal, stored)| (*stored, ordinal))
                .collect()
        })
    }

    /// Member for a stored representation.
    pub fn member(&'static self, stored: &str) -> Result<EnumMember, GtaError> {
        self.by_stored()
            .get(stored)
            .map(|&ordinal| EnumMember {
                enum_type: self,
                ordinal,
            })
            .ok_or_else(|| GtaError::UnknownEnumMember {
                enum_type: self.name.to_string(),
                stored: stored.to_string(),
            })
    }

    pub fn all_members(&'static self) -> impl Iterator<Item = EnumMember> {
        (0..self.members.len()).map(move |ordinal| EnumMember {
            enum_type: self,
            ordinal,
        })
    }
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumType")
            .field("name", &self.name)
            .field("members", &self.members)
            .finish()
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EnumType {}

/// One member of a stored enum type, independent of any Rust enum.
#[derive(Debug, Clone, Copy)]
pub struct EnumMember {
    enum_type: &'static EnumType,
    ordinal: usize,
}

impl EnumMember {
    pub fn enum_type(&self) -> &'static EnumType {
        self.enum_type
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn stored(&self) -> &'static str {
        self.enum_type.members[self.ordinal]
    }
}

impl PartialEq for EnumMember {
    fn eq(&self, other: &Self) -> bool {
        self.enum_type == other.enum_type && self.ordinal == other.ordinal
    }
}

impl Eq for EnumMember {}

impl fmt::Display for EnumMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stored())
    }
}

/// A Rust enum whose variants map one-to-one onto an [`EnumType`] table.
pub trait SqlEnum: Copy + Sized + 'static {
    fn enum_type() -> &'static EnumType;

    /// All variants, in the same order as the table's members.
    fn variants() -> &'static [Self];

    fn ordinal(self) -> usize;

    fn to_member(self) -> EnumMember {
        EnumMember {
            enum_type: Self::enum_type(),
            ordinal: self.ordinal(),
        }
    }

    fn from_member(member: EnumMember) -> Option<Self> {
        if member.enum_type() != Self::enum_type() {
            return None;
        }
        Self::variants().get(member.ordinal()).copied()
    }
}

pub static CURRENCY: EnumType = EnumType::new("currency", &["usd"]);

pub static MARKET: EnumType = EnumType::new("market", &["crypto", "forex", "futures", "stock"]);

pub static PRICE_FREQUENCY: EnumType = EnumType::new(
    "price_frequency",
    &["1min", "5min", "10min", "15min", "30min", "hourly", "daily"],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
}

impl SqlEnum for Currency {
    fn enum_type() -> &'static EnumType {
        &CURRENCY
    }

    fn variants() -> &'static [Self] {
        &[Currency::Usd]
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Market {
    Crypto,
    Forex,
    Futures,
    Stock,
}

impl SqlEnum for Market {
    fn enum_type() -> &'static EnumType {
        &MARKET
    }

    fn variants() -> &'static [Self] {
        &[Market::Crypto, Market::Forex, Market::Futures, Market::Stock]
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceFrequency {
    Min1,
    Min5,
    Min10,
    Min15,
    Min30,
    Hourly,
    Daily,
}

impl SqlEnum for PriceFrequency {
    fn enum_type() -> &'static EnumType {
        &PRICE_FREQUENCY
    }

    fn variants() -> &'static [Self] {
        &[
            PriceFrequency::Min1,
            PriceFrequency::Min5,
            PriceFrequency::Min10,
            PriceFrequency::Min15,
            PriceFrequency::Min30,
            PriceFrequency::Hourly,
            PriceFrequency::Daily,
        ]
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_table_matches<E: SqlEnum + PartialEq + fmt::Debug>() {
        let table = E::enum_type();
        assert_eq!(E::variants().len(), table.members.len());
        for &variant in E::variants() {
            let member = variant.to_member();
            let back = table.member(member.stored()).unwrap();
            assert_eq!(E::from_member(back), Some(variant));
        }
    }

    #[test]
    fn every_variant_maps_through_its_table() {
        assert_table_matches::<Currency>();
        assert_table_matches::<Market>();
        assert_table_matches::<PriceFrequency>();
    }

    #[test]
    fn stored_representations() {
        assert_eq!(Market::Stock.to_member().stored(), "stock");
        assert_eq!(PriceFrequency::Min1.to_member().stored(), "1min");
        assert_eq!(PriceFrequency::Daily.to_member().stored(), "daily");
        assert_eq!(Currency::Usd.to_member().stored(), "usd");
    }

    #[test]
    fn unknown_stored_value_is_an_error() {
        match MARKET.member("bonds") {
            Err(GtaError::UnknownEnumMember { enum_type, stored }) => {
                assert_eq!(enum_type, "market");
                assert_eq!(stored, "bonds");
            }
            other => panic!("expected UnknownEnumMember, got: {other:?}"),
        }
    }

    #[test]
    fn member_of_other_type_does_not_convert() {
        let member = Currency::Usd.to_member();
        assert_eq!(Market::from_member(member), None);
    }

    #[test]
    fn all_members_iterates_in_order() {
        let stored: Vec<&str> = MARKET.all_members().map(|m| m.stored()).collect();
        assert_eq!(stored, vec!["crypto", "forex", "futures", "stock"]);
    }
}
