//! # VIF Quantity Table
//!
//! Maps a `(VIF, data length)` pair onto a physical quantity with a label,
//! unit and decimal scale. Only quantities present in the table are reported;
//! every other record is consumed and skipped.
//!
//! The table is a plain value so callers can register quantities of their
//! own meter model on top of the standard entries:
//!
//! ```rust
//! use metering_rs::payload::vif_maps::{Quantity, QuantityKind, QuantityTable};
//!
//! let mut table = QuantityTable::default();
//! table.register(Quantity::new(0x3E, 4, "Durchfluss", "l/h", 0, QuantityKind::Instant));
//! assert!(table.lookup(0x3E, 4).is_some());
//! ```

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Whether a quantity is a register with storage dimension or a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuantityKind {
    Cumulative,
    Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    pub vif: u8,
    pub data_len: usize,
    pub label: String,
    pub unit: String,
    /// Raw value is scaled by `10^-decimals`.
    pub decimals: u32,
    pub kind: QuantityKind,
    /// Data field is a two's complement integer (type B).
    pub signed: bool,
}

impl Quantity {
    pub fn new(
        vif: u8,
        data_len: usize,
        label: &str,
        unit: &str,
        decimals: u32,
        kind: QuantityKind,
    ) -> Self {
        Self {
            vif,
            data_len,
            label: label.to_string(),
            unit: unit.to_string(),
            decimals,
            kind,
            signed: false,
        }
    }

    /// Mark the data field as signed.
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }
}

static STANDARD_QUANTITIES: Lazy<QuantityTable> = Lazy::new(|| {
    use QuantityKind::{Cumulative, Instant};

    let mut table = QuantityTable::empty();
    for quantity in [
        Quantity::new(0x06, 4, "Energie", "MWh", 3, Cumulative),
        Quantity::new(0x0E, 4, "Energie", "GJ", 3, Cumulative),
        Quantity::new(0x13, 4, "Volumen", "m³", 3, Cumulative),
        Quantity::new(0x23, 2, "Betriebstage", "d", 0, Cumulative),
        Quantity::new(0x2B, 4, "Leistung", "kW", 3, Instant).signed(),
        Quantity::new(0x3B, 4, "Durchfluss", "m³/h", 3, Instant).signed(),
        Quantity::new(0x5B, 2, "Vorlauf", "°C", 0, Instant).signed(),
        Quantity::new(0x5F, 2, "Rücklauf", "°C", 0, Instant).signed(),
        Quantity::new(0x61, 2, "ΔT", "°C", 2, Instant).signed(),
    ] {
        table.register(quantity);
    }
    table
});

#[derive(Debug, Clone, PartialEq)]
pub struct QuantityTable {
    entries: HashMap<(u8, usize), Quantity>,
}

impl QuantityTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The quantities understood out of the box (heat meter registers).
    pub fn standard() -> &'static QuantityTable {
        &STANDARD_QUANTITIES
    }

    /// Add or replace an entry, returning the one it replaced.
    pub fn register(&mut self, quantity: Quantity) -> Option<Quantity> {
        self.entries
            .insert((quantity.vif, quantity.data_len), quantity)
    }

    pub fn lookup(&self, vif: u8, data_len: usize) -> Option<&Quantity> {
        self.entries.get(&(vif, data_len))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QuantityTable {
    fn default() -> Self {
        Self::standard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_entries() {
        let table = QuantityTable::standard();
        let energy = table.lookup(0x06, 4).unwrap();
        assert_eq!(energy.label, "Energie");
        assert_eq!(energy.kind, QuantityKind::Cumulative);

        let supply = table.lookup(0x5B, 2).unwrap();
        assert_eq!(supply.label, "Vorlauf");
        assert_eq!(supply.kind, QuantityKind::Instant);
        assert!(supply.signed);
        assert!(!energy.signed);
    }

    #[test]
    fn test_length_is_part_of_key() {
        let table = QuantityTable::standard();
        assert!(table.lookup(0x06, 2).is_none());
        assert!(table.lookup(0x5B, 4).is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut table = QuantityTable::default();
        let before = table.len();
        let old = table.register(Quantity::new(0x06, 4, "Wärme", "MWh", 3, QuantityKind::Cumulative));
        assert_eq!(old.unwrap().label, "Energie");
        assert_eq!(table.len(), before);
        assert_eq!(table.lookup(0x06, 4).unwrap().label, "Wärme");
        // The shared standard table is untouched.
        assert_eq!(QuantityTable::standard().lookup(0x06, 4).unwrap().label, "Energie");
    }
}
