//! Machine-instruction mnemonic catalog.
//!
//! The analysis engine does not encode machine instructions; it only needs to
//! recognize mnemonics (so they are not flagged as undefined operation codes)
//! and their encoded length (to advance the location counter and set label
//! attributes). The catalog covers the common z/Architecture formats:
//! RR (2 bytes), RX/RS/RI/SI/S (4 bytes), SS/RXY/RSY/RIL (6 bytes).

use std::collections::HashMap;

/// Catalog of known machine mnemonics and their encoded length in bytes.
#[derive(Debug)]
pub struct MnemonicCatalog {
    mnemonics: HashMap<&'static str, u8>,
}

impl Default for MnemonicCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MnemonicCatalog {
    /// Build the catalog.
    pub fn new() -> Self {
        let mut catalog = Self {
            mnemonics: HashMap::new(),
        };
        catalog.register_rr();
        catalog.register_rx_rs_ri();
        catalog.register_six_byte();
        catalog
    }

    /// The encoded length of a mnemonic, if known.
    pub fn length_of(&self, mnemonic: &str) -> Option<u8> {
        self.mnemonics.get(mnemonic.to_uppercase().as_str()).copied()
    }

    /// Whether the mnemonic names a machine instruction.
    pub fn contains(&self, mnemonic: &str) -> bool {
        self.length_of(mnemonic).is_some()
    }

    fn add_all(&mut self, length: u8, mnemonics: &[&'static str]) {
        for m in mnemonics {
            self.mnemonics.insert(m, length);
        }
    }

    fn register_rr(&mut self) {
        self.add_all(
            2,
            &[
                "LR", "AR", "SR", "MR", "DR", "CR", "ALR", "SLR", "NR", "OR", "XR", "LTR", "LCR",
                "LNR", "LPR", "BALR", "BASR", "BCR", "BCTR", "SPM", "BR", "NOPR",
            ],
        );
    }

    fn register_rx_rs_ri(&mut self) {
        self.add_all(
            4,
            &[
                // RX
                "L", "ST", "A", "S", "M", "D", "C", "AL", "SL", "N", "O", "X", "LA", "LH", "STH",
                "AH", "SH", "MH", "CH", "IC", "STC", "EX", "BAL", "BAS", "BC", "BCT", "CVB", "CVD",
                "B", "BE", "BNE", "BH", "BNH", "BL", "BNL", "BZ", "BNZ", "BO", "BNO", "BM", "BP",
                "NOP",
                // RS
                "LM", "STM", "SLL", "SRL", "SLA", "SRA", "SLDL", "SRDL", "BXH", "BXLE", "CS",
                // RI
                "LHI", "AHI", "MHI", "CHI", "TMH", "TML",
                // SI
                "CLI", "MVI", "NI", "OI", "XI", "TM",
                // S
                "SPKA", "IPK",
            ],
        );
    }

    fn register_six_byte(&mut self) {
        self.add_all(
            6,
            &[
                // SS
                "MVC", "MVZ", "MVN", "CLC", "NC", "OC", "XC", "TR", "TRT", "ED", "EDMK", "PACK",
                "UNPK", "ZAP", "AP", "SP", "MP", "DP", "CP", "MVO",
                // RXY / RSY
                "LG", "STG", "AG", "SG", "LGF", "STGF", "LMG", "STMG", "LY", "STY",
                // RIL
                "LARL", "BRCL", "LGFI", "AFI", "CFI",
                // Relative branches
                "J", "JE", "JNE", "JH", "JNH", "JL", "JNL", "JZ", "JNZ", "BRAS", "BRC", "BRCT",
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths_by_format() {
        let catalog = MnemonicCatalog::new();
        assert_eq!(catalog.length_of("LR"), Some(2));
        assert_eq!(catalog.length_of("L"), Some(4));
        assert_eq!(catalog.length_of("MVC"), Some(6));
    }

    #[test]
    fn test_case_insensitive() {
        let catalog = MnemonicCatalog::new();
        assert!(catalog.contains("mvc"));
    }

    #[test]
    fn test_unknown_mnemonic() {
        let catalog = MnemonicCatalog::new();
        assert!(!catalog.contains("FROB"));
    }
}
