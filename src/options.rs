//! Parse and decode behaviour switches.

/// Options controlling payload decompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Treat a Steim reverse integration constant that disagrees with the
    /// last decoded sample as an error instead of a warning.
    ///
    /// Off by default: some producers write loose trailing constants.
    pub strict_integration_constant: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_integration_constant(mut self, strict: bool) -> Self {
        self.strict_integration_constant = strict;
        self
    }
}

/// Options controlling record parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Compute and compare the CRC of v3 records.
    pub verify_crc: bool,
    /// Fail the record on a CRC mismatch rather than flag it.
    pub reject_crc_mismatch: bool,
    /// Options applied when records are decompressed.
    pub decode: DecodeOptions,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            verify_crc: true,
            reject_crc_mismatch: false,
            decode: DecodeOptions::default(),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verify_crc(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// Reject records whose CRC does not match. Implies `verify_crc`.
    pub fn with_reject_crc_mismatch(mut self, reject: bool) -> Self {
        self.reject_crc_mismatch = reject;
        if reject {
            self.verify_crc = true;
        }
        self
    }

    pub fn with_decode(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_lenient() {
        let opts = ParseOptions::default();
        assert!(opts.verify_crc);
        assert!(!opts.reject_crc_mismatch);
        assert!(!opts.decode.strict_integration_constant);
    }

    #[test]
    fn test_reject_implies_verify() {
        let opts = ParseOptions::new()
            .with_verify_crc(false)
            .with_reject_crc_mismatch(true);
        assert!(opts.verify_crc);
    }
}
