//! FDSN Source Identifier (SID).
//!
//! The identifier has the form `FDSN:NET_STA_LOC_BAND_SOURCE_SUBSOURCE`. A
//! SEED channel code such as `BHZ` splits into band `B`, source `H`, and
//! subsource `Z`. v2 records carry the four NSLC codes and get an
//! identifier synthesized from them. Identifiers that do not follow the
//! FDSN layout are kept verbatim as opaque identifiers.

use std::fmt;

use crate::{MseedError, Result};

const PREFIX: &str = "FDSN:";

/// FDSN Source Identifier.
///
/// # Examples
///
/// ```
/// use miniseed_trace::SourceId;
///
/// let sid = SourceId::from_nslc("IU", "ANMO", "00", "BHZ").unwrap();
/// assert_eq!(sid.to_string(), "FDSN:IU_ANMO_00_B_H_Z");
/// assert_eq!(sid.channel_code(), "BHZ");
///
/// let parsed: SourceId = "FDSN:IU_ANMO_00_B_H_Z".parse().unwrap();
/// assert_eq!(parsed, sid);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId {
    network: String,
    station: String,
    location: String,
    band: String,
    source: String,
    subsource: String,
    /// The full text of an identifier outside the FDSN layout. The code
    /// fields are empty when set.
    opaque: Option<String>,
}

impl SourceId {
    /// Parse `FDSN:NET_STA_LOC_B_S_SS`. The `FDSN:` prefix is optional.
    ///
    /// Stations and locations cannot contain `_`, so the first three
    /// fields are split from the left and the channel parts follow.
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix(PREFIX).unwrap_or(s);
        let parts: Vec<&str> = body.split('_').collect();
        if parts.len() != 6 {
            return Err(MseedError::InvalidSourceId(format!(
                "expected 6 '_'-separated fields, got {} in {s:?}",
                parts.len()
            )));
        }
        Ok(Self {
            network: parts[0].to_string(),
            station: parts[1].to_string(),
            location: parts[2].to_string(),
            band: parts[3].to_string(),
            source: parts[4].to_string(),
            subsource: parts[5].to_string(),
            opaque: None,
        })
    }

    /// Parse `s` as an FDSN identifier, keeping it verbatim as an opaque
    /// identifier when it does not split into the six fields.
    ///
    /// ```
    /// use miniseed_trace::SourceId;
    ///
    /// let sid = SourceId::from_identifier("urn:example:XXTEST0Z1");
    /// assert!(!sid.is_fdsn());
    /// assert_eq!(sid.to_string(), "urn:example:XXTEST0Z1");
    /// ```
    pub fn from_identifier(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|_| Self {
            network: String::new(),
            station: String::new(),
            location: String::new(),
            band: String::new(),
            source: String::new(),
            subsource: String::new(),
            opaque: Some(s.to_string()),
        })
    }

    /// Create a source identifier from NSLC codes.
    ///
    /// A channel of up to 3 characters is split into band, source, and
    /// subsource, missing parts left empty. A channel already in `B_S_SS`
    /// form is split on the underscores.
    pub fn from_nslc(network: &str, station: &str, location: &str, channel: &str) -> Result<Self> {
        let (band, source, subsource) = split_channel(channel)?;
        Ok(Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            band,
            source,
            subsource,
            opaque: None,
        })
    }

    /// Whether the identifier follows the FDSN layout.
    pub fn is_fdsn(&self) -> bool {
        self.opaque.is_none()
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn band(&self) -> &str {
        &self.band
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn subsource(&self) -> &str {
        &self.subsource
    }

    /// The channel code: `BHZ` when no part is longer than one character,
    /// otherwise `B_S_SS`.
    pub fn channel_code(&self) -> String {
        if [&self.band, &self.source, &self.subsource]
            .iter()
            .all(|p| p.chars().count() <= 1)
        {
            format!("{}{}{}", self.band, self.source, self.subsource)
        } else {
            format!("{}_{}_{}", self.band, self.source, self.subsource)
        }
    }

    /// `NET.STA.LOC.CHA`, or the full text of an opaque identifier.
    pub fn nslc(&self) -> String {
        if let Some(opaque) = &self.opaque {
            return opaque.clone();
        }
        format!(
            "{}.{}.{}.{}",
            self.network,
            self.station,
            self.location,
            self.channel_code()
        )
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(opaque) = &self.opaque {
            return f.write_str(opaque);
        }
        write!(
            f,
            "{PREFIX}{}_{}_{}_{}_{}_{}",
            self.network, self.station, self.location, self.band, self.source, self.subsource
        )
    }
}

impl std::str::FromStr for SourceId {
    type Err = MseedError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split_channel(channel: &str) -> Result<(String, String, String)> {
    let chars: Vec<char> = channel.chars().collect();
    if chars.len() <= 3 {
        let part = |i: usize| chars.get(i).map(char::to_string).unwrap_or_default();
        return Ok((part(0), part(1), part(2)));
    }
    let parts: Vec<&str> = channel.split('_').collect();
    match parts.as_slice() {
        [band, source, subsource] => Ok((band.to_string(), source.to_string(), subsource.to_string())),
        _ => Err(MseedError::InvalidSourceId(format!(
            "channel code {channel:?} is neither up to 3 characters nor B_S_SS"
        ))),
    }
}
