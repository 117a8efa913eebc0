//! Prefix/body scan assembler
//!
//! Two-state machine:
//!
//! ```text
//!            prefix                     body
//!   Idle ───────────▶ PrefixHeld ──────────────▶ Idle  (emit CompositeCode)
//!    │ body (emit)       │ prefix (replace)
//!    ▼                   │ expired (reset_timeout)
//!   Idle ◀───────────────┘
//! ```
//!
//! Classification is data driven: a prefix regex, a body regex and a list
//! of body decoders keyed by their leading marker.

use super::types::{CompositeCode, PendingPrefix, ScanEvent, Symbology};
use crate::core::config::{BarcodeConfig, ConfigError, DecoderConfig};
use crate::core::error::ClassifyError;
use regex::Regex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How a body is split into fields once its marker is recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoding {
    /// Single field; secondary taken from configuration
    Code128 { default_secondary: Option<String> },
    /// Two fields joined by `separator`
    Aztec { separator: String },
}

impl Decoding {
    pub fn symbology(&self) -> Symbology {
        match self {
            Decoding::Code128 { .. } => Symbology::Code128,
            Decoding::Aztec { .. } => Symbology::Aztec,
        }
    }
}

/// Marker → decoding entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDecoder {
    pub marker: String,
    pub decoding: Decoding,
}

impl BodyDecoder {
    pub fn new(marker: impl Into<String>, decoding: Decoding) -> Self {
        Self {
            marker: marker.into(),
            decoding,
        }
    }

    /// Split the marker-less body into (primary, secondary)
    fn decode(&self, rest: &str) -> Result<(String, Option<String>), ClassifyError> {
        match &self.decoding {
            Decoding::Code128 { default_secondary } => {
                Ok((rest.to_string(), default_secondary.clone()))
            }
            Decoding::Aztec { separator } => rest
                .split_once(separator.as_str())
                .map(|(primary, secondary)| {
                    (primary.to_string(), Some(secondary.to_string()))
                })
                .ok_or_else(|| ClassifyError::MissingSeparator(separator.clone())),
        }
    }
}

impl TryFrom<&DecoderConfig> for BodyDecoder {
    type Error = ConfigError;

    fn try_from(cfg: &DecoderConfig) -> Result<Self, Self::Error> {
        let decoding = match cfg.symbology {
            Symbology::Code128 => Decoding::Code128 {
                default_secondary: cfg
                    .default_secondary
                    .clone()
                    .filter(|s| !s.is_empty()),
            },
            Symbology::Aztec => match cfg.separator.as_deref() {
                Some(sep) if !sep.is_empty() => Decoding::Aztec {
                    separator: sep.to_string(),
                },
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "aztec decoder with marker {:?} needs a separator",
                        cfg.marker
                    )));
                }
            },
        };
        Ok(Self::new(cfg.marker.clone(), decoding))
    }
}

/// Outcome of feeding one admitted line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// Line was a prefix; it is now pending
    PrefixHeld(String),
    /// Line was a body; code is complete
    Completed(CompositeCode),
}

#[derive(Debug)]
pub struct ScanAssembler {
    prefix_re: Regex,
    body_re: Regex,
    /// Longest marker first so `""` acts as a catch-all
    decoders: Vec<BodyDecoder>,
    reset_timeout: Duration,
    pending: Option<PendingPrefix>,
}

impl ScanAssembler {
    pub fn new(
        prefix_re: Regex,
        body_re: Regex,
        mut decoders: Vec<BodyDecoder>,
        reset_timeout: Duration,
    ) -> Self {
        decoders.sort_by(|a, b| b.marker.len().cmp(&a.marker.len()));
        Self {
            prefix_re,
            body_re,
            decoders,
            reset_timeout,
            pending: None,
        }
    }

    pub fn from_config(cfg: &BarcodeConfig, reset_timeout: Duration) -> Result<Self, ConfigError> {
        let prefix_re = compile("barcode.prefix_regex", &cfg.prefix_regex)?;
        let body_re = compile("barcode.body_regex", &cfg.body_regex)?;
        let decoders = cfg
            .decoders
            .iter()
            .map(BodyDecoder::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if decoders.is_empty() {
            return Err(ConfigError::Invalid(
                "barcode.decoders must not be empty".to_string(),
            ));
        }
        Ok(Self::new(prefix_re, body_re, decoders, reset_timeout))
    }

    pub fn pending(&self) -> Option<&PendingPrefix> {
        self.pending.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Drop the pending prefix if it outlived the reset timeout
    ///
    /// Called every loop tick so a prefix expires even without new scans.
    pub fn expire(&mut self, now: Instant) -> Option<PendingPrefix> {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.is_expired(now, self.reset_timeout))
        {
            let stale = self.pending.take();
            if let Some(p) = &stale {
                info!(prefix = %p.value, "Pending prefix expired, back to idle");
            }
            return stale;
        }
        None
    }

    /// Feed one admitted line into the state machine
    ///
    /// A rejected line leaves the state untouched.
    pub fn feed(&mut self, event: &ScanEvent) -> Result<Assembly, ClassifyError> {
        self.expire(event.at);
        let raw = event.raw.as_str();

        // Prefix first: a line matching both patterns is a prefix
        if let Some(caps) = self.prefix_re.captures(raw) {
            let value = match caps.get(1) {
                Some(m) => m.as_str().to_string(),
                None => strip_marker(raw).to_string(),
            };
            if let Some(old) = &self.pending {
                debug!(old = %old.value, new = %value, "Replacing pending prefix");
            }
            self.pending = Some(PendingPrefix {
                value: value.clone(),
                captured_at: event.at,
            });
            return Ok(Assembly::PrefixHeld(value));
        }

        if self.body_re.is_match(raw) {
            let decoder = self
                .decoders
                .iter()
                .find(|d| raw.starts_with(d.marker.as_str()))
                .ok_or(ClassifyError::UnknownMarker)?;
            let (primary, secondary) = decoder.decode(&raw[decoder.marker.len()..])?;

            let prefix = self.pending.take().map(|p| p.value);
            return Ok(Assembly::Completed(CompositeCode {
                symbology: decoder.decoding.symbology(),
                primary,
                secondary,
                prefix,
            }));
        }

        Err(ClassifyError::NoMatch)
    }
}

fn compile(key: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex { key, source })
}

/// Drop the leading marker character
fn strip_marker(raw: &str) -> &str {
    let mut chars = raw.chars();
    chars.next();
    chars.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> ScanAssembler {
        ScanAssembler::new(
            Regex::new(r"^#\d{1,2}$").unwrap(),
            Regex::new(r"^\d{7,9}$").unwrap(),
            vec![BodyDecoder::new(
                "",
                Decoding::Code128 {
                    default_secondary: None,
                },
            )],
            Duration::from_secs(60),
        )
    }

    fn marked_assembler() -> ScanAssembler {
        ScanAssembler::new(
            Regex::new(r"^#(\d{2})$").unwrap(),
            Regex::new(r"^[CA][\w|]+$").unwrap(),
            vec![
                BodyDecoder::new(
                    "C",
                    Decoding::Code128 {
                        default_secondary: Some("SERUM".into()),
                    },
                ),
                BodyDecoder::new(
                    "A",
                    Decoding::Aztec {
                        separator: "|".into(),
                    },
                ),
            ],
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_prefix_then_body() {
        let t0 = Instant::now();
        let mut asm = assembler();

        let held = asm.feed(&ScanEvent::at("#07", t0)).unwrap();
        assert_eq!(held, Assembly::PrefixHeld("07".into()));
        assert!(!asm.is_idle());

        let done = asm
            .feed(&ScanEvent::at("1234567", t0 + Duration::from_secs(5)))
            .unwrap();
        let Assembly::Completed(code) = done else {
            panic!("expected completed code");
        };
        assert_eq!(code.value(), "071234567");
        assert_eq!(code.prefix.as_deref(), Some("07"));
        assert_eq!(code.symbology, Symbology::Code128);
        assert!(asm.is_idle());
    }

    #[test]
    fn test_lone_body_has_no_prefix() {
        let mut asm = assembler();
        let Assembly::Completed(code) = asm.feed(&ScanEvent::new("123456789")).unwrap() else {
            panic!("expected completed code");
        };
        assert_eq!(code.prefix, None);
        assert_eq!(code.value(), "123456789");
    }

    #[test]
    fn test_reject_leaves_state_unchanged() {
        let t0 = Instant::now();
        let mut asm = assembler();
        asm.feed(&ScanEvent::at("#07", t0)).unwrap();
        let before = asm.pending().cloned();

        for junk in ["hello", "12", "#123", "1234567890", ""] {
            let err = asm.feed(&ScanEvent::at(junk, t0)).unwrap_err();
            assert_eq!(err, ClassifyError::NoMatch);
            assert_eq!(asm.pending().cloned(), before);
        }
    }

    #[test]
    fn test_newer_prefix_replaces_older() {
        let t0 = Instant::now();
        let mut asm = assembler();
        asm.feed(&ScanEvent::at("#07", t0)).unwrap();
        asm.feed(&ScanEvent::at("#9", t0)).unwrap();

        let Assembly::Completed(code) = asm.feed(&ScanEvent::at("1234567", t0)).unwrap() else {
            panic!("expected completed code");
        };
        assert_eq!(code.value(), "91234567");
    }

    #[test]
    fn test_stale_prefix_is_not_used() {
        let t0 = Instant::now();
        let mut asm = assembler();
        asm.feed(&ScanEvent::at("#07", t0)).unwrap();

        let later = t0 + Duration::from_secs(61);
        let Assembly::Completed(code) = asm.feed(&ScanEvent::at("1234567", later)).unwrap() else {
            panic!("expected completed code");
        };
        assert_eq!(code.prefix, None);
        assert_eq!(code.value(), "1234567");
    }

    #[test]
    fn test_expire_on_tick_without_input() {
        let t0 = Instant::now();
        let mut asm = assembler();
        asm.feed(&ScanEvent::at("#07", t0)).unwrap();

        assert!(asm.expire(t0 + Duration::from_secs(30)).is_none());
        assert!(!asm.is_idle());

        let stale = asm.expire(t0 + Duration::from_secs(61)).unwrap();
        assert_eq!(stale.value, "07");
        assert!(asm.is_idle());
    }

    #[test]
    fn test_line_matching_both_patterns_is_prefix() {
        let mut asm = ScanAssembler::new(
            Regex::new(r"^\d{7}$").unwrap(),
            Regex::new(r"^\d{7,9}$").unwrap(),
            vec![BodyDecoder::new(
                "",
                Decoding::Code128 {
                    default_secondary: None,
                },
            )],
            Duration::from_secs(60),
        );
        let out = asm.feed(&ScanEvent::new("1234567")).unwrap();
        assert_eq!(out, Assembly::PrefixHeld("234567".into()));
    }

    #[test]
    fn test_marker_selects_symbology() {
        let mut asm = marked_assembler();

        let Assembly::Completed(code) = asm.feed(&ScanEvent::new("C1234567")).unwrap() else {
            panic!("expected completed code");
        };
        assert_eq!(code.symbology, Symbology::Code128);
        assert_eq!(code.primary, "1234567");
        assert_eq!(code.secondary.as_deref(), Some("SERUM"));

        let Assembly::Completed(code) = asm.feed(&ScanEvent::new("A1234567|URINE")).unwrap()
        else {
            panic!("expected completed code");
        };
        assert_eq!(code.symbology, Symbology::Aztec);
        assert_eq!(code.primary, "1234567");
        assert_eq!(code.secondary.as_deref(), Some("URINE"));
    }

    #[test]
    fn test_prefix_capture_group_is_used() {
        let mut asm = marked_assembler();
        assert_eq!(
            asm.feed(&ScanEvent::new("#42")).unwrap(),
            Assembly::PrefixHeld("42".into())
        );
    }

    #[test]
    fn test_unknown_marker_and_missing_separator_are_rejections() {
        let mut asm = ScanAssembler::new(
            Regex::new(r"^#\d{2}$").unwrap(),
            Regex::new(r"^\w[\w|]+$").unwrap(),
            vec![BodyDecoder::new(
                "A",
                Decoding::Aztec {
                    separator: "|".into(),
                },
            )],
            Duration::from_secs(60),
        );
        asm.feed(&ScanEvent::new("#07")).unwrap();

        assert_eq!(
            asm.feed(&ScanEvent::new("X1234567")).unwrap_err(),
            ClassifyError::UnknownMarker
        );
        assert_eq!(
            asm.feed(&ScanEvent::new("A1234567")).unwrap_err(),
            ClassifyError::MissingSeparator("|".into())
        );
        // Prefix survives rejected bodies
        assert_eq!(asm.pending().map(|p| p.value.as_str()), Some("07"));
    }

    #[test]
    fn test_from_config_requires_aztec_separator() {
        let cfg = BarcodeConfig {
            decoders: vec![DecoderConfig {
                marker: "A".into(),
                symbology: Symbology::Aztec,
                separator: None,
                default_secondary: None,
            }],
            ..BarcodeConfig::default()
        };
        let err = ScanAssembler::from_config(&cfg, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_config_rejects_bad_regex() {
        let cfg = BarcodeConfig {
            body_regex: "^(\\d+$".into(),
            ..BarcodeConfig::default()
        };
        let err = ScanAssembler::from_config(&cfg, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidRegex {
                key: "barcode.body_regex",
                ..
            }
        ));
    }
}
