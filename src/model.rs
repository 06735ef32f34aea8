use std::{fmt, sync::Arc};

use chrono::NaiveDate;

use crate::foundation::error::{CertError, CertResult};

/// Most signer blocks a certificate can carry.
pub const MAX_SIGNERS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CertificateKind {
    Excellence,
    Participation,
    Appreciation,
}

impl CertificateKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellence => "Excellence",
            Self::Participation => "Participation",
            Self::Appreciation => "Appreciation",
        }
    }

    /// Lower-case form used in archive file names.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Excellence => "excellence",
            Self::Participation => "participation",
            Self::Appreciation => "appreciation",
        }
    }
}

impl fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PrizeRank {
    First,
    Second,
    Third,
}

impl PrizeRank {
    pub fn label(self) -> &'static str {
        match self {
            Self::First => "First",
            Self::Second => "Second",
            Self::Third => "Third",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
        }
    }
}

impl fmt::Display for PrizeRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventInfo {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpeakerInfo {
    pub name: String,
    #[serde(default)]
    pub designation: Option<String>,
}

impl SpeakerInfo {
    /// `Speaker: <name>[ - <designation>]`, or `None` when the name is blank.
    pub fn line(&self) -> Option<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let mut out = format!("Speaker: {name}");
        if let Some(d) = self.designation.as_deref().map(str::trim)
            && !d.is_empty()
        {
            out.push_str(" - ");
            out.push_str(d);
        }
        Some(out)
    }
}

/// Encoded signature image bytes (PNG with transparency, typically).
///
/// Cloning is cheap; the bytes are decoded once per render.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureSource {
    bytes: Arc<[u8]>,
}

impl SignatureSource {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SignatureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureSource")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One signer slot as entered by the user. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerInput {
    pub name: Option<String>,
    pub post: Option<String>,
    pub signature: Option<SignatureSource>,
}

impl SignerInput {
    pub fn new(
        name: impl Into<String>,
        post: impl Into<String>,
        signature: Option<SignatureSource>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            post: Some(post.into()),
            signature,
        }
    }

    /// The complete signer record, if name, post and signature are all present.
    pub fn complete(&self) -> Option<Signer> {
        let name = non_blank(self.name.as_deref())?;
        let post = non_blank(self.post.as_deref())?;
        let signature = self.signature.clone()?;
        Some(Signer {
            name,
            post,
            signature,
        })
    }

    pub fn has_signature(&self) -> bool {
        self.signature.is_some()
    }
}

/// A signer with every required field present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signer {
    name: String,
    post: String,
    signature: SignatureSource,
}

impl Signer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post(&self) -> &str {
        &self.post
    }

    pub fn signature(&self) -> &SignatureSource {
        &self.signature
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Everything needed to render one recipient's certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateRequest {
    pub recipient: String,
    pub kind: CertificateKind,
    pub prize_rank: Option<PrizeRank>,
    pub event: Option<EventInfo>,
    pub speaker: Option<SpeakerInfo>,
    pub signers: Vec<SignerInput>,
}

impl CertificateRequest {
    pub fn new(recipient: impl Into<String>, kind: CertificateKind) -> Self {
        Self {
            recipient: recipient.into(),
            kind,
            prize_rank: None,
            event: None,
            speaker: None,
            signers: Vec::new(),
        }
    }

    pub fn with_prize_rank(mut self, rank: PrizeRank) -> Self {
        self.prize_rank = Some(rank);
        self
    }

    pub fn with_event(mut self, event: EventInfo) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_speaker(mut self, speaker: SpeakerInfo) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_signers(mut self, signers: Vec<SignerInput>) -> Self {
        self.signers = signers;
        self
    }

    /// Prize rank, honored only for the Excellence kind.
    pub fn effective_prize_rank(&self) -> Option<PrizeRank> {
        match self.kind {
            CertificateKind::Excellence => self.prize_rank,
            CertificateKind::Participation | CertificateKind::Appreciation => None,
        }
    }

    pub fn validate(&self) -> CertResult<()> {
        if self.signers.len() > MAX_SIGNERS {
            return Err(CertError::validation(format!(
                "at most {MAX_SIGNERS} signers are supported, got {}",
                self.signers.len()
            )));
        }
        if self.prize_rank.is_some() && self.kind != CertificateKind::Excellence {
            return Err(CertError::validation(format!(
                "prize rank is only valid for Excellence certificates, not {}",
                self.kind
            )));
        }
        Ok(())
    }
}
