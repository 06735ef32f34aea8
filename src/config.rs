//! Serde-backed configuration: layout constants, font sizes and the JSON batch
//! description consumed by the `certforge` binary.

use std::path::{Path, PathBuf};

use crate::{
    foundation::core::Rgba8,
    foundation::error::{CertError, CertResult},
    layout::Anchor,
    model::{
        CertificateKind, CertificateRequest, EventInfo, SignatureSource, SignerInput, SpeakerInfo,
    },
    pipeline::{BatchOptions, CollisionPolicy, PrizeAssignments},
    template::{FontFace, FontSet, Template},
};

/// Design constants of the fixed certificate layout, in canvas pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayoutStyle {
    pub title_prefix: String,
    pub header_text: String,
    pub excellence_phrase: String,
    pub participation_phrase: String,
    pub appreciation_phrase: String,
    /// `chrono` strftime pattern for the event date line.
    pub date_format: String,

    pub text_color: Rgba8,
    /// Opaque color the composited page is flattened over.
    pub backdrop: Rgba8,

    pub title_anchor: Anchor,
    pub prize_gap: f64,
    pub header_anchor: Anchor,
    pub header_gap: f64,
    pub name_anchor: Anchor,
    pub name_gap: f64,
    pub underline_gap: f64,
    pub underline_width: f64,
    /// Horizontal extent of the name underline as fractions of canvas width.
    pub underline_span: (f64, f64),
    pub event_gap: f64,
    pub date_gap: f64,
    pub speaker_gap: f64,

    /// Distance from the bottom edge to the top of the signer blocks.
    pub signature_offset_from_bottom: f64,
    pub signature_width: u32,
    pub placeholder_drop: f64,
    pub signature_rule_drop: f64,
    pub signature_rule_width: f64,
    pub signer_name_drop: f64,
    pub signer_post_drop: f64,

    pub output_dpi: f64,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            title_prefix: "Of".to_string(),
            header_text: "THIS CERTIFICATE IS PROUDLY PRESENTED TO".to_string(),
            excellence_phrase: "for outstanding achievement in".to_string(),
            participation_phrase: "for participating in".to_string(),
            appreciation_phrase: "for valuable contribution to".to_string(),
            date_format: "%B %d, %Y".to_string(),
            text_color: Rgba8::BLACK,
            backdrop: Rgba8::WHITE,
            title_anchor: Anchor::new(1.0 / 3.0, 0.0),
            prize_gap: 90.0,
            header_anchor: Anchor::new(0.5, -30.0),
            header_gap: 20.0,
            name_anchor: Anchor::new(0.5, 80.0),
            name_gap: 20.0,
            underline_gap: 30.0,
            underline_width: 2.0,
            underline_span: (0.25, 0.75),
            event_gap: 50.0,
            date_gap: 20.0,
            speaker_gap: 20.0,
            signature_offset_from_bottom: 450.0,
            signature_width: 200,
            placeholder_drop: 50.0,
            signature_rule_drop: 100.0,
            signature_rule_width: 1.0,
            signer_name_drop: 20.0,
            signer_post_drop: 60.0,
            output_dpi: 300.0,
        }
    }
}

impl LayoutStyle {
    pub fn phrase_for(&self, kind: CertificateKind) -> &str {
        match kind {
            CertificateKind::Excellence => &self.excellence_phrase,
            CertificateKind::Participation => &self.participation_phrase,
            CertificateKind::Appreciation => &self.appreciation_phrase,
        }
    }

    pub fn validate(&self) -> CertResult<()> {
        if !self.output_dpi.is_finite() || self.output_dpi <= 0.0 {
            return Err(CertError::validation("output_dpi must be finite and > 0"));
        }
        if self.signature_width == 0 {
            return Err(CertError::validation("signature_width must be > 0"));
        }
        let (lo, hi) = self.underline_span;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(CertError::validation(
                "underline_span must be an ordered pair within 0..=1",
            ));
        }
        let gaps = [
            self.prize_gap,
            self.header_gap,
            self.name_gap,
            self.underline_gap,
            self.event_gap,
            self.date_gap,
            self.speaker_gap,
        ];
        if gaps.iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(CertError::validation("layout gaps must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Font size in pixels for each text role.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FontSizes {
    pub title: f32,
    pub name: f32,
    pub header: f32,
    pub details: f32,
    pub signature: f32,
    pub prize: f32,
    pub speaker: f32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            title: 170.0,
            name: 100.0,
            header: 60.0,
            details: 50.0,
            signature: 35.0,
            prize: 75.0,
            speaker: 45.0,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SignerConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub signature: Option<PathBuf>,
}

/// Winner lists as entered in the prize allocation step.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PrizeWinners {
    pub first: Vec<String>,
    pub second: Vec<String>,
    pub third: Vec<String>,
}

/// JSON batch description read by the command line front end.
///
/// Relative paths are resolved against the directory holding the config file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BatchConfig {
    pub template: PathBuf,
    pub font: PathBuf,
    #[serde(default)]
    pub font_sizes: FontSizes,
    #[serde(default)]
    pub style: LayoutStyle,
    pub kind: CertificateKind,
    #[serde(default)]
    pub event: Option<EventInfo>,
    #[serde(default)]
    pub speaker: Option<SpeakerInfo>,
    #[serde(default)]
    pub signers: Vec<SignerConfig>,
    #[serde(default)]
    pub roster: Vec<String>,
    #[serde(default)]
    pub prizes: PrizeWinners,
    #[serde(default = "default_true")]
    pub require_signatures: bool,
    #[serde(default)]
    pub collision: CollisionPolicy,
}

fn default_true() -> bool {
    true
}

impl BatchConfig {
    pub fn from_json_str(json: &str) -> CertResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CertError::validation(format!("invalid batch config: {e}")))
    }

    pub fn from_path(path: &Path) -> CertResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CertError::resource(format!("batch config '{}' unavailable: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Load the template image and font, failing with a resource error naming the file.
    pub fn load_template(&self, base_dir: &Path) -> CertResult<Template> {
        let image_path = base_dir.join(&self.template);
        let image_bytes = std::fs::read(&image_path).map_err(|e| {
            CertError::resource(format!(
                "template image '{}' unavailable: {e}",
                image_path.display()
            ))
        })?;
        let font_path = base_dir.join(&self.font);
        let font_bytes = std::fs::read(&font_path).map_err(|e| {
            CertError::resource(format!("font '{}' unavailable: {e}", font_path.display()))
        })?;

        let face = FontFace::new(font_path.display().to_string(), font_bytes)?;
        let fonts = FontSet::uniform(face, self.font_sizes);
        Template::from_encoded(&image_bytes, fonts, self.style.clone())
    }

    /// Signer slots with their signature images read from disk.
    pub fn load_signers(&self, base_dir: &Path) -> CertResult<Vec<SignerInput>> {
        self.signers
            .iter()
            .map(|s| {
                let signature = match &s.signature {
                    Some(rel) => {
                        let path = base_dir.join(rel);
                        let bytes = std::fs::read(&path).map_err(|e| {
                            CertError::resource(format!(
                                "signature image '{}' unavailable: {e}",
                                path.display()
                            ))
                        })?;
                        Some(SignatureSource::from_bytes(bytes))
                    }
                    None => None,
                };
                Ok(SignerInput {
                    name: s.name.clone(),
                    post: s.post.clone(),
                    signature,
                })
            })
            .collect()
    }

    /// Request for one recipient with the batch-wide parameters.
    pub fn request_for(&self, name: &str, signers: &[SignerInput]) -> CertificateRequest {
        CertificateRequest {
            recipient: name.trim().to_string(),
            kind: self.kind,
            prize_rank: None,
            event: self.event.clone(),
            speaker: self.speaker.clone(),
            signers: signers.to_vec(),
        }
    }

    /// One request per roster name, in roster order.
    pub fn build_roster(&self, signers: &[SignerInput]) -> Vec<CertificateRequest> {
        self.roster
            .iter()
            .map(|name| self.request_for(name, signers))
            .collect()
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            require_signatures: self.require_signatures,
            collision: self.collision,
            ..BatchOptions::default()
        }
    }

    pub fn prize_assignments(&self) -> PrizeAssignments {
        PrizeAssignments::from_winners(
            &self.prizes.first,
            &self.prizes.second,
            &self.prizes.third,
        )
    }
}
