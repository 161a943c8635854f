use std::{fmt, str::FromStr};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::error::CampaignError;

pub const FRAMING_RULE: &str = "THE \"NOSE-DOWN\" RULE (CRITICAL): every image MUST be strictly framed from the tip of the nose down. NEVER show eyes, forehead or the upper half of the face; the crop cuts right above the nostrils. Focus is 80% on the outfit's texture and fit and 20% on the lower face, lips and chin to convey attitude without identity.";

pub const VISUAL_STYLE: &str = "THE LOOK: analog photography, 35mm Kodak Portra 400 film emulation. High texture, visible film grain, natural light leaks, slight vignette. NO smooth or plastic \"AI skin\".";

pub const LOCATION: &str = "THE LOCATION: Bahía Blanca, Argentina. The environment must look authentic to this Argentine city: patterned sidewalk tiles (\"veredas con baldosas calcáreas\"), sycamore trees (\"árboles plátanos\"), neoclassical architecture facades and general urban grit.";

pub const ASPECT_RATIO_RULE: &str = "THE RATIO: all images are generated in 4:5 aspect ratio (vertical portrait).";

pub const ASPECT_RATIO: &str = "4:5";

const URBAN_DAY: &[&str] = &[
    "crossing a street on \"baldosas\" sidewalks",
    "pausing next to a \"plátano\" tree",
    "waiting at a vintage bus stop",
];
const URBAN_NIGHT: &[&str] = &[
    "waiting for a taxi under the neon lights of a kiosk",
    "walking fast on wet pavement reflecting city lights",
    "standing near a brutalist concrete building",
];
const SOCIAL_DAY: &[&str] = &[
    "having an aperitivo at a sidewalk cafe table",
    "browsing a local outdoor market",
    "holding a bouquet of flowers",
];
const SOCIAL_NIGHT: &[&str] = &[
    "holding a cocktail at a dimly lit speakeasy bar counter",
    "standing outside a crowded music venue (flash photography style)",
    "laughing at a dinner table with string lights",
];
const WORK_ANY: &[&str] = &[
    "typing on a laptop in a minimalist cafe with large windows",
    "looking through vinyl records in a shop",
    "carrying a leather folder in a downtown area",
];
// Used for (vibe, moment) pairs the scenario table does not list.
const DEFAULT_SCENARIO: &[&str] = &[
    "strolling unhurried along a tree-lined sidewalk",
    "sitting on a low stone wall in a quiet plaza",
    "leaning against a sunlit neoclassical facade",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    Joven,
    Madura,
    PlusSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Moment {
    Day,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vibe {
    Urban,
    Social,
    Work,
    Relax,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] =
        [ModelVariant::Joven, ModelVariant::Madura, ModelVariant::PlusSize];

    pub fn subject(self) -> &'static str {
        match self {
            ModelVariant::Joven => "Authentic Argentine woman (20s).",
            ModelVariant::Madura => {
                "Sophisticated Argentine woman (40s-50s), showing elegant, natural signs of aging on neck and hands."
            }
            ModelVariant::PlusSize => {
                "Confident, voluptuous curvy Argentine woman, clothes fitting tightly but naturally showing her figure."
            }
        }
    }
}

impl Moment {
    pub const ALL: [Moment; 2] = [Moment::Day, Moment::Night];
}

impl Vibe {
    pub const ALL: [Vibe; 4] = [Vibe::Urban, Vibe::Social, Vibe::Work, Vibe::Relax];
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelVariant::Joven => "Joven",
            ModelVariant::Madura => "Madura",
            ModelVariant::PlusSize => "Plus Size",
        })
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Moment::Day => "Day", Moment::Night => "Night" })
    }
}

impl fmt::Display for Vibe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Vibe::Urban => "Urban",
            Vibe::Social => "Social",
            Vibe::Work => "Work",
            Vibe::Relax => "Relax",
        })
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase().replace(['-', '_'], " ")
}

impl FromStr for ModelVariant {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "joven" | "young" => Ok(ModelVariant::Joven),
            "madura" | "mature" => Ok(ModelVariant::Madura),
            "plus size" | "plussize" | "plus" => Ok(ModelVariant::PlusSize),
            _ => Err(CampaignError::invalid(format!("unknown model variant '{}'", s.trim()))),
        }
    }
}

impl FromStr for Moment {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "day" | "dia" | "día" => Ok(Moment::Day),
            "night" | "noche" => Ok(Moment::Night),
            _ => Err(CampaignError::invalid(format!("unknown moment '{}'", s.trim()))),
        }
    }
}

impl FromStr for Vibe {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "urban" | "urbano" => Ok(Vibe::Urban),
            "social" => Ok(Vibe::Social),
            "work" | "trabajo" => Ok(Vibe::Work),
            "relax" => Ok(Vibe::Relax),
            _ => Err(CampaignError::invalid(format!("unknown vibe '{}'", s.trim()))),
        }
    }
}

/// The three user-selected campaign parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CampaignParams {
    pub model_variant: ModelVariant,
    pub moment: Moment,
    pub vibe: Vibe,
}

impl CampaignParams {
    pub fn new(model_variant: ModelVariant, moment: Moment, vibe: Vibe) -> Self {
        Self { model_variant, moment, vibe }
    }

    /// Parses raw UI labels; any unknown label is `InvalidInput`.
    pub fn parse(model_variant: &str, moment: &str, vibe: &str) -> Result<Self, CampaignError> {
        Ok(Self {
            model_variant: model_variant.parse()?,
            moment: moment.parse()?,
            vibe: vibe.parse()?,
        })
    }
}

/// Fixed creative-direction contract shared by every synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct StyleTemplate {
    pub framing: &'static str,
    pub look: &'static str,
    pub location: &'static str,
    pub ratio: &'static str,
}

pub const LISA_STYLE: StyleTemplate = StyleTemplate {
    framing: FRAMING_RULE,
    look: VISUAL_STYLE,
    location: LOCATION,
    ratio: ASPECT_RATIO_RULE,
};

impl Default for StyleTemplate {
    fn default() -> Self { LISA_STYLE }
}

impl StyleTemplate {
    /// Candidate scenes for a (vibe, moment) pair, or `None` when the table has no entry.
    pub fn scenarios(&self, moment: Moment, vibe: Vibe) -> Option<&'static [&'static str]> {
        match (vibe, moment) {
            (Vibe::Urban, Moment::Day) => Some(URBAN_DAY),
            (Vibe::Urban, Moment::Night) => Some(URBAN_NIGHT),
            (Vibe::Social, Moment::Day) => Some(SOCIAL_DAY),
            (Vibe::Social, Moment::Night) => Some(SOCIAL_NIGHT),
            (Vibe::Work, _) => Some(WORK_ANY),
            (Vibe::Relax, _) => None,
        }
    }

    pub fn describe(&self, params: CampaignParams) -> String {
        let CampaignParams { model_variant, moment, vibe } = params;
        let scenes = self.scenarios(moment, vibe).unwrap_or_else(|| {
            tracing::debug!(%vibe, %moment, "no scenario entry, using default scenes");
            DEFAULT_SCENARIO
        });
        format!(
            "CORE AESTHETIC & FRAMING RULES (NON-NEGOTIABLE):\n\
             1. {framing}\n\
             2. {look}\n\
             3. {location}\n\
             4. {ratio}\n\n\
             SCENARIO ({vibe} / {moment}): pick exactly one of: {scenes}.\n\n\
             SUBJECT ({model}): {subject}",
            framing = self.framing,
            look = self.look,
            location = self.location,
            ratio = self.ratio,
            vibe = vibe,
            moment = moment,
            scenes = scenes.join("; "),
            model = model_variant,
            subject = model_variant.subject(),
        )
    }

    /// Same as [`describe`](Self::describe) but from raw labels.
    pub fn describe_raw(
        &self,
        model_variant: &str,
        moment: &str,
        vibe: &str,
    ) -> Result<String, CampaignError> {
        Ok(self.describe(CampaignParams::parse(model_variant, moment, vibe)?))
    }
}

/// Every valid parameter triple, in cartesian order.
pub fn combinations() -> Vec<CampaignParams> {
    ParameterPicker::new_cartesian().collect()
}

#[derive(Clone, Copy, Debug)]
pub enum PickMode { Cartesian, Random }

/// Deterministic parameter picker: walks the cartesian space or samples from a seeded RNG.
pub struct ParameterPicker {
    mode: PickMode,
    m: usize, t: usize, v: usize,
    rng: StdRng,
}

impl ParameterPicker {
    pub fn new_cartesian() -> Self {
        Self { mode: PickMode::Cartesian, m: 0, t: 0, v: 0, rng: StdRng::seed_from_u64(0) }
    }

    pub fn new_random(seed: u64) -> Self {
        Self { mode: PickMode::Random, m: 0, t: 0, v: 0, rng: StdRng::seed_from_u64(seed) }
    }
}

impl Iterator for ParameterPicker {
    type Item = CampaignParams;

    /// Cartesian mode ends after the last triple; random mode never ends.
    fn next(&mut self) -> Option<CampaignParams> {
        match self.mode {
            PickMode::Cartesian => {
                if self.m >= ModelVariant::ALL.len() {
                    return None;
                }
                let params = CampaignParams::new(
                    ModelVariant::ALL[self.m],
                    Moment::ALL[self.t],
                    Vibe::ALL[self.v],
                );
                // vibe is the least-significant index
                self.v += 1;
                if self.v >= Vibe::ALL.len() {
                    self.v = 0;
                    self.t += 1;
                }
                if self.t >= Moment::ALL.len() {
                    self.t = 0;
                    self.m += 1;
                }
                Some(params)
            }
            PickMode::Random => {
                let m = self.rng.random_range(0..ModelVariant::ALL.len());
                let t = self.rng.random_range(0..Moment::ALL.len());
                let v = self.rng.random_range(0..Vibe::ALL.len());
                Some(CampaignParams::new(ModelVariant::ALL[m], Moment::ALL[t], Vibe::ALL[v]))
            }
        }
    }
}
