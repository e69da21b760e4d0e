use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Prize tiers of a 4D draw, stored as their integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrizeTier {
    First,
    Second,
    Third,
    Special,
    Consolation,
}

impl PrizeTier {
    pub const ALL: [PrizeTier; 5] = [
        PrizeTier::First,
        PrizeTier::Second,
        PrizeTier::Third,
        PrizeTier::Special,
        PrizeTier::Consolation,
    ];

    pub fn code(&self) -> u8 {
        match self {
            PrizeTier::First => 1,
            PrizeTier::Second => 2,
            PrizeTier::Third => 3,
            PrizeTier::Special => 4,
            PrizeTier::Consolation => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

impl std::fmt::Display for PrizeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrizeTier::First => write!(f, "1st Prize"),
            PrizeTier::Second => write!(f, "2nd Prize"),
            PrizeTier::Third => write!(f, "3rd Prize"),
            PrizeTier::Special => write!(f, "Special"),
            PrizeTier::Consolation => write!(f, "Consolation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub draw_date: String,
    pub number: String,
    pub tier: PrizeTier,
    pub total_points: Option<f64>,
}

impl ResultEntry {
    pub fn band(&self) -> Option<Band> {
        self.total_points.map(Band::for_points)
    }
}

/// Top-three prizes of one draw, ordered by tier.
#[derive(Debug, Clone)]
pub struct DrawSummary {
    pub draw_date: String,
    pub entries: Vec<ResultEntry>,
}

#[derive(Debug, Clone)]
pub struct DrawDetails {
    pub draw_date: String,
    pub winners: Vec<ResultEntry>,
    pub special: Vec<ResultEntry>,
    pub consolation: Vec<ResultEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberProbability {
    pub number: String,
    pub prob: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilitySource {
    #[default]
    Default,
    Magnum,
}

impl ProbabilitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbabilitySource::Default => "default",
            ProbabilitySource::Magnum => "magnum",
        }
    }
}

impl std::fmt::Display for ProbabilitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability window applied by the "view all" listing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilityFilter {
    /// Everything at 50% and above.
    All,
    /// 90% and above.
    #[default]
    Top,
    /// `[lo, lo + 10)`.
    Decile(u8),
}

impl ProbabilityFilter {
    /// Inclusive lower bound and exclusive upper bound (`None` = unbounded).
    pub fn bounds(&self) -> (f64, Option<f64>) {
        match self {
            ProbabilityFilter::All => (50.0, None),
            ProbabilityFilter::Top => (90.0, None),
            ProbabilityFilter::Decile(lo) => (*lo as f64, Some(*lo as f64 + 10.0)),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "all" => Ok(ProbabilityFilter::All),
            "90" | "top" => Ok(ProbabilityFilter::Top),
            _ => {
                let lo: u8 = s
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid filter '{}' (all, top, 50-80)", s))?;
                if lo < 50 || lo >= 90 || lo % 10 != 0 {
                    bail!("Invalid filter '{}' (all, top, 50-80)", s);
                }
                Ok(ProbabilityFilter::Decile(lo))
            }
        }
    }
}

impl std::fmt::Display for ProbabilityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbabilityFilter::All => write!(f, "all"),
            ProbabilityFilter::Top => write!(f, "90%+"),
            ProbabilityFilter::Decile(lo) => write!(f, "{}-{}%", lo, lo + 9),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    Green,
    LightGreen,
    Yellow,
}

impl Band {
    pub fn for_listing(prob: f64) -> Self {
        if prob >= 90.0 {
            Band::Green
        } else if prob >= 80.0 {
            Band::LightGreen
        } else {
            Band::Yellow
        }
    }

    pub fn for_points(points: f64) -> Self {
        if points >= 85.0 {
            Band::Green
        } else if points >= 70.0 {
            Band::LightGreen
        } else {
            Band::Yellow
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Band::Green => write!(f, "HIGH"),
            Band::LightGreen => write!(f, "GOOD"),
            Band::Yellow => write!(f, "FAIR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total_items: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Offset of the first item of this page across the whole listing.
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub updated_at: String,
}

pub fn validate_number(number: &str) -> Result<()> {
    if number.len() != 4 || !number.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Number '{}' must be exactly 4 digits", number);
    }
    Ok(())
}

pub fn validate_probability(prob: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&prob) {
        bail!("Probability {} out of range (0-100)", prob);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_number() {
        assert!(validate_number("0042").is_ok());
        assert!(validate_number("9999").is_ok());
        assert!(validate_number("123").is_err());
        assert!(validate_number("12345").is_err());
        assert!(validate_number("12a4").is_err());
        assert!(validate_number("").is_err());
    }

    #[test]
    fn test_validate_probability() {
        assert!(validate_probability(0.0).is_ok());
        assert!(validate_probability(100.0).is_ok());
        assert!(validate_probability(-0.1).is_err());
        assert!(validate_probability(100.5).is_err());
    }

    #[test]
    fn test_prize_tier_codes() {
        for tier in PrizeTier::ALL {
            assert_eq!(PrizeTier::from_code(tier.code()), Some(tier));
        }
        assert_eq!(PrizeTier::from_code(0), None);
        assert_eq!(PrizeTier::from_code(6), None);
    }

    #[test]
    fn test_listing_band() {
        assert_eq!(Band::for_listing(95.0), Band::Green);
        assert_eq!(Band::for_listing(90.0), Band::Green);
        assert_eq!(Band::for_listing(89.9), Band::LightGreen);
        assert_eq!(Band::for_listing(80.0), Band::LightGreen);
        assert_eq!(Band::for_listing(79.0), Band::Yellow);
    }

    #[test]
    fn test_points_band() {
        assert_eq!(Band::for_points(85.0), Band::Green);
        assert_eq!(Band::for_points(84.9), Band::LightGreen);
        assert_eq!(Band::for_points(70.0), Band::LightGreen);
        assert_eq!(Band::for_points(12.0), Band::Yellow);

        let entry = ResultEntry {
            draw_date: "2025-06-01".to_string(),
            number: "1234".to_string(),
            tier: PrizeTier::First,
            total_points: None,
        };
        assert_eq!(entry.band(), None);
    }

    #[test]
    fn test_filter_bounds() {
        assert_eq!(ProbabilityFilter::All.bounds(), (50.0, None));
        assert_eq!(ProbabilityFilter::Top.bounds(), (90.0, None));
        assert_eq!(ProbabilityFilter::Decile(70).bounds(), (70.0, Some(80.0)));
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(ProbabilityFilter::parse("all").unwrap(), ProbabilityFilter::All);
        assert_eq!(ProbabilityFilter::parse("90").unwrap(), ProbabilityFilter::Top);
        assert_eq!(ProbabilityFilter::parse("80").unwrap(), ProbabilityFilter::Decile(80));
        assert_eq!(ProbabilityFilter::parse("50").unwrap(), ProbabilityFilter::Decile(50));
        assert!(ProbabilityFilter::parse("40").is_err());
        assert!(ProbabilityFilter::parse("75").is_err());
        assert!(ProbabilityFilter::parse("x").is_err());
    }

    #[test]
    fn test_page_arithmetic() {
        let page: Page<u8> = Page {
            items: Vec::new(),
            page: 2,
            per_page: 100,
            total_items: 250,
        };
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.offset(), 100);
        assert!(page.has_next());

        let empty: Page<u8> = Page {
            items: Vec::new(),
            page: 1,
            per_page: 100,
            total_items: 0,
        };
        assert_eq!(empty.total_pages(), 0);
        assert!(!empty.has_next());

        let far: Page<u8> = Page {
            items: Vec::new(),
            page: 50_000_000,
            per_page: 100,
            total_items: 20,
        };
        assert_eq!(far.offset(), u32::MAX);
        assert!(!far.has_next());
    }
}
