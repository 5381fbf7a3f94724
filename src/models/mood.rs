use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

pub const MIN_INTENSITY: i16 = 1;
pub const MAX_INTENSITY: i16 = 5;

/// Penalty per step of intensity difference.
const INTENSITY_PENALTY: i32 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "mood_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MoodKind {
    Competitive,
    Casual,
    Chill,
    Social,
    Focused,
    Experimental,
}

impl MoodKind {
    fn index(self) -> u8 {
        match self {
            MoodKind::Competitive => 0,
            MoodKind::Casual => 1,
            MoodKind::Chill => 2,
            MoodKind::Social => 3,
            MoodKind::Focused => 4,
            MoodKind::Experimental => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CompatibilityLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => CompatibilityLevel::Excellent,
            60..=79 => CompatibilityLevel::Good,
            40..=59 => CompatibilityLevel::Fair,
            _ => CompatibilityLevel::Poor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodCompatibility {
    pub score: u8,
    pub level: CompatibilityLevel,
    pub reason: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum MoodError {
    #[error("Mood intensity must be between 1 and 5, got {0}")]
    IntensityOutOfRange(i16),
}

/// Base score and explanation for a pair of moods; symmetric.
fn base_compatibility(a: MoodKind, b: MoodKind) -> (u8, &'static str) {
    use MoodKind::*;

    let (lo, hi) = if a.index() <= b.index() { (a, b) } else { (b, a) };

    match (lo, hi) {
        (Competitive, Competitive) => (90, "Both players are playing to win"),
        (Casual, Casual) => (90, "Both players are here for a relaxed session"),
        (Chill, Chill) => (95, "Low-pressure vibes on both sides"),
        (Social, Social) => (90, "Both players want to hang out and talk"),
        (Focused, Focused) => (85, "Both players want a quiet, concentrated session"),
        (Experimental, Experimental) => (85, "Both players want to try off-meta ideas"),

        (Competitive, Casual) => (45, "One player wants to win, the other wants to relax"),
        (Competitive, Chill) => (30, "Intensity mismatch between a try-hard and a chill player"),
        (Competitive, Social) => (50, "Chatty sessions can distract a competitive player"),
        (Competitive, Focused) => (85, "Both players take the game seriously"),
        (Competitive, Experimental) => (35, "Winning focus clashes with experimentation"),

        (Casual, Chill) => (85, "A relaxed pace suits both players"),
        (Casual, Social) => (80, "Easygoing play with plenty of conversation"),
        (Casual, Focused) => (50, "Different expectations about commitment"),
        (Casual, Experimental) => (75, "Casual play leaves room for trying new things"),

        (Chill, Social) => (75, "Laid-back play with good company"),
        (Chill, Focused) => (40, "One player wants to unwind, the other to concentrate"),
        (Chill, Experimental) => (70, "No pressure makes experimenting easy"),

        (Social, Focused) => (45, "Conversation may break concentration"),
        (Social, Experimental) => (70, "Trying odd strategies is more fun together"),

        (Focused, Experimental) => (40, "Structured play clashes with improvisation"),

        // Pairs are normalized so `lo` precedes `hi`.
        _ => (50, "Neutral pairing"),
    }
}

/// Score how well two players' current moods fit together.
pub fn compatibility(
    mood_a: MoodKind,
    intensity_a: i16,
    mood_b: MoodKind,
    intensity_b: i16,
) -> Result<MoodCompatibility, MoodError> {
    for intensity in [intensity_a, intensity_b] {
        if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&intensity) {
            return Err(MoodError::IntensityOutOfRange(intensity));
        }
    }

    let (base, reason) = base_compatibility(mood_a, mood_b);
    let penalty = INTENSITY_PENALTY * i32::from((intensity_a - intensity_b).abs());
    let score = (i32::from(base) - penalty).clamp(0, 100) as u8;

    Ok(MoodCompatibility {
        score,
        level: CompatibilityLevel::from_score(score),
        reason: reason.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetMoodRequest {
    pub mood: MoodKind,
    #[validate(range(min = 1, max = 5))]
    pub intensity: i16,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MoodKind; 6] = [
        MoodKind::Competitive,
        MoodKind::Casual,
        MoodKind::Chill,
        MoodKind::Social,
        MoodKind::Focused,
        MoodKind::Experimental,
    ];

    #[test]
    fn test_table_is_symmetric() {
        for a in ALL {
            for b in ALL {
                assert_eq!(base_compatibility(a, b), base_compatibility(b, a));
            }
        }
    }

    #[test]
    fn test_no_pair_falls_through_to_neutral() {
        for a in ALL {
            for b in ALL {
                assert_ne!(base_compatibility(a, b).1, "Neutral pairing");
            }
        }
    }

    #[test]
    fn test_same_mood_same_intensity_is_excellent() {
        let result = compatibility(MoodKind::Chill, 3, MoodKind::Chill, 3).unwrap();
        assert_eq!(result.score, 95);
        assert_eq!(result.level, CompatibilityLevel::Excellent);
    }

    #[test]
    fn test_intensity_gap_reduces_score() {
        let close = compatibility(MoodKind::Competitive, 5, MoodKind::Focused, 4).unwrap();
        let far = compatibility(MoodKind::Competitive, 5, MoodKind::Focused, 1).unwrap();
        assert_eq!(close.score, 80);
        assert_eq!(far.score, 65);
        assert_eq!(far.level, CompatibilityLevel::Good);
    }

    #[test]
    fn test_worst_pairing_is_poor() {
        let result = compatibility(MoodKind::Competitive, 1, MoodKind::Chill, 5).unwrap();
        assert_eq!(result.score, 10);
        assert_eq!(result.level, CompatibilityLevel::Poor);
    }

    #[test]
    fn test_intensity_bounds() {
        assert_eq!(
            compatibility(MoodKind::Casual, 0, MoodKind::Casual, 3),
            Err(MoodError::IntensityOutOfRange(0))
        );
        assert_eq!(
            compatibility(MoodKind::Casual, 3, MoodKind::Casual, 6),
            Err(MoodError::IntensityOutOfRange(6))
        );
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(CompatibilityLevel::from_score(100), CompatibilityLevel::Excellent);
        assert_eq!(CompatibilityLevel::from_score(80), CompatibilityLevel::Excellent);
        assert_eq!(CompatibilityLevel::from_score(79), CompatibilityLevel::Good);
        assert_eq!(CompatibilityLevel::from_score(60), CompatibilityLevel::Good);
        assert_eq!(CompatibilityLevel::from_score(59), CompatibilityLevel::Fair);
        assert_eq!(CompatibilityLevel::from_score(40), CompatibilityLevel::Fair);
        assert_eq!(CompatibilityLevel::from_score(39), CompatibilityLevel::Poor);
    }

    #[test]
    fn test_mood_serialization() {
        assert_eq!(
            serde_json::to_string(&MoodKind::Experimental).unwrap(),
            "\"experimental\""
        );
        let req: SetMoodRequest =
            serde_json::from_str(r#"{"mood":"chill","intensity":2}"#).unwrap();
        assert_eq!(req.mood, MoodKind::Chill);
        assert!(req.validate().is_ok());
    }
}
