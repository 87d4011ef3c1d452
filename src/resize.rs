//! # Resize Directive Module
//!
//! Parses the user-facing resize mini-language into a typed directive.
//!
//! ## Accepted forms (checked in this precedence order):
//! 1. Dimension: `w960`, `960w`, `h480`, `480h` - target width or height
//!    in pixels, aspect ratio preserved by the backend
//! 2. Byte budget: `100kb`, `1.5MB`, `2gb` - case-insensitive units with
//!    1024-based multipliers; image-only (video backends reject it)
//! 3. Percentage: `50` or `50%` - uniform scale factor
//!
//! Tokens are trimmed, lowercased and stripped of interior whitespace
//! before matching, so `" 1 MB "` and `"1mb"` parse identically. An empty
//! or absent token means "no resize requested" and is not an error; any
//! other unparseable token fails validation with a message listing the
//! accepted forms.

use crate::error::OptimizeError;

const DIMENSION_HINT: &str =
    "Resize width/height must be greater than 0 (e.g. w960, 960w, h480, 480h)";
const MAX_SIZE_HINT: &str = "Resize max size must be greater than 0 (e.g. 100kB, 2MB)";
const GRAMMAR_HINT: &str =
    "Resize must be a percentage (50%), max size (100kB), width (w960/960w), or height (h480/480h)";

/// Axis targeted by an absolute dimension resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// Typed resize request; at most one mode is ever active
#[derive(Debug, Clone, PartialEq)]
pub enum ResizeDirective {
    /// Uniform scale factor in percent (> 0)
    Percentage(f64),
    /// Absolute pixel count on one axis (> 0)
    Dimension { axis: Axis, pixels: u32 },
    /// Target byte budget (> 0), reached by searching over scale factors
    MaxSize(u64),
}

impl ResizeDirective {
    /// Parse a resize token. `Ok(None)` means no directive was requested.
    pub fn parse(token: &str) -> Result<Option<Self>, OptimizeError> {
        let normalized: String = token.to_lowercase().split_whitespace().collect();
        if normalized.is_empty() {
            return Ok(None);
        }

        if let Some(directive) = Self::parse_dimension(&normalized)? {
            return Ok(Some(directive));
        }

        if let Some(directive) = Self::parse_max_size(&normalized)? {
            return Ok(Some(directive));
        }

        let digits = normalized.strip_suffix('%').unwrap_or(&normalized);
        if is_decimal(digits) {
            let value: f64 = digits
                .parse()
                .map_err(|_| OptimizeError::Validation(GRAMMAR_HINT.to_string()))?;
            if value > 0.0 {
                return Ok(Some(Self::Percentage(value)));
            }
        }

        Err(OptimizeError::Validation(GRAMMAR_HINT.to_string()))
    }

    fn parse_dimension(normalized: &str) -> Result<Option<Self>, OptimizeError> {
        let first = normalized.chars().next();
        let last = normalized.chars().last();

        let (axis, digits) = if let Some(axis) = axis_letter(first) {
            (axis, &normalized[1..])
        } else if let Some(axis) = axis_letter(last) {
            (axis, &normalized[..normalized.len() - 1])
        } else {
            return Ok(None);
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }

        match digits.parse::<u32>() {
            Ok(pixels) if pixels > 0 => Ok(Some(Self::Dimension { axis, pixels })),
            _ => Err(OptimizeError::Validation(DIMENSION_HINT.to_string())),
        }
    }

    fn parse_max_size(normalized: &str) -> Result<Option<Self>, OptimizeError> {
        // Two-letter units first so "100kb" is not read as "100k" + "b".
        const UNITS: &[(&str, u64)] = &[
            ("kb", 1024),
            ("mb", 1024 * 1024),
            ("gb", 1024 * 1024 * 1024),
            ("b", 1),
        ];

        for (suffix, multiplier) in UNITS {
            if let Some(digits) = normalized.strip_suffix(suffix) {
                if !is_decimal(digits) {
                    return Ok(None);
                }
                let value: f64 = digits
                    .parse()
                    .map_err(|_| OptimizeError::Validation(MAX_SIZE_HINT.to_string()))?;
                let bytes = (value * *multiplier as f64).floor() as u64;
                if value <= 0.0 || bytes == 0 {
                    return Err(OptimizeError::Validation(MAX_SIZE_HINT.to_string()));
                }
                return Ok(Some(Self::MaxSize(bytes)));
            }
        }

        Ok(None)
    }

    /// ImageMagick `-resize` geometry for this directive, when one exists.
    /// Byte budgets have no direct geometry; they are resolved by the
    /// scale search instead.
    pub fn magick_geometry(&self) -> Option<String> {
        match self {
            Self::Percentage(value) => Some(format!("{}%", value)),
            Self::Dimension { axis: Axis::Width, pixels } => Some(format!("{}x", pixels)),
            Self::Dimension { axis: Axis::Height, pixels } => Some(format!("x{}", pixels)),
            Self::MaxSize(_) => None,
        }
    }
}

fn axis_letter(c: Option<char>) -> Option<Axis> {
    match c {
        Some('w') => Some(Axis::Width),
        Some('h') => Some(Axis::Height),
        _ => None,
    }
}

/// Plain unsigned decimal: digits with at most one dot, no exponents or
/// signs (rejects what `f64::from_str` would otherwise accept, like "1e3").
fn is_decimal(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_digit() || c == '.')
        && s.chars().filter(|c| *c == '.').count() <= 1
        && s.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_means_no_directive() {
        assert_eq!(ResizeDirective::parse("").unwrap(), None);
        assert_eq!(ResizeDirective::parse("   ").unwrap(), None);
    }

    #[test]
    fn percent_suffix_is_optional() {
        for token in ["50", "33.5", "150", "0.5"] {
            let with_suffix = ResizeDirective::parse(&format!("{}%", token)).unwrap();
            let bare = ResizeDirective::parse(token).unwrap();
            assert_eq!(with_suffix, bare, "token {}", token);
        }
        assert_eq!(
            ResizeDirective::parse(" 33.5% ").unwrap(),
            Some(ResizeDirective::Percentage(33.5))
        );
    }

    #[test]
    fn byte_budget_units_are_powers_of_1024() {
        assert_eq!(
            ResizeDirective::parse("100kB").unwrap(),
            Some(ResizeDirective::MaxSize(100 * 1024))
        );
        assert_eq!(
            ResizeDirective::parse("1 MB").unwrap(),
            Some(ResizeDirective::MaxSize(1024 * 1024))
        );
        assert_eq!(
            ResizeDirective::parse("2gb").unwrap(),
            Some(ResizeDirective::MaxSize(2 * 1024 * 1024 * 1024))
        );
        assert_eq!(
            ResizeDirective::parse("512b").unwrap(),
            Some(ResizeDirective::MaxSize(512))
        );
    }

    #[test]
    fn fractional_budgets_floor_to_whole_bytes() {
        assert_eq!(
            ResizeDirective::parse("1.5kb").unwrap(),
            Some(ResizeDirective::MaxSize(1536))
        );
        assert_eq!(
            ResizeDirective::parse("0.1b").unwrap_err().to_string(),
            MAX_SIZE_HINT
        );
    }

    #[test]
    fn dimension_letter_position_is_flexible() {
        assert_eq!(
            ResizeDirective::parse("w960").unwrap(),
            ResizeDirective::parse("960w").unwrap()
        );
        assert_eq!(
            ResizeDirective::parse("h480").unwrap(),
            ResizeDirective::parse("480h").unwrap()
        );
        assert_eq!(
            ResizeDirective::parse(" W1280 ").unwrap(),
            Some(ResizeDirective::Dimension { axis: Axis::Width, pixels: 1280 })
        );
    }

    #[test]
    fn zero_dimension_fails_validation() {
        for token in ["w0", "0w", "h0", "0h"] {
            let err = ResizeDirective::parse(token).unwrap_err();
            assert!(err.to_string().contains("width/height"), "token {}", token);
        }
    }

    #[test]
    fn zero_budget_fails_validation() {
        let err = ResizeDirective::parse("0kB").unwrap_err();
        assert!(err.to_string().contains("max size"));
    }

    #[test]
    fn invalid_tokens_list_the_accepted_forms() {
        for token in ["invalid", "w-1", "1e3", "-5", "12qb"] {
            let err = ResizeDirective::parse(token).unwrap_err();
            assert!(err.to_string().starts_with("Resize must be"), "token {}", token);
        }
    }

    #[test]
    fn magick_geometry_rendering() {
        assert_eq!(
            ResizeDirective::Percentage(50.0).magick_geometry().unwrap(),
            "50%"
        );
        assert_eq!(
            ResizeDirective::Dimension { axis: Axis::Width, pixels: 960 }
                .magick_geometry()
                .unwrap(),
            "960x"
        );
        assert_eq!(
            ResizeDirective::Dimension { axis: Axis::Height, pixels: 480 }
                .magick_geometry()
                .unwrap(),
            "x480"
        );
        assert_eq!(ResizeDirective::MaxSize(1024).magick_geometry(), None);
    }
}
