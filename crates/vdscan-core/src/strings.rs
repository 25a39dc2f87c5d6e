//! Small string and number helpers shared across the pipeline.

/// Lower-case everything but the first character (`CRITICAL` -> `Critical`).
pub fn to_sentence_case(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => {
            first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
        }
        None => String::new(),
    }
}

/// Round to two decimal places, as CVSS base scores are published.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether a string attribute carries actual content.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_case() {
        assert_eq!(to_sentence_case("CRITICAL"), "Critical");
        assert_eq!(to_sentence_case("medium"), "Medium");
        assert_eq!(to_sentence_case(""), "");
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round2(8.3000001), 8.3);
        assert_eq!(round2(7.456), 7.46);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank(" "));
        assert!(!is_blank("/usr/bin"));
    }
}
