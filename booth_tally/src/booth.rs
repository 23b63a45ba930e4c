//! Booth labels.
//!
//! Booth numbers are kept as strings because suffixes denote distinct polling
//! stations: `37`, `37W` and `37A` are three different booths.

/// The category of a polling station, as encoded by its suffix.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum BoothKind {
    Regular,
    /// Women-only polling station (`W`).
    Women,
    /// Auxiliary station opened next to an overcrowded one (`A`, `B`, ...).
    Auxiliary,
    /// Special stations: accessible, model or other dedicated booths.
    Special,
}

impl BoothKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoothKind::Regular => "regular",
            BoothKind::Women => "women",
            BoothKind::Auxiliary => "auxiliary",
            BoothKind::Special => "special",
        }
    }
}

const SPECIAL_SUFFIXES: [&str; 5] = ["S", "SP", "SPL", "PWD", "M"];

const MAX_SUFFIX_LEN: usize = 3;
const MAX_DIGITS: usize = 5;

/// A parsed booth number: `37(W)` is `{ number: 37, suffix: Some("W") }`.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct BoothNumber {
    pub number: u32,
    pub suffix: Option<String>,
}

impl BoothNumber {
    /// Parses a raw label as printed in a document.
    ///
    /// Accepted shapes are a number, optionally followed by a short letter
    /// suffix that may be separated by spaces, a dash, a dot or put between
    /// parentheses: `1`, `37W`, `37(W)`, `37 (W)`, `37-A`, `037`.
    pub fn parse(label: &str) -> Option<BoothNumber> {
        let label = label.trim();
        let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || digits.len() > MAX_DIGITS {
            return None;
        }
        let number: u32 = digits.parse().ok()?;
        if number == 0 {
            return None;
        }

        let rest = &label[digits.len()..];
        let mut letters = String::new();
        let mut open_paren = false;
        let mut closed_paren = false;
        for c in rest.chars() {
            match c {
                ' ' | '-' | '.' | '/' if letters.is_empty() && !open_paren => {}
                '(' if letters.is_empty() && !open_paren => open_paren = true,
                ')' if open_paren && !letters.is_empty() && !closed_paren => closed_paren = true,
                c if c.is_ascii_alphabetic() && !closed_paren => letters.push(c),
                _ => return None,
            }
        }
        if open_paren != closed_paren || letters.len() > MAX_SUFFIX_LEN {
            return None;
        }
        let suffix = if letters.is_empty() {
            None
        } else {
            Some(letters.to_ascii_uppercase())
        };
        Some(BoothNumber { number, suffix })
    }

    pub fn kind(&self) -> BoothKind {
        match self.suffix.as_deref() {
            None => BoothKind::Regular,
            Some("W") => BoothKind::Women,
            Some(s) if SPECIAL_SUFFIXES.contains(&s) => BoothKind::Special,
            Some(_) => BoothKind::Auxiliary,
        }
    }

    /// The normalized booth number, e.g. `37W`.
    pub fn canonical(&self) -> String {
        match &self.suffix {
            Some(s) => format!("{}{}", self.number, s),
            None => self.number.to_string(),
        }
    }
}

/// The canonical booth identifier `{acId}-{boothNo}`.
pub fn booth_id(ac_id: &str, number: &BoothNumber) -> String {
    format!("{}-{}", ac_id, number.canonical())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_numbers() {
        let b = BoothNumber::parse("1").unwrap();
        assert_eq!(b.canonical(), "1");
        assert_eq!(b.kind(), BoothKind::Regular);
        assert_eq!(BoothNumber::parse("037").unwrap().canonical(), "37");
    }

    #[test]
    fn suffix_variants_are_stable() {
        let variants = ["37(W)", "37 (W)", "37W", "37-W", "37 w", "37 ( W )"];
        for v in variants.iter() {
            let b = BoothNumber::parse(v);
            if *v == "37 ( W )" {
                // Spaces inside the parentheses are not a printed variant.
                assert_eq!(b, None);
                continue;
            }
            let b = b.unwrap_or_else(|| panic!("could not parse {:?}", v));
            assert_eq!(b.canonical(), "37W", "variant {:?}", v);
            assert_eq!(b.kind(), BoothKind::Women, "variant {:?}", v);
        }
    }

    #[test]
    fn auxiliary_and_special() {
        assert_eq!(
            BoothNumber::parse("37-A").unwrap().kind(),
            BoothKind::Auxiliary
        );
        assert_eq!(BoothNumber::parse("37A").unwrap().canonical(), "37A");
        assert_eq!(
            BoothNumber::parse("12(PWD)").unwrap().kind(),
            BoothKind::Special
        );
    }

    #[test]
    fn rejects_non_labels() {
        for s in ["", "Total", "A37", "0", "37AB12", "37(W", "123456", "1,234"].iter() {
            assert_eq!(BoothNumber::parse(s), None, "{:?}", s);
        }
    }

    #[test]
    fn booth_ids() {
        let b = BoothNumber::parse("37 (W)").unwrap();
        assert_eq!(booth_id("TN-001", &b), "TN-001-37W");
    }
}
