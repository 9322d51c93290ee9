use std::{cmp::Ordering, fmt};

/// Parsed release name such as `4.4.5`, `5.0-b1` or `v6.0-rc2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionId {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub variant_type: String,
    pub variant_number: u32,
}

impl VersionId {
    pub fn parse(name: &str) -> Self {
        let name = name.trim().trim_start_matches(['v', 'V']);
        let (numbers, variant) = name.split_once('-').unwrap_or((name, ""));

        let mut parts = numbers
            .split('.')
            .map(|part| part.trim().parse::<u32>().unwrap_or(0));

        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            build: parts.next().unwrap_or(0),
            variant_type: variant
                .chars()
                .filter(char::is_ascii_alphabetic)
                .collect::<String>()
                .to_ascii_lowercase(),
            variant_number: variant
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .unwrap_or(0),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.variant_type.is_empty()
    }

    fn variant_weight(&self) -> u8 {
        match self.variant_type.as_str() {
            "a" | "alpha" => 1,
            "b" | "beta" => 2,
            "rc" => 4,
            "" => 8,
            _ => 0,
        }
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.build)
            .cmp(&(other.major, other.minor, other.build))
            .then_with(|| self.variant_weight().cmp(&other.variant_weight()))
            .then_with(|| self.variant_number.cmp(&other.variant_number))
            .then_with(|| self.variant_type.cmp(&other.variant_type))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)?;
        if !self.is_stable() {
            write!(f, "-{}{}", self.variant_type, self.variant_number)?;
        }
        Ok(())
    }
}
