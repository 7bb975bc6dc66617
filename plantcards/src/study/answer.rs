//! Checking typed guesses against plant names.

/// Lowercase, trim and collapse internal whitespace, so `"  Quercus   Robur "` equals `"quercus robur"`.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// A guess is right when it names either the common or the scientific name
pub fn matches_name(guess: &str, common_name: &str, scientific_name: &str) -> bool {
    let guess = normalize_name(guess);
    if guess.is_empty() {
        return false;
    }
    guess == normalize_name(common_name) || guess == normalize_name(scientific_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Quercus \t  Robur "), "quercus robur");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_matches_either_name() {
        assert!(matches_name("english OAK", "English oak", "Quercus robur"));
        assert!(matches_name("quercus  robur", "English oak", "Quercus robur"));
        assert!(!matches_name("oak", "English oak", "Quercus robur"));
        assert!(!matches_name("   ", "English oak", "Quercus robur"));
    }
}
