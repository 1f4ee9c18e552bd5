//! Accent and case folding shared by search
//! and duplicate-title detection.

use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form of `s`.
///
/// The lower-cased text is decomposed
/// (NFD), combining diacritics in
/// U+0300..U+036F are dropped, `đ` becomes
/// `d` and surrounding whitespace is
/// trimmed. Letters without a canonical
/// decomposition (`ß`, `æ`, `ø`) are kept.
pub fn normalize(s: &str) -> String {
  // Lower-casing first keeps this
  // idempotent: `İ` lowers to `i` + U+0307,
  // which the mark filter then removes.
  s.to_lowercase()
    .nfd()
    .filter(|ch| !is_combining_mark(*ch))
    .map(|ch| if ch == 'đ' { 'd' } else { ch })
    .collect::<String>()
    .trim()
    .to_string()
}

fn is_combining_mark(ch: char) -> bool {
  ('\u{0300}'..='\u{036f}').contains(&ch)
}

#[cfg(test)]
mod tests {
  use super::normalize;

  #[test]
  fn vietnamese_place_names_fold_to_ascii()
  {
    assert_eq!(
      normalize("Đà Nẵng"),
      normalize("da nang")
    );
    assert_eq!(
      normalize("Đà Nẵng"),
      "da nang"
    );
    assert_eq!(
      normalize("  Hà Nội  "),
      "ha noi"
    );
  }

  #[test]
  fn case_and_surrounding_space_ignored() {
    assert_eq!(
      normalize("  Buy MILK "),
      "buy milk"
    );
    assert_eq!(
      normalize("Crème Brûlée"),
      "creme brulee"
    );
  }

  #[test]
  fn decomposed_input_matches_precomposed()
  {
    let decomposed = "Cafe\u{0301}";
    assert_eq!(
      normalize(decomposed),
      normalize("Café")
    );
  }

  #[test]
  fn greek_and_cyrillic_accents_fold() {
    assert_eq!(normalize("ά"), "α");
    assert_eq!(normalize("й"), "и");
    assert_eq!(
      normalize("Κάφε"),
      normalize("Καφε")
    );
    assert_eq!(
      normalize("ΑΘΗΝΑ"),
      "αθηνα"
    );
    assert_eq!(normalize("日本語"), "日本語");
  }

  #[test]
  fn letters_without_decomposition_are_kept()
  {
    assert_eq!(normalize("Straße"), "straße");
    assert_ne!(
      normalize("Straße"),
      normalize("Strasse")
    );
    assert_eq!(normalize("Ørsted"), "ørsted");
    assert_eq!(normalize("Łódź"), "łodz");
  }

  #[test]
  fn dotted_capital_i_folds_to_plain_i() {
    assert_eq!(
      normalize("İstanbul"),
      "istanbul"
    );
  }

  #[test]
  fn normalization_is_idempotent() {
    let singles = (0u32..0x3000)
      .filter_map(char::from_u32)
      .map(String::from);
    let mixed = [
      "Đà Nẵng",
      "  Buy MILK ",
      "Cafe\u{0301}",
      "Ångström \u{212b}",
      "ᾼ ᾳ \u{0345}",
      "\u{0300} leading mark",
      "a\u{0483}\u{0301}\u{0316}",
      "",
      "   "
    ]
    .map(String::from);

    for s in singles.chain(mixed) {
      let once = normalize(&s);
      assert_eq!(
        normalize(&once),
        once,
        "not idempotent for {s:?}"
      );
    }
  }
}
