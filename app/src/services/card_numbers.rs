// app/src/services/card_numbers.rs

use rand::Rng;

pub const CARD_NUMBER_LEN: usize = 16;

/// A random 16-digit card number with no leading zero.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
  rng.gen_range(1_000_000_000_000_000u64..=9_999_999_999_999_999u64).to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn numbers_have_sixteen_digits() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
      let number = generate(&mut rng);
      assert_eq!(number.len(), CARD_NUMBER_LEN);
      assert!(number.chars().all(|c| c.is_ascii_digit()));
      assert!(!number.starts_with('0'));
    }
  }
}
